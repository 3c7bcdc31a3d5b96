use ruse_shared::uri::RUri;

/// One rewrite rule. `matches` is compared against a channel's current URI
/// by equality; overlapping entries are a configuration error and are not
/// detected, first match wins.
#[derive(Debug, Clone)]
pub struct PolicyEntry {
    pub matches: RUri,
    pub target: RUri,
}

/// Static URL-to-URL redirect table. Read-only while a chain executes;
/// share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct RedirectPolicy {
    entries: Vec<PolicyEntry>,
}

impl RedirectPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, matches: RUri, target: RUri) -> Self {
        self.entries.push(PolicyEntry { matches, target });
        self
    }

    /// Single-hop lookup. A target that is itself a source is not chased
    /// here; each redirect raises a fresh lifecycle event which is decided
    /// independently, so multi-hop resolution is emergent.
    pub fn decide(&self, current: &RUri) -> Option<RUri> {
        self.entries
            .iter()
            .find(|entry| &entry.matches == current)
            .map(|entry| entry.target.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
