use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::{channel::Subject, error::EngineError};

/// Preferred pre-send notification name.
pub static TOPIC_PRE_SEND: &str = "request-pre-send";
/// Name older hosts used for the same lifecycle point.
pub static TOPIC_MODIFY: &str = "request-modify";

pub trait Observer: Send + Sync + std::fmt::Debug {
    fn observe(&self, subject: &mut Subject, topic: &str) -> Result<(), EngineError>;
}

/// Host-side notification hub. A host supports a fixed set of topic names;
/// subscribing under any other name is refused, which is what forces
/// adaptive registration on the observer side.
#[derive(Debug)]
pub struct ObserverService {
    supported: Vec<&'static str>,
    observers: DashMap<&'static str, Vec<Arc<dyn Observer>>>,
}

impl Default for ObserverService {
    fn default() -> Self {
        Self::new()
    }
}

impl ObserverService {
    pub fn new() -> Self {
        Self::with_topics(&[TOPIC_PRE_SEND])
    }

    pub fn with_topics(topics: &[&'static str]) -> Self {
        Self {
            supported: topics.to_vec(),
            observers: DashMap::new(),
        }
    }

    /// The notification name this host fires for outgoing requests.
    pub fn active_topic(&self) -> Option<&'static str> {
        self.supported.first().copied()
    }

    pub fn subscribe(
        &self,
        topic: &str,
        observer: Arc<dyn Observer>,
    ) -> Result<(), EngineError> {
        let Some(supported) = self.supported.iter().find(|t| **t == topic) else {
            return Err(EngineError::UnsupportedTopic(topic.to_string()));
        };
        debug!("observer subscribed to {supported}");
        self.observers.entry(*supported).or_default().push(observer);
        Ok(())
    }

    pub fn unsubscribe(&self, topic: &str, observer: &Arc<dyn Observer>) {
        if let Some(supported) = self.supported.iter().find(|t| **t == topic) {
            if let Some(mut list) = self.observers.get_mut(*supported) {
                list.retain(|o| !Arc::ptr_eq(o, observer));
            }
        }
    }

    /// Fire the pre-send notification for one outgoing request. The first
    /// observer error aborts delivery and propagates.
    pub fn notify_request(&self, subject: &mut Subject) -> Result<(), EngineError> {
        let Some(topic) = self.active_topic() else {
            return Ok(());
        };
        let observers = match self.observers.get(topic) {
            Some(list) => list.value().clone(),
            None => return Ok(()),
        };
        for observer in observers {
            observer.observe(subject, topic)?;
        }
        Ok(())
    }
}
