use std::{fmt::Display, str::FromStr};

use http::{Uri, uri::InvalidUri};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RUri {
    pub inner: Uri,
}

impl Display for RUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}", self.inner))
    }
}

impl RUri {
    pub fn new(uri: Uri) -> Self {
        RUri { inner: uri }
    }

    /// Resolve a `Location` header value against this URI. An absolute
    /// target wins outright; a path-only target keeps this URI's scheme
    /// and authority.
    pub fn resolve(&self, location: &str) -> Result<RUri, http::Error> {
        let other = Uri::try_from(location)?;
        if other.authority().is_some() {
            return Ok(RUri::new(other));
        }
        let mut uri = Uri::builder();
        if let Some(scheme) = self.inner.scheme() {
            uri = uri.scheme(scheme.clone());
        }
        if let Some(authority) = self.inner.authority() {
            uri = uri.authority(authority.clone());
        }
        if let Some(pq) = other.path_and_query() {
            uri = uri.path_and_query(pq.clone());
        }
        Ok(RUri::new(uri.build()?))
    }

    pub fn scheme_str(&self) -> Option<&str> {
        self.inner.scheme_str()
    }

    pub fn host(&self) -> &str {
        self.inner.host().unwrap_or("localhost")
    }

    pub fn path(&self) -> &str {
        self.inner.path()
    }

    pub fn path_and_query(&self) -> &str {
        self.inner
            .path_and_query()
            .map(|p| p.as_str())
            .unwrap_or(self.inner.path())
    }

    pub fn port(&self) -> u16 {
        match self.inner.port_u16() {
            Some(port) => port,
            None => match self.inner.scheme() {
                Some(scheme) if scheme == &http::uri::Scheme::HTTPS => 443,
                _ => 80,
            },
        }
    }

    pub fn inner(&self) -> Uri {
        self.inner.clone()
    }

    pub fn valid_authority(&self) -> bool {
        self.inner.authority().is_some()
    }

    pub fn host_port(&self) -> String {
        format!("{}:{}", self.host(), self.port())
    }
}

impl FromStr for RUri {
    type Err = InvalidUri;

    #[inline]
    fn from_str(s: &str) -> Result<RUri, InvalidUri> {
        let inner = Uri::try_from(s.as_bytes())?;
        Ok(RUri { inner })
    }
}

impl From<Uri> for RUri {
    fn from(value: Uri) -> Self {
        RUri::new(value)
    }
}
