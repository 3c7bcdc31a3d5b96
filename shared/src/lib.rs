#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod http;
pub mod io;
pub mod uri;
