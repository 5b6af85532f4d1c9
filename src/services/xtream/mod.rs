//! Xtream Codes upstream integration
//!
//! Xtream M3U URLs typically follow this pattern:
//! ```text
//! http://server:port/get.php?username=X&password=Y&type=m3u_plus&output=ts
//! ```
//!
//! When the configured M3U source is the Xtream server's own `get.php`, the
//! playlist endpoint is generated from Xtream on every request instead of
//! from a one-shot rewrite pass. With `XTREAM_API_GET` the playlist is
//! generated from the Player API catalogue instead of upstream `get.php`.

pub mod client;
pub mod detector;
pub mod generator;
pub mod types;

pub use client::{XtreamClient, XtreamError};
pub use detector::{extract_credentials, is_same_xtream_source};
pub use generator::XtreamCatalogue;
pub use types::XtreamCredentials;
