// mirror-cache library
// Pull-through cache for Maven-style artifact repositories

pub mod cache;
pub mod config;
pub mod constants;
pub mod logging;
pub mod pipeline; // Per-request context for the proxy hooks
pub mod proxy;
