//! Trust material for TLS peer verification.

pub mod trust;

pub use trust::{ca_info_path, global_init, TrustConfig};
