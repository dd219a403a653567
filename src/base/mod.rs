//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): error codes in the Chromium numbering
//! - [`LoadState`](loadstate::LoadState): request lifecycle states
//! - [`escape`]: percent-encoding helpers

pub mod context;
pub mod escape;
pub mod loadstate;
pub mod neterror;
