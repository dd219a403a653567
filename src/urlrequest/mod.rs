//! Request-level API: the descriptor, its lifecycle, and the token bridge
//! the transport calls back through.
//!
//! - [`descriptor`]: per-exchange configuration and captured outcome
//! - [`controller`]: attempt state machine with shared retry/redirect budget
//! - [`registry`]: token → request mapping for in-flight attempts
//! - [`dispatch`]: static callbacks that route streamed bytes by token
//! - [`diagnostics`]: human-readable dump of a finished exchange

pub mod controller;
pub mod descriptor;
pub mod diagnostics;
pub mod dispatch;
pub mod registry;

pub use controller::LifecycleController;
pub use descriptor::{PerformCallback, RequestConfig, RequestDescriptor, RequestHandle};
pub use dispatch::{CallbackTable, DebugKind, CALLBACKS};
pub use registry::{HandleRegistry, Token};
