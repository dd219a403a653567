//! # easynet
//!
//! An asynchronous HTTP request engine with retry and redirect handling.
//!
//! A [`RequestDescriptor`] describes one logical exchange. The
//! [`LifecycleController`] runs it as a series of attempts through a
//! [`Multiplexer`], streaming response bytes into memory or a file and
//! deciding after each attempt whether to finish, follow a redirect, or retry.
//! Retries and redirect hops share one budget. The completion callback fires
//! exactly once per submission.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use easynet::socket::HyperMultiplexer;
//! use easynet::tls::{global_init, TrustConfig};
//! use easynet::urlrequest::{LifecycleController, RequestDescriptor, CALLBACKS};
//!
//! #[tokio::main]
//! async fn main() {
//!     global_init(&TrustConfig::new("/var/lib/myapp")).unwrap();
//!     let mut controller = LifecycleController::new(HyperMultiplexer::current(CALLBACKS)).unwrap();
//!
//!     let handle = RequestDescriptor::new("https://example.com").into_handle();
//!     controller.submit(&handle, |handle| {
//!         let req = handle.lock();
//!         println!("{} {:?}", req.status(), req.message());
//!     });
//!     controller.perform().await;
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error codes, load states, percent-encoding
//! - [`http`] - Header codec, response head, sinks, retry policy
//! - [`socket`] - Multiplexer interface and the default tokio/hyper transport
//! - [`tls`] - Process-wide trust bundle provisioning
//! - [`urlrequest`] - Descriptor, lifecycle controller, token registry
//!
//! ## Preconditions
//!
//! [`tls::global_init`] must succeed once before the first controller is
//! built. Nothing is torn down afterwards.

pub mod base;
pub mod http;
pub mod socket;
pub mod tls;
pub mod urlrequest;

pub use base::neterror::NetError;
pub use socket::Multiplexer;
pub use urlrequest::{LifecycleController, RequestConfig, RequestDescriptor, RequestHandle};
