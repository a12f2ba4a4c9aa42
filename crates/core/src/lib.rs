//! # apiq Core
//!
//! The execution core every generated endpoint call passes through.
//!
//! This crate contains:
//! - Transport ports (`Transport`, `BlockingTransport`)
//! - The rate-limited, retrying dispatchers (async and blocking)
//! - `ClientSession`, the scoped lifecycle around one dispatcher
//!
//! ## Architecture Principles
//! - Depends on `apiq-common` and `apiq-domain` only
//! - No HTTP code; the network lives behind the transport ports
//! - Payloads are opaque: the core never inspects a response

pub mod dispatch;
pub mod session;
pub mod transport;

pub use dispatch::{BlockingDispatcher, DispatchError, Dispatcher};
pub use session::{ClientSession, SessionError, SessionStatus};
pub use transport::ports::{BlockingTransport, Transport};
