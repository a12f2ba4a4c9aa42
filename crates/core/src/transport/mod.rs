//! Transport port definitions

pub mod ports;

pub use ports::{BlockingTransport, Transport};
