//! # Utility Modules
//!
//! Supporting utilities shared by the protocol and transport layers.
//!
//! ## Components
//! - **Diagnostics**: injected event sink (`Diagnostics`) and its tracing implementation
//! - **Logging**: `tracing-subscriber` setup for binaries
//! - **Metrics**: atomic counters fed by diagnostic events
//! - **Security**: salt generation and salted SHA-256 password hashing

pub mod diagnostics;
pub mod logging;
pub mod metrics;
pub mod security;

pub use diagnostics::{DiagnosticEvent, Diagnostics, NoopDiagnostics, TracingDiagnostics};
pub use metrics::{Fanout, Metrics, MetricsSnapshot};
