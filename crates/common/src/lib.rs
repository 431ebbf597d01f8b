//! Shared error types and narrow cross-cutting interfaces used by every
//! inference-gateway crate.

pub mod context;
pub mod error;

pub use context::{
    AuthContext, Clock, EventSink, SystemClock, TracingEventSink, TracingUsageSink, UsageRecord,
    UsageSink,
};
pub use error::{Error, FromMessage, GatewayError, Result};
