//! Prometheus metrics for the inference gateway, built on the `metrics`
//! facade crate. Call sites use the facade macros directly (`counter!`,
//! `gauge!`, `histogram!`) with the name constants this crate defines; when
//! the `prometheus` feature is enabled, [`init_metrics`] installs a global
//! recorder whose `/metrics` text is served via [`MetricsHandle::render`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use ig_metrics::{counter, upstream};
//!
//! counter!(upstream::ATTEMPTS_TOTAL, "provider_key" => "openai").increment(1);
//! ```

mod definitions;
mod error;
mod recorder;
pub mod tracing_integration;

pub use definitions::*;
pub use error::{Error, Result};
pub use recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics};

pub use metrics::{counter, gauge, histogram};
