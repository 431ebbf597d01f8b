//! Configuration loading, env substitution, and static validation.
//!
//! Config files: `inference-gateway.toml`, `.yaml`, or `.json`, searched in
//! `./` then `~/.config/inference-gateway/`. Supports `${ENV_VAR}`
//! substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use loader::{config_dir, discover_and_load, load_config};
pub use schema::{
    AliasConfig, BackoffSettings, Capabilities, CanonicalModel, ComboConfig, ConfigFile,
    GatewayConfig, HealthSettings, ProviderConfig, ProviderKind, RateLimitsConfig, ResolvedSecret,
};
pub use validate::{Diagnostic, Severity, ValidationResult, validate};
