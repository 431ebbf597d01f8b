use thiserror::Error;

/// Generic internal error used by plumbing code (config loading, KVStore
/// adapters, etc.) that isn't itself part of the request-facing taxonomy.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("internal error")]
    Other {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    #[must_use]
    pub fn other(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Other {
            source: Box::new(source),
        }
    }
}

impl FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Trait for error types that can be constructed from a plain message string.
///
/// Implement this for your crate's error type, then invoke [`impl_context!`]
/// in your error module to get `.context()` and `.with_context()` on `Result`
/// and `Option`.
pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;
}

/// Generate a crate-local `Context` trait with `.context()` and `.with_context()`
/// methods on `Result` and `Option`.
///
/// Invoke inside a module that defines `Error: FromMessage` and
/// `type Result<T> = std::result::Result<T, Error>`.
///
/// ```ignore
/// // in crates/foo/src/error.rs
/// ig_common::impl_context!();
/// ```
#[macro_export]
macro_rules! impl_context {
    () => {
        pub trait Context<T> {
            fn context(self, context: impl Into<String>) -> Result<T>;
            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C;
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                let ctx = context.into();
                self.map_err(|source| {
                    <Error as $crate::FromMessage>::from_message(format!("{ctx}: {source}"))
                })
            }

            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C,
            {
                self.map_err(|source| {
                    let ctx = f().into();
                    <Error as $crate::FromMessage>::from_message(format!("{ctx}: {source}"))
                })
            }
        }

        impl<T> Context<T> for Option<T> {
            fn context(self, context: impl Into<String>) -> Result<T> {
                self.ok_or_else(|| <Error as $crate::FromMessage>::from_message(context.into()))
            }

            fn with_context<C, F>(self, f: F) -> Result<T>
            where
                C: Into<String>,
                F: FnOnce() -> C,
            {
                self.ok_or_else(|| <Error as $crate::FromMessage>::from_message(f().into()))
            }
        }
    };
}

// ── Request-facing error taxonomy ───────────────────────────────────────────

/// The wire-agnostic error taxonomy the request pipeline classifies every
/// failure into. Each variant carries enough detail to render an HTTP
/// response without the caller needing to know provider-specific detail.
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("malformed request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("no enabled provider for model: {0}")]
    NoEnabledProvider(String),

    #[error("upstream authentication failed on all candidates")]
    UpstreamAuth { detail: String },

    #[error("upstream rate limited")]
    UpstreamRateLimit { detail: String },

    #[error("upstream transient failure")]
    UpstreamTransient { detail: String },

    #[error("upstream content filter: {0}")]
    UpstreamContentFiltered(String),

    #[error("no healthy providers available")]
    NoHealthyProviders,

    #[error("client cancelled the request")]
    ClientCancelled,

    #[error("request body too large")]
    BodyTooLarge,

    #[error("internal error: {0}")]
    InternalError(String),
}

impl GatewayError {
    /// A short machine-readable code, used in the `{"error":{"code":...}}`
    /// JSON body and in log lines.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::ModelNotFound(_) => "model_not_found",
            Self::NoEnabledProvider(_) => "no_enabled_provider",
            Self::UpstreamAuth { .. } => "upstream_auth",
            Self::UpstreamRateLimit { .. } => "upstream_rate_limit",
            Self::UpstreamTransient { .. } => "upstream_transient",
            Self::UpstreamContentFiltered(_) => "content_filter",
            Self::NoHealthyProviders => "no_healthy_providers",
            Self::ClientCancelled => "client_cancelled",
            Self::BodyTooLarge => "body_too_large",
            Self::InternalError(_) => "internal_error",
        }
    }

    /// The HTTP status code this error maps to.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) | Self::UpstreamContentFiltered(_) => 400,
            Self::Unauthorized => 401,
            Self::ModelNotFound(_) => 404,
            Self::ClientCancelled => 499,
            Self::UpstreamAuth { .. } => 502,
            Self::UpstreamRateLimit { .. }
            | Self::UpstreamTransient { .. }
            | Self::NoEnabledProvider(_)
            | Self::NoHealthyProviders => 503,
            Self::BodyTooLarge => 413,
            Self::InternalError(_) => 500,
        }
    }

    /// Whether the request pipeline may still try the next candidate after
    /// this error, per the adapter error-category table.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamRateLimit { .. } | Self::UpstreamTransient { .. }
        )
    }
}
