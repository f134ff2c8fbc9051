//! Error types and result definitions for configuration resolution.
//!
//! Every failure raised while turning property files into a [`crate::ResolvedConfig`] is a
//! [`ConfigError`]. The error carries an [`ErrorKind`], a static description, optional dynamic
//! detail, the offending key/data source/value and the callsite that raised it, so that callers
//! can decide how to log it and whether to terminate the process.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for configuration operations using [`ConfigError`] as the error type.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Specific categories of errors that can occur while resolving configuration.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration source errors
    SourceLoadFailed,

    // Validation errors
    InvalidValue,
    MissingRequiredField,
    UnrecognizedProviderType,
    InvalidTableMapping,
    InvalidState,
}

impl ErrorKind {
    /// Returns `true` when the error originates from reading a property file rather than from
    /// the semantics of its content.
    pub fn is_source_error(&self) -> bool {
        matches!(self, ErrorKind::SourceLoadFailed)
    }
}

/// Key, data source and value that an error refers to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub key: Option<String>,
    pub data_source: Option<String>,
    pub value: Option<String>,
}

impl ErrorContext {
    fn is_empty(&self) -> bool {
        self.key.is_none() && self.data_source.is_none() && self.value.is_none()
    }
}

/// Main error type for configuration resolution.
#[derive(Debug, Clone)]
pub struct ConfigError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    context: ErrorContext,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

impl ConfigError {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the key, data source and value this error refers to.
    pub fn context(&self) -> &ErrorContext {
        &self.context
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Attaches the offending property key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.context.key = Some(key.into());
        self
    }

    /// Attaches the name of the data source being resolved.
    pub fn with_data_source(mut self, data_source: impl Into<String>) -> Self {
        self.context.data_source = Some(data_source.into());
        self
    }

    /// Attaches the offending value.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.context.value = Some(value.into());
        self
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// The stored source is preserved across clones and exposed via [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Creates a [`ConfigError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
    ) -> Self {
        ConfigError {
            kind,
            description,
            detail,
            context: ErrorContext::default(),
            source: None,
            location: Location::caller(),
        }
    }
}

impl PartialEq for ConfigError {
    fn eq(&self, other: &ConfigError) -> bool {
        self.kind == other.kind
            && self.description == other.description
            && self.context == other.context
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[{:?}] {}", self.kind, self.description)?;

        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }

        if !self.context.is_empty() {
            let mut fields = Vec::with_capacity(3);
            if let Some(data_source) = &self.context.data_source {
                fields.push(format!("data source `{data_source}`"));
            }
            if let Some(key) = &self.context.key {
                fields.push(format!("key `{key}`"));
            }
            if let Some(value) = &self.context.value {
                fields.push(format!("value `{value}`"));
            }
            write!(f, " ({})", fields.join(", "))?;
        }

        write!(
            f,
            " @ {}:{}:{}",
            self.location.file(),
            self.location.line(),
            self.location.column()
        )
    }
}

impl error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

/// Creates a [`ConfigError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for ConfigError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> ConfigError {
        ConfigError::from_components(kind, Cow::Borrowed(desc), None)
    }
}

/// Creates a [`ConfigError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for ConfigError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> ConfigError {
        ConfigError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()))
    }
}
