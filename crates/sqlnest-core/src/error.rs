//! Error types for sqlnest operations.

use crate::value::Value;
use std::fmt;

/// The primary error type for planning and executing nested queries.
#[derive(Debug)]
pub enum Error {
    /// A field or association name was not found on a model
    UnknownField(UnknownFieldError),
    /// Malformed attribute, filter, sort or definition string
    InvalidSyntax(SyntaxError),
    /// A valid name used in a way its field kind does not allow
    InvalidUsage(UsageError),
    /// The SQL executor failed
    Execution(ExecutionError),
    /// Model definitions could not be baked into a consistent graph
    Definition(DefinitionError),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug, Clone)]
pub struct UnknownFieldError {
    /// Qualified name of the model that was searched
    pub model: String,
    /// The name that was not found
    pub field: String,
}

#[derive(Debug, Clone)]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    /// The offending input, verbatim
    pub input: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    /// Attribute shorthand such as `"country.name alias"`
    Attribute,
    /// Filter key or filter structure
    Filter,
    /// Sort key such as `"-country.name"`
    Sort,
    /// Model definition document
    Definition,
}

#[derive(Debug, Clone)]
pub struct UsageError {
    pub kind: UsageErrorKind,
    pub model: String,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageErrorKind {
    /// Sub-field requested on a one-to-many association
    SubFieldOnMultiValue,
    /// Sub-field requested on a field that already yields a single value
    SubFieldOnSingleValue,
    /// One-to-many association referenced from a filter or sort
    MultiValueInFilter,
    /// Join type string other than `left` / `inner`
    InvalidJoinType,
    /// Calculated field referenced from a filter or sort
    NotFilterable,
    /// The same output alias requested twice at one level
    DuplicateAlias,
}

#[derive(Debug)]
pub struct ExecutionError {
    pub message: String,
    /// Generated SQL, attached in diagnostic mode
    pub sql: Option<String>,
    /// Bound parameters, attached in diagnostic mode
    pub params: Option<Vec<Value>>,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone)]
pub struct DefinitionError {
    pub model: String,
    pub message: String,
}

impl Error {
    /// Create an unknown-field error.
    pub fn unknown_field(model: impl Into<String>, field: impl Into<String>) -> Self {
        Error::UnknownField(UnknownFieldError {
            model: model.into(),
            field: field.into(),
        })
    }

    /// Create a syntax error.
    pub fn syntax(
        kind: SyntaxErrorKind,
        input: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::InvalidSyntax(SyntaxError {
            kind,
            input: input.into(),
            message: message.into(),
        })
    }

    /// Create an invalid-usage error.
    pub fn usage(
        kind: UsageErrorKind,
        model: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::InvalidUsage(UsageError {
            kind,
            model: model.into(),
            field: field.into(),
            message: message.into(),
        })
    }

    /// Create a definition error.
    pub fn definition(model: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Definition(DefinitionError {
            model: model.into(),
            message: message.into(),
        })
    }

    /// Create an execution error without query annotations.
    pub fn execution(message: impl Into<String>) -> Self {
        Error::Execution(ExecutionError {
            message: message.into(),
            sql: None,
            params: None,
            source: None,
        })
    }

    /// Is this raised while resolving a request (as opposed to running it)?
    ///
    /// Only these errors are subject to silent mode.
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            Error::UnknownField(_) | Error::InvalidSyntax(_) | Error::InvalidUsage(_)
        )
    }

    /// Get the usage error kind, if this is a usage error.
    pub fn usage_kind(&self) -> Option<UsageErrorKind> {
        match self {
            Error::InvalidUsage(u) => Some(u.kind),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if it was attached.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Execution(e) => e.sql.as_deref(),
            _ => None,
        }
    }

    /// Get the bound parameters of the failing query, if they were attached.
    pub fn params(&self) -> Option<&[Value]> {
        match self {
            Error::Execution(e) => e.params.as_deref(),
            _ => None,
        }
    }

    /// Attach the failing SQL and parameters.
    ///
    /// Execution errors are annotated in place; any other error is wrapped
    /// into an [`ExecutionError`] whose source is the original error.
    pub fn with_query(self, sql: impl Into<String>, params: Vec<Value>) -> Self {
        match self {
            Error::Execution(mut e) => {
                e.sql = Some(sql.into());
                e.params = Some(params);
                Error::Execution(e)
            }
            other => Error::Execution(ExecutionError {
                message: other.to_string(),
                sql: Some(sql.into()),
                params: Some(params),
                source: Some(Box::new(other)),
            }),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownField(e) => write!(f, "Unknown field: {}", e),
            Error::InvalidSyntax(e) => write!(f, "Invalid syntax: {}", e),
            Error::InvalidUsage(e) => write!(f, "Invalid usage: {}", e),
            Error::Execution(e) => write!(f, "Execution error: {}", e),
            Error::Definition(e) => write!(f, "Definition error: {}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Execution(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for UnknownFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model '{}' has no field '{}'", self.model, self.field)
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            SyntaxErrorKind::Attribute => "attribute",
            SyntaxErrorKind::Filter => "filter",
            SyntaxErrorKind::Sort => "sort",
            SyntaxErrorKind::Definition => "definition",
        };
        write!(f, "{} '{}': {}", what, self.input, self.message)
    }
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} {}", self.model, self.field, self.message)
    }
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(sql) = &self.sql {
            write!(f, " [sql: {}]", sql)?;
        }
        if let Some(params) = &self.params {
            write!(f, " [params: {:?}]", params)?;
        }
        Ok(())
    }
}

impl fmt::Display for DefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.model, self.message)
    }
}

impl From<UnknownFieldError> for Error {
    fn from(err: UnknownFieldError) -> Self {
        Error::UnknownField(err)
    }
}

impl From<SyntaxError> for Error {
    fn from(err: SyntaxError) -> Self {
        Error::InvalidSyntax(err)
    }
}

impl From<UsageError> for Error {
    fn from(err: UsageError) -> Self {
        Error::InvalidUsage(err)
    }
}

impl From<ExecutionError> for Error {
    fn from(err: ExecutionError) -> Self {
        Error::Execution(err)
    }
}

impl From<DefinitionError> for Error {
    fn from(err: DefinitionError) -> Self {
        Error::Definition(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::syntax(SyntaxErrorKind::Definition, "", err.to_string())
    }
}

/// Result type alias for sqlnest operations.
pub type Result<T> = std::result::Result<T, Error>;
