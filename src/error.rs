use std::collections::BTreeMap;
use std::fmt;

/// Why a single field failed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationReason {
    Required,
    TooShort,
    Cast,
}

impl ValidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationReason::Required => "required",
            ValidationReason::TooShort => "tooShort",
            ValidationReason::Cast => "cast",
        }
    }
}

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub reason: ValidationReason,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, reason: ValidationReason, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// All validation failures of one document, keyed by field path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    pub errors: BTreeMap<String, ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(error: ValidationError) -> Self {
        let mut errors = Self::new();
        errors.push(error);
        errors
    }

    /// Keeps the first failure reported for a field
    pub fn push(&mut self, error: ValidationError) {
        self.errors.entry(error.field.clone()).or_insert(error);
    }

    pub fn get(&self, field: &str) -> Option<&ValidationError> {
        self.errors.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.errors.values().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join(", "))
    }
}

#[derive(Debug)]
pub enum AppError {
    Validation(ValidationErrors),
    NotFound(String),
    CascadeFailure {
        entity: String,
        source: Box<AppError>,
    },
    Connection(String),
    Database(anyhow::Error),
    DatabaseError(String),
    BadRequest(String),
    Serialization(String),
    Configuration(String),
}

impl AppError {
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            AppError::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(errors) => write!(f, "Validation failed: {}", errors),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::CascadeFailure { entity, source } => {
                write!(f, "Cascade delete for {} failed: {}", entity, source)
            }
            AppError::Connection(msg) => write!(f, "Connection error: {}", msg),
            AppError::Database(err) => write!(f, "Database error: {}", err),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            AppError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::CascadeFailure { source, .. } => Some(source.as_ref()),
            AppError::Database(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

pub type AppResult<T> = Result<T, AppError>;
