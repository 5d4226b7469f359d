use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CardexError {
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Model '{model}' not allowed. Allowed: {allowed:?}")]
    ModelNotAllowed { model: String, allowed: Vec<String> },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("Model endpoint error: {message}")]
    ModelEndpoint { message: String },

    #[error("Invalid JSON after repair retry: {message}")]
    InvalidModelOutput { message: String },

    #[error("External service error: {service} - {message}")]
    ExternalService { service: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl CardexError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn model_not_allowed(model: impl Into<String>, allowed: &[String]) -> Self {
        Self::ModelNotAllowed {
            model: model.into(),
            allowed: allowed.to_vec(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    pub fn model_endpoint(message: impl Into<String>) -> Self {
        Self::ModelEndpoint {
            message: message.into(),
        }
    }

    pub fn invalid_model_output(message: impl Into<String>) -> Self {
        Self::InvalidModelOutput {
            message: message.into(),
        }
    }

    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalService {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::ModelNotAllowed { .. } => "MODEL_NOT_ALLOWED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Io { .. } => "IO_ERROR",
            Self::ModelEndpoint { .. } => "MODEL_ENDPOINT_ERROR",
            Self::InvalidModelOutput { .. } => "INVALID_MODEL_OUTPUT",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::ModelNotAllowed { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::Io { .. } => 500,
            Self::ModelEndpoint { .. } => 502,
            Self::InvalidModelOutput { .. } => 502,
            Self::ExternalService { .. } => 502,
            Self::Configuration { .. } => 500,
            Self::Internal { .. } => 500,
        }
    }
}

pub type CardexResult<T> = Result<T, CardexError>;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl From<CardexError> for ErrorResponse {
    fn from(error: CardexError) -> Self {
        Self {
            error: error.to_string(),
            code: error.error_code().to_string(),
            message: error.to_string(),
            details: None,
        }
    }
}

// Conversion from common error types
impl From<std::io::Error> for CardexError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<reqwest::Error> for CardexError {
    fn from(error: reqwest::Error) -> Self {
        Self::external_service("HTTP Client", error.to_string())
    }
}

impl From<serde_json::Error> for CardexError {
    fn from(error: serde_json::Error) -> Self {
        Self::validation("JSON", error.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for CardexError {
    fn from(error: jsonwebtoken::errors::Error) -> Self {
        Self::configuration(format!("Service account key: {}", error))
    }
}
