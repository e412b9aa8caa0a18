use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum OrchestratorError {
    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Mailer error: {message}")]
    Mailer { message: String },

    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Cooldown not satisfied: {message}")]
    CooldownActive { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl OrchestratorError {
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database { message: message.into() }
    }

    pub fn mailer(message: impl Into<String>) -> Self {
        Self::Mailer { message: message.into() }
    }

    pub fn template(message: impl Into<String>) -> Self {
        Self::Template { message: message.into() }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Database { .. } => "DATABASE_ERROR",
            Self::Mailer { .. } => "MAILER_ERROR",
            Self::Template { .. } => "TEMPLATE_ERROR",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::CooldownActive { .. } => "COOLDOWN_ACTIVE",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

impl From<sqlx::Error> for OrchestratorError {
    fn from(error: sqlx::Error) -> Self {
        Self::database(error.to_string())
    }
}

impl From<reqwest::Error> for OrchestratorError {
    fn from(error: reqwest::Error) -> Self {
        Self::mailer(error.to_string())
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(error: serde_json::Error) -> Self {
        Self::validation("JSON", error.to_string())
    }
}

impl From<config::ConfigError> for OrchestratorError {
    fn from(error: config::ConfigError) -> Self {
        Self::configuration(error.to_string())
    }
}

impl From<handlebars::RenderError> for OrchestratorError {
    fn from(error: handlebars::RenderError) -> Self {
        Self::template(error.to_string())
    }
}
