use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the persistence layer
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Habit not found: {habit_id}")]
    HabitNotFound { habit_id: String },

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: String },

    #[error("Duplicate completion: habit {habit_id} already logged for {day}")]
    DuplicateCompletion { habit_id: String, day: String },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Errors raised by text-generation providers
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("No text in model response")]
    EmptyResponse,

    #[error("Model call timed out after {0}s")]
    Timeout(u64),

    #[error("Missing API key for {0}")]
    MissingApiKey(String),
}

/// Errors surfaced to the caller of an assistant turn
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssistantError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("The assistant is busy right now. Please try again in a moment.")]
    RateLimited,

    #[error("AI processing failed")]
    Failed,
}

/// `{error, retryable?}` body returned on failure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl AssistantError {
    pub fn status(&self) -> u16 {
        match self {
            AssistantError::Unauthorized => 401,
            AssistantError::Validation(_) => 400,
            AssistantError::NotFound(_) => 404,
            AssistantError::RateLimited => 429,
            AssistantError::Failed => 500,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AssistantError::RateLimited)
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: self.to_string(),
            retryable: self.is_retryable().then_some(true),
        }
    }
}

/// True when an error message carries a rate-limit marker
pub fn is_rate_limited(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("429") || lower.contains("quota")
}

/// Map an unexpected failure to the caller-facing taxonomy without leaking detail
pub fn classify_failure(message: &str) -> AssistantError {
    if is_rate_limited(message) {
        AssistantError::RateLimited
    } else {
        AssistantError::Failed
    }
}

/// Classify a store failure from its backend message alone; ids and dates in
/// the other variants never count as rate-limit markers
pub fn classify_store_failure(error: &StoreError) -> AssistantError {
    match error {
        StoreError::Database(e) => classify_failure(&e.to_string()),
        StoreError::Backend(message) => classify_failure(message),
        _ => AssistantError::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AssistantError::Unauthorized.status(), 401);
        assert_eq!(AssistantError::Validation("Message is required".into()).status(), 400);
        assert_eq!(AssistantError::NotFound("User not found".into()).status(), 404);
        assert_eq!(AssistantError::RateLimited.status(), 429);
        assert_eq!(AssistantError::Failed.status(), 500);
    }

    #[test]
    fn test_rate_limit_markers() {
        assert!(is_rate_limited("Gemini API error (429 Too Many Requests): slow down"));
        assert!(is_rate_limited("Resource has been exhausted (e.g. check QUOTA)"));
        assert!(!is_rate_limited("Database error: disk I/O error"));
    }

    #[test]
    fn test_classify_failure_is_opaque() {
        assert_eq!(classify_failure("quota exceeded"), AssistantError::RateLimited);
        let generic = classify_failure("no such table: habits");
        assert_eq!(generic, AssistantError::Failed);
        assert_eq!(generic.envelope().error, "AI processing failed");
    }

    #[test]
    fn test_store_failure_ignores_ids() {
        let not_found = StoreError::HabitNotFound { habit_id: "7f1c4290-0000-4000-8000-000000000429".to_string() };
        assert!(is_rate_limited(&not_found.to_string()));
        assert_eq!(classify_store_failure(&not_found), AssistantError::Failed);

        let duplicate = StoreError::DuplicateCompletion { habit_id: "quota-tracker".to_string(), day: "2024-03-15".to_string() };
        assert_eq!(classify_store_failure(&duplicate), AssistantError::Failed);

        let backend = StoreError::Backend("upstream returned 429".to_string());
        assert_eq!(classify_store_failure(&backend), AssistantError::RateLimited);
    }

    #[test]
    fn test_envelope_marks_only_rate_limit_retryable() {
        let busy = AssistantError::RateLimited.envelope();
        assert_eq!(busy.retryable, Some(true));

        let json = serde_json::to_value(AssistantError::Unauthorized.envelope()).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "Unauthorized" }));
    }
}
