use crate::error::LlmError;
use crate::logging;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// A text-generation backend. Implementations may fail; callers own the fallback.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String, LlmError>;
}

/// Strip a ```json fence the model sometimes wraps around its answer
pub fn clean_json_response(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```JSON"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open.trim_end().trim_end_matches("```").trim()
}

/// Ask for JSON matching `schema` and parse it. Any call or parse failure is `None`.
pub async fn generate_json<T>(
    generator: &dyn TextGenerator,
    prompt: &str,
    system_prompt: &str,
    schema: &str,
) -> Option<T>
where
    T: DeserializeOwned,
{
    let full_prompt = format!(
        "{}\n\nIMPORTANT: Respond with valid JSON only. No markdown, no explanation.\nExpected schema: {}\n\nUser input: {}",
        system_prompt, schema, prompt
    );

    let response = match generator.generate_text(&full_prompt, None).await {
        Ok(text) => text,
        Err(e) => {
            logging::log_error(None, &format!("Structured generation failed: {}", e));
            return None;
        }
    };

    let cleaned = clean_json_response(&response);
    match serde_json::from_str::<T>(cleaned) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            logging::log_error(None, &format!("Failed to parse model JSON: {}. Response was: {}", e, cleaned));
            None
        }
    }
}

/// Bounds every call of the wrapped generator
pub struct TimedGenerator<G> {
    inner: G,
    timeout: Duration,
}

impl<G> TimedGenerator<G> {
    pub fn new(inner: G, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<G> TextGenerator for TimedGenerator<G>
where
    G: TextGenerator,
{
    async fn generate_text(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String, LlmError> {
        match tokio::time::timeout(self.timeout, self.inner.generate_text(prompt, system_prompt)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.timeout.as_secs())),
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays scripted replies in order and records every prompt it sees
    #[derive(Default)]
    pub struct MockGenerator {
        replies: Mutex<VecDeque<Result<String, String>>>,
        prompts: Mutex<Vec<(String, Option<String>)>>,
    }

    impl MockGenerator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, text: &str) -> Self {
            self.replies.lock().unwrap().push_back(Ok(text.to_string()));
            self
        }

        pub fn fail(self, message: &str) -> Self {
            self.replies.lock().unwrap().push_back(Err(message.to_string()));
            self
        }

        pub fn prompts(&self) -> Vec<(String, Option<String>)> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TextGenerator for MockGenerator {
        async fn generate_text(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String, LlmError> {
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.to_string(), system_prompt.map(|s| s.to_string())));

            match self.replies.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(message)) => Err(LlmError::Api { status: 500, message }),
                None => Err(LlmError::EmptyResponse),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MockGenerator;
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Classified {
        intent: String,
        confidence: f64,
    }

    #[test]
    fn test_clean_json_response() {
        assert_eq!(clean_json_response("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(clean_json_response("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(clean_json_response("```\n[]\n```"), "[]");
    }

    #[tokio::test]
    async fn test_generate_json_parses_fenced_reply() {
        let mock = MockGenerator::new().reply("```json\n{\"intent\":\"coach\",\"confidence\":0.9}\n```");
        let parsed: Option<Classified> = generate_json(&mock, "I skipped the gym", "classify", "{}").await;
        assert_eq!(parsed, Some(Classified { intent: "coach".to_string(), confidence: 0.9 }));

        let (prompt, system) = &mock.prompts()[0];
        assert!(prompt.contains("Respond with valid JSON only"));
        assert!(prompt.ends_with("User input: I skipped the gym"));
        assert!(system.is_none());
    }

    #[tokio::test]
    async fn test_generate_json_is_none_on_failure() {
        let mock = MockGenerator::new().fail("boom").reply("not json");
        let first: Option<Classified> = generate_json(&mock, "x", "s", "{}").await;
        let second: Option<Classified> = generate_json(&mock, "x", "s", "{}").await;
        assert!(first.is_none());
        assert!(second.is_none());
    }

    struct SlowGenerator;

    #[async_trait]
    impl TextGenerator for SlowGenerator {
        async fn generate_text(&self, _prompt: &str, _system: Option<&str>) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
    }

    #[tokio::test]
    async fn test_timed_generator_times_out() {
        let timed = TimedGenerator::new(SlowGenerator, Duration::from_millis(20));
        let result = timed.generate_text("hello", None).await;
        assert!(matches!(result, Err(LlmError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_timed_generator_passes_through() {
        let timed = TimedGenerator::new(MockGenerator::new().reply("hi"), Duration::from_secs(1));
        assert_eq!(timed.generate_text("hello", Some("sys")).await.unwrap(), "hi");
    }
}
