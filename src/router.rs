use crate::llm::{self, TextGenerator};
use crate::logging;
use crate::prompts::{ROUTER_SCHEMA, ROUTER_SYSTEM_PROMPT};
use serde::{Deserialize, Serialize};

const FALLBACK_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    LogHabit,
    Coach,
    Insight,
    Reflection,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::LogHabit => "log_habit",
            Intent::Coach => "coach",
            Intent::Insight => "insight",
            Intent::Reflection => "reflection",
        }
    }

    pub fn from_str(s: &str) -> Option<Intent> {
        match s.trim().to_lowercase().as_str() {
            "log_habit" => Some(Intent::LogHabit),
            "coach" => Some(Intent::Coach),
            "insight" => Some(Intent::Insight),
            "reflection" => Some(Intent::Reflection),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouterResult {
    pub intent: Intent,
    pub confidence: f64,
}

impl RouterResult {
    pub fn fallback() -> Self {
        Self {
            intent: Intent::Coach,
            confidence: FALLBACK_CONFIDENCE,
        }
    }
}

/// What the classifier sends back before the intent is checked against the closed set
#[derive(Debug, Deserialize)]
struct RawClassification {
    intent: String,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Classify one message. Never fails: anything unusable becomes coach/0.5.
pub async fn route_intent(generator: &dyn TextGenerator, message: &str) -> RouterResult {
    let raw: Option<RawClassification> =
        llm::generate_json(generator, message, ROUTER_SYSTEM_PROMPT, ROUTER_SCHEMA).await;

    let result = match raw {
        Some(raw) => match Intent::from_str(&raw.intent) {
            Some(intent) => RouterResult {
                intent,
                confidence: raw.confidence.unwrap_or(FALLBACK_CONFIDENCE).clamp(0.0, 1.0),
            },
            None => {
                logging::log_routing(None, &format!("Unknown intent '{}', using coach", raw.intent));
                RouterResult::fallback()
            }
        },
        None => {
            logging::log_routing(None, "Classifier unavailable, using coach");
            RouterResult::fallback()
        }
    };

    logging::log_routing(
        None,
        &format!("intent={} confidence={:.2}", result.intent.as_str(), result.confidence),
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::MockGenerator;

    #[test]
    fn test_intent_round_trip_names() {
        for intent in [Intent::LogHabit, Intent::Coach, Intent::Insight, Intent::Reflection] {
            assert_eq!(Intent::from_str(intent.as_str()), Some(intent));
        }
        assert_eq!(serde_json::to_string(&Intent::LogHabit).unwrap(), "\"log_habit\"");
        assert_eq!(Intent::from_str("celebrate"), None);
    }

    #[tokio::test]
    async fn test_route_valid_classification() {
        let mock = MockGenerator::new().reply(r#"{"intent":"log_habit","confidence":0.93}"#);
        let result = route_intent(&mock, "I drank water").await;
        assert_eq!(result.intent, Intent::LogHabit);
        assert!((result.confidence - 0.93).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_unknown_intent_falls_back_to_coach() {
        let mock = MockGenerator::new().reply(r#"{"intent":"celebrate","confidence":0.99}"#);
        assert_eq!(route_intent(&mock, "woo").await, RouterResult::fallback());
    }

    #[tokio::test]
    async fn test_failed_call_falls_back_to_coach() {
        let mock = MockGenerator::new().fail("503 unavailable");
        let result = route_intent(&mock, "how am I doing?").await;
        assert_eq!(result.intent, Intent::Coach);
        assert_eq!(result.confidence, 0.5);
    }

    #[tokio::test]
    async fn test_single_attempt_only() {
        let mock = MockGenerator::new().reply("garbage").reply(r#"{"intent":"insight","confidence":1}"#);
        assert_eq!(route_intent(&mock, "stats?").await, RouterResult::fallback());
        assert_eq!(mock.prompts().len(), 1);
    }
}
