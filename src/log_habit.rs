use crate::db::Habit;
use crate::llm::{self, TextGenerator};
use crate::logging;
use crate::matcher;
use crate::modes::AIResponse;
use crate::prompts::{self, LOG_HABIT_SCHEMA, LOG_HABIT_SYSTEM_PROMPT};
use crate::router::Intent;
use serde::{Deserialize, Serialize};

/// Turns of conversation history that reach the parsing prompt
pub const MAX_HISTORY_TURNS: usize = 6;

pub const NOTHING_CAUGHT_MESSAGE: &str = "I didn't catch any activities in that message. Try something like \"I did my morning run\" or \"completed 30 minutes of reading\".";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: &str) -> Self {
        Self { role: "user".to_string(), content: content.to_string() }
    }

    pub fn assistant(content: &str) -> Self {
        Self { role: "assistant".to_string(), content: content.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedCompletion {
    pub habit_id: String,
    pub habit_name: String,
    pub matched: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogHabitData {
    pub completions: Vec<LoggedCompletion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggest_create: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmatched_activities: Option<Vec<String>>,
}

impl LogHabitData {
    pub fn matched(&self) -> impl Iterator<Item = &LoggedCompletion> {
        self.completions.iter().filter(|c| c.matched)
    }

    pub fn unmatched(&self) -> &[String] {
        self.unmatched_activities.as_deref().unwrap_or(&[])
    }
}

/// One activity the model pulled out of the message
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedHabit {
    pub habit_name: String,
    #[serde(default)]
    pub matched_to: Option<String>,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParsedHabits {
    #[serde(default)]
    parsed_habits: Vec<ParsedHabit>,
}

/// The trailing window of history the prompt is allowed to see
pub fn recent_history(history: &[ChatTurn]) -> &[ChatTurn] {
    let start = history.len().saturating_sub(MAX_HISTORY_TURNS);
    &history[start..]
}

fn format_history(history: &[ChatTurn]) -> String {
    if history.is_empty() {
        return String::new();
    }

    let lines: Vec<String> = history
        .iter()
        .map(|turn| {
            let speaker = if turn.role == "user" { "User" } else { "AI" };
            format!("{}: {}", speaker, turn.content)
        })
        .collect();

    format!("RECENT CONVERSATION HISTORY:\n{}\n\n", lines.join("\n"))
}

fn build_system_prompt(habits: &[Habit], history: &[ChatTurn]) -> String {
    let habit_list = if habits.is_empty() {
        "No habits created yet".to_string()
    } else {
        habits.iter().map(|h| h.name.as_str()).collect::<Vec<_>>().join(", ")
    };

    format!(
        "{}\n\n{}",
        prompts::fill(LOG_HABIT_SYSTEM_PROMPT, "HABITS", &habit_list),
        format_history(recent_history(history))
    )
}

/// Parse free text into habit completions, matched against `habits`.
///
/// Nothing is persisted here; the orchestrator applies side effects.
pub async fn handle_log_habit(
    generator: &dyn TextGenerator,
    message: &str,
    habits: &[Habit],
    history: &[ChatTurn],
) -> AIResponse {
    let system_prompt = build_system_prompt(habits, history);
    let parsed: Option<ParsedHabits> =
        llm::generate_json(generator, message, &system_prompt, LOG_HABIT_SCHEMA).await;

    let parsed_habits = match parsed {
        Some(p) if !p.parsed_habits.is_empty() => p.parsed_habits,
        _ => {
            logging::log_mode(None, "log_habit: no activities parsed");
            return AIResponse::text(Intent::LogHabit, NOTHING_CAUGHT_MESSAGE);
        }
    };

    let mut completions = Vec::with_capacity(parsed_habits.len());
    let mut unmatched = Vec::new();

    for parsed in &parsed_habits {
        match matcher::match_habit(&parsed.habit_name, parsed.matched_to.as_deref(), habits) {
            Some(habit) => completions.push(LoggedCompletion {
                habit_id: habit.id.clone(),
                habit_name: habit.name.clone(),
                matched: true,
            }),
            None => {
                unmatched.push(parsed.habit_name.clone());
                completions.push(LoggedCompletion {
                    habit_id: String::new(),
                    habit_name: parsed.habit_name.clone(),
                    matched: false,
                });
            }
        }
    }

    let matched_names: Vec<String> = completions
        .iter()
        .filter(|c| c.matched)
        .map(|c| c.habit_name.clone())
        .collect();

    logging::log_mode(
        None,
        &format!("log_habit: {} matched, {} unmatched", matched_names.len(), unmatched.len()),
    );

    AIResponse {
        mode: Intent::LogHabit,
        message: compose_message(&matched_names, &unmatched),
        data: Some(LogHabitData {
            completions,
            suggest_create: Some(!unmatched.is_empty()),
            unmatched_activities: Some(unmatched),
        }),
    }
}

/// Celebrate matched habits, then invite the user to add the rest
pub fn compose_message(matched: &[String], unmatched: &[String]) -> String {
    let mut message = match matched {
        [] => String::new(),
        [only] => format!("Great job completing {}! That's logged for today.", only),
        many => format!("Awesome! Logged {}. You're building momentum.", many.join(" and ")),
    };

    if unmatched.is_empty() {
        return message;
    }

    let single = unmatched.len() == 1;
    let suggestions = quoted_list(unmatched);

    if matched.is_empty() {
        message = format!(
            "I see you completed {}, but {} in your habit list yet.\n\nWould you like to create {} for {}? You can add habits from the dashboard.",
            suggestions,
            if single { "this isn't" } else { "these aren't" },
            if single { "a new habit" } else { "new habits" },
            if single { "this" } else { "these" },
        );
    } else {
        message.push_str(&format!(
            "\n\nI noticed you also did {}, but {} not in your habit list yet. Want to add {} as {}?",
            suggestions,
            if single { "it's" } else { "they're" },
            if single { "it" } else { "them" },
            if single { "a new habit" } else { "new habits" },
        ));
    }

    message
}

pub(crate) fn quoted_list(names: &[String]) -> String {
    names.iter().map(|n| format!("\"{}\"", n)).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Frequency;
    use crate::llm::testing::MockGenerator;

    fn habit(id: &str, name: &str) -> Habit {
        Habit {
            id: id.to_string(),
            user_id: "u1".to_string(),
            name: name.to_string(),
            description: None,
            color: "#8b5cf6".to_string(),
            icon: "✨".to_string(),
            frequency: Frequency::Daily,
            weekly_days: None,
            reminder_time: None,
            archived: false,
            created_at: "2024-01-01 00:00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn test_compound_message_matches_both() {
        let habits = vec![habit("h1", "Morning Run"), habit("h2", "Reading")];
        let mock = MockGenerator::new().reply(
            r#"{"parsedHabits":[
                {"habitName":"Run","matchedTo":"Morning Run","confidence":0.9},
                {"habitName":"Reading","matchedTo":"Reading","confidence":0.95}
            ]}"#,
        );

        let response = handle_log_habit(&mock, "I ran and then read for 30 minutes", &habits, &[]).await;
        let data = response.data.unwrap();
        assert_eq!(data.completions.len(), 2);
        assert!(data.completions.iter().all(|c| c.matched));
        assert_eq!(data.suggest_create, Some(false));
        assert_eq!(response.message, "Awesome! Logged Morning Run and Reading. You're building momentum.");
    }

    #[tokio::test]
    async fn test_unmatched_activity_is_surfaced() {
        let habits = vec![habit("h2", "Reading")];
        let mock = MockGenerator::new()
            .reply(r#"{"parsedHabits":[{"habitName":"Yoga","matchedTo":null,"confidence":0.8}]}"#);

        let response = handle_log_habit(&mock, "did yoga today", &habits, &[]).await;
        let data = response.data.unwrap();
        assert_eq!(data.unmatched(), ["Yoga".to_string()]);
        assert_eq!(data.completions[0].habit_id, "");
        assert!(!data.completions[0].matched);
        assert!(response.message.starts_with("I see you completed \"Yoga\", but this isn't"));
    }

    #[tokio::test]
    async fn test_nothing_parsed_asks_to_rephrase() {
        let habits = vec![habit("h1", "Reading")];
        let empty = MockGenerator::new().reply(r#"{"parsedHabits":[]}"#);
        let response = handle_log_habit(&empty, "hmm", &habits, &[]).await;
        assert_eq!(response.message, NOTHING_CAUGHT_MESSAGE);
        assert!(response.data.is_none());

        let failing = MockGenerator::new().fail("timeout");
        let response = handle_log_habit(&failing, "hmm", &habits, &[]).await;
        assert_eq!(response.mode, Intent::LogHabit);
        assert!(response.data.is_none());
    }

    #[tokio::test]
    async fn test_prompt_carries_habits_and_recent_history() {
        let habits = vec![habit("h1", "Reading")];
        let history: Vec<ChatTurn> = (0..8)
            .map(|i| if i % 2 == 0 { ChatTurn::user(&format!("turn {}", i)) } else { ChatTurn::assistant(&format!("turn {}", i)) })
            .collect();
        let mock = MockGenerator::new().reply(r#"{"parsedHabits":[]}"#);

        handle_log_habit(&mock, "read a chapter", &habits, &history).await;
        let (prompt, _) = &mock.prompts()[0];
        assert!(prompt.contains("User's known habits: Reading"));
        assert!(prompt.contains("User: turn 2"));
        assert!(prompt.contains("AI: turn 7"));
        assert!(!prompt.contains("AI: turn 1"));
    }

    #[test]
    fn test_compose_message_mixed() {
        let message = compose_message(&["Reading".to_string()], &["Yoga".to_string(), "Swim".to_string()]);
        assert!(message.starts_with("Great job completing Reading!"));
        assert!(message.contains("\"Yoga\", \"Swim\", but they're not in your habit list yet. Want to add them as new habits?"));
    }

    #[test]
    fn test_recent_history_keeps_last_six() {
        let history: Vec<ChatTurn> = (0..10).map(|i| ChatTurn::user(&i.to_string())).collect();
        let recent = recent_history(&history);
        assert_eq!(recent.len(), 6);
        assert_eq!(recent[0].content, "4");
        assert_eq!(recent_history(&history[..2]).len(), 2);
    }
}
