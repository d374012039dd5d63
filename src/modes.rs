use crate::llm::TextGenerator;
use crate::log_habit::LogHabitData;
use crate::logging;
use crate::prompts::{self, COACH_SYSTEM_PROMPT, INSIGHT_SYSTEM_PROMPT, REFLECTION_SYSTEM_PROMPT};
use crate::router::Intent;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One assistant reply, whatever mode produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AIResponse {
    pub mode: Intent,
    pub message: String,
    pub data: Option<LogHabitData>,
}

impl AIResponse {
    pub fn text(mode: Intent, message: impl Into<String>) -> Self {
        Self {
            mode,
            message: message.into(),
            data: None,
        }
    }
}

/// Call the generator with a filled system prompt, or use the canned reply
async fn generate_or_fallback<F>(
    generator: &dyn TextGenerator,
    mode: Intent,
    message: &str,
    system_prompt: &str,
    fallback: F,
) -> AIResponse
where
    F: FnOnce() -> String,
{
    match generator.generate_text(message, Some(system_prompt)).await {
        Ok(text) => AIResponse::text(mode, text.trim()),
        Err(e) => {
            logging::log_mode(None, &format!("{} generation failed, using fallback: {}", mode.as_str(), e));
            AIResponse::text(mode, fallback())
        }
    }
}

// ============ Coach ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachHabit {
    pub name: String,
    pub completed_today: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachContext {
    pub habits: Vec<CoachHabit>,
    pub today_completed_count: usize,
    pub total_habits: usize,
    pub longest_streak: u32,
}

impl CoachContext {
    pub fn format_for_prompt(&self) -> String {
        let mut lines = vec![
            format!("Completed today: {}/{}", self.today_completed_count, self.total_habits),
            format!("Longest streak: {} days", self.longest_streak),
        ];

        let pending: Vec<&str> = self
            .habits
            .iter()
            .filter(|h| !h.completed_today)
            .map(|h| h.name.as_str())
            .collect();
        if !pending.is_empty() {
            lines.push(format!("Not yet done today: {}", pending.join(", ")));
        }
        lines.join("\n")
    }

    fn fallback_message(&self) -> String {
        match self.habits.iter().find(|h| !h.completed_today) {
            Some(habit) => format!(
                "Missing a day doesn't change who you are. You're someone who shows up. Your next step: do the smallest version of {} before the day ends.",
                habit.name
            ),
            None => "Missing a habit doesn't change who you are. You're someone who shows up. Your next step: pick the smallest version of your habit tomorrow and do just that.".to_string(),
        }
    }
}

pub async fn handle_coach(generator: &dyn TextGenerator, message: &str, context: &CoachContext) -> AIResponse {
    let system_prompt = prompts::fill(COACH_SYSTEM_PROMPT, "CONTEXT", &context.format_for_prompt());
    generate_or_fallback(generator, Intent::Coach, message, &system_prompt, || context.fallback_message()).await
}

// ============ Insight ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightCompletion {
    pub date: NaiveDate,
    pub habit_id: String,
    pub habit_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightHabitStat {
    pub habit_name: String,
    pub completion_rate: f64,
    pub current_streak: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightContext {
    pub completions: Vec<InsightCompletion>,
    pub habit_stats: Vec<InsightHabitStat>,
}

impl InsightContext {
    /// Totals, per-habit rate and streak, then completions per weekday (Monday first)
    pub fn build_data_summary(&self) -> String {
        let mut lines = vec![format!("Total completions this month: {}", self.completions.len())];

        for stat in &self.habit_stats {
            lines.push(format!(
                "- {}: {}% completion, {}-day streak",
                stat.habit_name,
                stat.completion_rate.round(),
                stat.current_streak
            ));
        }

        let mut by_weekday: BTreeMap<u32, (String, usize)> = BTreeMap::new();
        for completion in &self.completions {
            let weekday = completion.date.weekday();
            let entry = by_weekday
                .entry(weekday.num_days_from_monday())
                .or_insert_with(|| (completion.date.format("%A").to_string(), 0));
            entry.1 += 1;
        }

        if !by_weekday.is_empty() {
            lines.push("\nCompletions by day:".to_string());
            for (day, count) in by_weekday.values() {
                lines.push(format!("- {}: {}", day, count));
            }
        }

        lines.join("\n")
    }

    fn fallback_message(&self) -> String {
        let best = self
            .habit_stats
            .iter()
            .max_by(|a, b| a.completion_rate.total_cmp(&b.completion_rate));

        match best {
            Some(stat) => format!(
                "Your strongest habit is \"{}\" at {}% completion. Keep building on this momentum.",
                stat.habit_name,
                stat.completion_rate.round()
            ),
            None => "Keep tracking your habits. Patterns emerge with consistent data.".to_string(),
        }
    }
}

pub async fn handle_insight(generator: &dyn TextGenerator, message: &str, context: &InsightContext) -> AIResponse {
    let system_prompt = prompts::fill(INSIGHT_SYSTEM_PROMPT, "DATA", &context.build_data_summary());
    generate_or_fallback(generator, Intent::Insight, message, &system_prompt, || context.fallback_message()).await
}

// ============ Reflection ============

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectionContext {
    pub completed_count: usize,
    pub total_habits: usize,
    pub completed_habits: Vec<String>,
    pub missed_habits: Vec<String>,
    pub current_streak: u32,
}

impl ReflectionContext {
    pub fn build_data_summary(&self, today: NaiveDate) -> String {
        let mut lines = vec![
            format!("Date: {}", today.format("%A, %B %-d")),
            format!("Completed: {}/{}", self.completed_count, self.total_habits),
            format!("Current streak: {} days", self.current_streak),
        ];

        if !self.completed_habits.is_empty() {
            lines.push(format!("Completed habits: {}", self.completed_habits.join(", ")));
        }
        if !self.missed_habits.is_empty() {
            lines.push(format!("Missed habits: {}", self.missed_habits.join(", ")));
        }

        lines.join("\n")
    }

    pub fn completion_percentage(&self) -> u32 {
        crate::streaks::completion_rate(self.completed_count as u32, self.total_habits as u32)
    }

    fn fallback_message(&self) -> String {
        let percentage = self.completion_percentage();
        if self.total_habits > 0 && percentage == 100 {
            format!(
                "Perfect day. You completed all {} habits. Your {}-day streak continues. Tomorrow, maintain this momentum.",
                self.total_habits, self.current_streak
            )
        } else if percentage >= 50 {
            format!(
                "You completed {} of {} habits today. Progress over perfection. Tomorrow is another opportunity.",
                self.completed_count, self.total_habits
            )
        } else {
            "Today was quiet on the habit front. That's data, not defeat. Tomorrow, start with just one habit and build from there.".to_string()
        }
    }
}

pub async fn handle_reflection(
    generator: &dyn TextGenerator,
    message: &str,
    context: &ReflectionContext,
    today: NaiveDate,
) -> AIResponse {
    let system_prompt = prompts::fill(REFLECTION_SYSTEM_PROMPT, "DATA", &context.build_data_summary(today));
    generate_or_fallback(generator, Intent::Reflection, message, &system_prompt, || context.fallback_message()).await
}
