use crate::db::{CompletionRecord, Habit, HabitStore, NewHabit, MAX_HABIT_NAME_LEN};
use crate::error::{classify_store_failure, AssistantError, StoreError};
use crate::llm::TextGenerator;
use crate::log_habit::{self, handle_log_habit, quoted_list, ChatTurn, LogHabitData, LoggedCompletion};
use crate::logging;
use crate::modes::{
    handle_coach, handle_insight, handle_reflection, AIResponse, CoachContext, CoachHabit, InsightCompletion,
    InsightContext, InsightHabitStat, ReflectionContext,
};
use crate::router::{route_intent, Intent};
use crate::streaks::{habit_streaks, PerfectDays};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Completions fetched as context for one turn
pub const RECENT_COMPLETIONS_LIMIT: usize = 100;

/// Denominator for the insight completion rate
const INSIGHT_WINDOW_DAYS: f64 = 30.0;

// ============ Request / Reply ============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantRequest {
    /// Resolved by the caller's session layer; `None` means unauthenticated
    pub user_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    pub data: AIResponse,
}

/// Everything the mode handlers may need, fetched once per turn
struct TurnContext {
    habits: Vec<Habit>,
    completions: Vec<CompletionRecord>,
    completed_today: HashSet<String>,
}

impl TurnContext {
    fn new(habits: Vec<Habit>, completions: Vec<CompletionRecord>, today: NaiveDate) -> Self {
        // Derived from the fetched window, not a separate query
        let completed_today = completions
            .iter()
            .filter(|c| c.date == today)
            .map(|c| c.habit_id.clone())
            .collect();
        Self { habits, completions, completed_today }
    }

    fn coach(&self, today: NaiveDate) -> CoachContext {
        let habits: Vec<CoachHabit> = self
            .habits
            .iter()
            .map(|h| CoachHabit {
                name: h.name.clone(),
                completed_today: self.completed_today.contains(&h.id),
            })
            .collect();

        let longest_streak = self
            .habits
            .iter()
            .map(|h| habit_streaks(&h.id, &self.completions, today).longest_streak)
            .max()
            .unwrap_or(0);

        CoachContext {
            today_completed_count: habits.iter().filter(|h| h.completed_today).count(),
            total_habits: habits.len(),
            habits,
            longest_streak,
        }
    }

    fn insight(&self, today: NaiveDate) -> InsightContext {
        let completions = self
            .completions
            .iter()
            .map(|c| InsightCompletion {
                date: c.date,
                habit_id: c.habit_id.clone(),
                habit_name: c.habit_name.clone(),
            })
            .collect();

        let habit_stats = self
            .habits
            .iter()
            .map(|h| {
                let days: HashSet<NaiveDate> = self
                    .completions
                    .iter()
                    .filter(|c| c.habit_id == h.id)
                    .map(|c| c.date)
                    .collect();
                InsightHabitStat {
                    habit_name: h.name.clone(),
                    completion_rate: days.len() as f64 / INSIGHT_WINDOW_DAYS * 100.0,
                    current_streak: habit_streaks(&h.id, &self.completions, today).current_streak,
                }
            })
            .collect();

        InsightContext { completions, habit_stats }
    }

    fn reflection(&self, today: NaiveDate) -> ReflectionContext {
        let (done, missed): (Vec<&Habit>, Vec<&Habit>) =
            self.habits.iter().partition(|h| self.completed_today.contains(&h.id));

        let active_ids = self.habits.iter().map(|h| h.id.clone()).collect();
        let current_streak = PerfectDays::new(&self.completions, active_ids).current_streak(today);

        ReflectionContext {
            completed_count: done.len(),
            total_habits: self.habits.len(),
            completed_habits: done.iter().map(|h| h.name.clone()).collect(),
            missed_habits: missed.iter().map(|h| h.name.clone()).collect(),
            current_streak,
        }
    }
}

// ============ Orchestrator ============

pub struct Orchestrator {
    store: Arc<dyn HabitStore>,
    generator: Arc<dyn TextGenerator>,
    user_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn HabitStore>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            store,
            generator,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Run one assistant turn end to end.
    ///
    /// Generation failures never surface here; the handlers fall back to canned
    /// text. Only auth, validation, unknown users and unexpected store failures
    /// become errors, the last one classified as rate-limited or opaque.
    pub async fn handle_message(
        &self,
        request: AssistantRequest,
        today: NaiveDate,
    ) -> Result<AssistantReply, AssistantError> {
        let user_id = request
            .user_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(AssistantError::Unauthorized)?;

        let message = request.message.trim();
        if message.is_empty() {
            return Err(AssistantError::Validation("Message is required".to_string()));
        }

        match self.store.find_user(user_id).await {
            Ok(Some(_)) => {}
            Ok(None) => return Err(AssistantError::NotFound("User not found".to_string())),
            Err(e) => return Err(self.fail(user_id, &e)),
        }

        logging::log_request(Some(user_id), &format!("Turn started ({} chars)", message.len()));

        match self.run_turn(user_id, message, &request.history, today).await {
            Ok(response) => {
                logging::log_request(Some(user_id), &format!("Turn complete: mode={}", response.mode.as_str()));
                Ok(AssistantReply { data: response })
            }
            Err(e) => Err(self.fail(user_id, &e)),
        }
    }

    fn fail(&self, user_id: &str, error: &StoreError) -> AssistantError {
        logging::log_error(Some(user_id), &format!("Turn failed: {}", error));
        classify_store_failure(error)
    }

    async fn run_turn(
        &self,
        user_id: &str,
        message: &str,
        history: &[ChatTurn],
        today: NaiveDate,
    ) -> Result<AIResponse, StoreError> {
        let route = route_intent(self.generator.as_ref(), message).await;
        logging::log_routing(Some(user_id), &format!("Dispatching to {}", route.intent.as_str()));

        // Held from context fetch through side effects so a double submit sees the first turn's writes
        let _guard = match route.intent {
            Intent::LogHabit => Some(self.lock_user(user_id).await),
            _ => None,
        };

        let habits = self.store.find_active_habits(user_id).await?;
        let completions = self
            .store
            .find_recent_completions(user_id, RECENT_COMPLETIONS_LIMIT)
            .await?;
        let context = TurnContext::new(habits, completions, today);
        let generator = self.generator.as_ref();

        let response = match route.intent {
            Intent::LogHabit => {
                let recent = log_habit::recent_history(history);
                let parsed = handle_log_habit(generator, message, &context.habits, recent).await;
                self.apply_log_side_effects(user_id, parsed, &context, today).await?
            }
            Intent::Coach => handle_coach(generator, message, &context.coach(today)).await,
            Intent::Insight => handle_insight(generator, message, &context.insight(today)).await,
            Intent::Reflection => handle_reflection(generator, message, &context.reflection(today), today).await,
        };

        Ok(response)
    }

    async fn lock_user(&self, user_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.user_locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(user_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Persist what the log-habit handler parsed, then rewrite the reply to match.
    ///
    /// Pass one writes completions (existing habits first, then auto-created
    /// ones) into a fresh list. Pass two builds the message from that list.
    /// Activities whose names cannot become habits stay in
    /// `unmatched_activities` and the message says so.
    async fn apply_log_side_effects(
        &self,
        user_id: &str,
        response: AIResponse,
        context: &TurnContext,
        today: NaiveDate,
    ) -> Result<AIResponse, StoreError> {
        let AIResponse { mode, message, data } = response;
        let data = match data {
            Some(data) => data,
            None => return Ok(AIResponse { mode, message, data: None }),
        };

        let mut logged_today = context.completed_today.clone();
        let mut resolved: Vec<LoggedCompletion> = Vec::new();
        let mut existing_names: Vec<String> = Vec::new();

        for completion in data.matched() {
            if logged_today.contains(&completion.habit_id) {
                logging::log_store(Some(user_id), &format!("{} already logged today", completion.habit_name));
            } else {
                self.log_completion(user_id, &completion.habit_id, &completion.habit_name, today)
                    .await?;
                logged_today.insert(completion.habit_id.clone());
            }

            if !resolved.iter().any(|r| r.habit_id == completion.habit_id) {
                existing_names.push(completion.habit_name.clone());
                resolved.push(completion.clone());
            }
        }

        let mut created: Vec<Habit> = Vec::new();
        let mut skipped: Vec<String> = Vec::new();
        for activity in data.unmatched() {
            let name = activity.trim();
            if created.iter().any(|h| h.name.eq_ignore_ascii_case(name))
                || skipped.iter().any(|s| s.eq_ignore_ascii_case(name))
            {
                continue;
            }

            let habit = match self.store.create_habit(user_id, &NewHabit::auto(activity)).await {
                Ok(habit) => habit,
                Err(StoreError::Validation(reason)) => {
                    logging::log_store(Some(user_id), &format!("Skipped creating '{}': {}", activity, reason));
                    skipped.push(name.to_string());
                    continue;
                }
                Err(e) => return Err(e),
            };
            logging::log_store(Some(user_id), &format!("Created habit '{}' ({})", habit.name, habit.id));

            self.log_completion(user_id, &habit.id, &habit.name, today).await?;
            resolved.push(LoggedCompletion {
                habit_id: habit.id.clone(),
                habit_name: habit.name.clone(),
                matched: true,
            });
            created.push(habit);
        }

        let mut message = if !created.is_empty() {
            let created_names: Vec<String> = created.iter().map(|h| h.name.clone()).collect();
            created_message(&created_names, &existing_names)
        } else if skipped.is_empty() {
            message
        } else {
            log_habit::compose_message(&existing_names, &[])
        };

        if !skipped.is_empty() {
            if !message.is_empty() {
                message.push_str("\n\n");
            }
            message.push_str(&skipped_message(&skipped));
        }

        let has_skipped = !skipped.is_empty();
        Ok(AIResponse {
            mode: Intent::LogHabit,
            message,
            data: Some(LogHabitData {
                completions: resolved,
                suggest_create: has_skipped.then_some(true),
                unmatched_activities: has_skipped.then_some(skipped),
            }),
        })
    }

    /// A duplicate for the same day counts as already logged
    async fn log_completion(
        &self,
        user_id: &str,
        habit_id: &str,
        habit_name: &str,
        today: NaiveDate,
    ) -> Result<(), StoreError> {
        match self.store.create_completion(user_id, habit_id, today, false).await {
            Ok(_) => {
                logging::log_store(Some(user_id), &format!("Logged {} for {}", habit_name, today));
                Ok(())
            }
            Err(StoreError::DuplicateCompletion { .. }) => {
                logging::log_store(Some(user_id), &format!("{} was already logged for {}", habit_name, today));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn created_message(created: &[String], existing: &[String]) -> String {
    let single = created.len() == 1;
    let added = format!(
        "added {} as {} and logged {} for today",
        quoted_list(created),
        if single { "a new habit" } else { "new habits" },
        if single { "it" } else { "them" },
    );

    if existing.is_empty() {
        format!("Done. I {}. Every streak starts with day one.", added)
    } else {
        format!("Logged {}. I also {}. You're building momentum.", existing.join(" and "), added)
    }
}

fn skipped_message(skipped: &[String]) -> String {
    format!(
        "I couldn't add {} as {}. Habit names need 1 to {} characters, so try a shorter name.",
        quoted_list(skipped),
        if skipped.len() == 1 { "a habit" } else { "habits" },
        MAX_HABIT_NAME_LEN
    )
}
