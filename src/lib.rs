pub mod anthropic;
pub mod config;
pub mod db;
pub mod error;
pub mod gemini;
pub mod llm;
pub mod log_habit;
pub mod logging;
pub mod matcher;
pub mod modes;
pub mod orchestrator;
pub mod prompts;
pub mod router;
pub mod streaks;

use anthropic::AnthropicClient;
use chrono::NaiveDate;
use gemini::GeminiClient;
use llm::{TextGenerator, TimedGenerator};
use std::sync::Arc;

pub use config::{AppConfig, Provider};
pub use db::{Goal, GoalType, Habit, HabitStore, HabitUpdate, NewGoal, NewHabit, SqliteStore, ToggleResult};
pub use error::{AssistantError, ErrorEnvelope, LlmError, StoreError};
pub use log_habit::ChatTurn;
pub use modes::AIResponse;
pub use orchestrator::{AssistantReply, AssistantRequest, Orchestrator};
pub use router::Intent;
pub use streaks::{GoalProgress, HeatmapDay, Stats};

// ============ App Initialization ============

pub struct App {
    pub config: AppConfig,
    pub store: Arc<SqliteStore>,
    pub orchestrator: Orchestrator,
}

/// Validate config, start logging, open the database and wire the assistant
pub fn init_app(config: AppConfig) -> Result<App, String> {
    config.validate()?;

    // Logging is best effort; the app still runs with console output only
    if let Err(e) = logging::init_logging(&config.log_dir) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match logging::cleanup_old_logs(&config.log_dir, config.log_retention_days) {
        Ok(removed) if removed > 0 => {
            logging::log_request(None, &format!("Removed {} old log files", removed));
        }
        Ok(_) => {}
        Err(e) => logging::log_error(None, &format!("Log cleanup failed: {}", e)),
    }

    let store = Arc::new(SqliteStore::open(&config.db_path).map_err(|e| e.to_string())?);
    let generator = build_generator(&config).map_err(|e| e.to_string())?;
    let orchestrator = Orchestrator::new(store.clone(), generator);

    logging::log_request(
        None,
        &format!(
            "App initialized (provider={}, model={}, db={})",
            config.provider.as_str(),
            config.model_name(),
            config.db_path.display()
        ),
    );

    Ok(App { config, store, orchestrator })
}

/// The configured provider client, bounded by the configured timeout
pub fn build_generator(config: &AppConfig) -> Result<Arc<dyn TextGenerator>, LlmError> {
    let api_key = config
        .api_key()
        .ok_or_else(|| LlmError::MissingApiKey(config.provider.as_str().to_string()))?;
    let timeout = config.llm_timeout();
    let model = config.model_name();

    let generator: Arc<dyn TextGenerator> = match config.provider {
        Provider::Gemini => Arc::new(TimedGenerator::new(GeminiClient::new(api_key, model, timeout)?, timeout)),
        Provider::Anthropic => Arc::new(TimedGenerator::new(AnthropicClient::new(api_key, model, timeout)?, timeout)),
    };
    Ok(generator)
}

// ============ Entry Points ============

pub async fn send_assistant_message(
    app: &App,
    user_id: Option<String>,
    message: String,
    history: Vec<ChatTurn>,
    today: NaiveDate,
) -> Result<AssistantReply, AssistantError> {
    let request = AssistantRequest { user_id, message, history };
    app.orchestrator.handle_message(request, today).await
}

pub fn get_stats(store: &SqliteStore, user_id: &str, today: NaiveDate) -> Result<Stats, StoreError> {
    let habits = store.get_habits(user_id, false)?;
    let completions = store.get_all_completions(user_id)?;
    Ok(streaks::overview(&habits, &completions, today))
}

pub fn get_month_heatmap(store: &SqliteStore, user_id: &str, month_of: NaiveDate) -> Result<Vec<HeatmapDay>, StoreError> {
    let habits = store.get_habits(user_id, false)?;
    let completions = store.get_all_completions(user_id)?;
    Ok(streaks::month_heatmap(&habits, &completions, month_of))
}

pub fn toggle_habit_completion(
    store: &SqliteStore,
    user_id: &str,
    habit_id: &str,
    date: Option<NaiveDate>,
    is_backfill: bool,
    today: NaiveDate,
) -> Result<ToggleResult, StoreError> {
    let result = store.toggle_completion(user_id, habit_id, date, is_backfill, today)?;
    logging::log_store(
        Some(user_id),
        &format!(
            "Toggled {} on {}: completed={} backfill={}",
            habit_id,
            date.unwrap_or(today),
            result.completed,
            result.is_backfill
        ),
    );
    Ok(result)
}

pub fn update_habit(store: &SqliteStore, user_id: &str, habit_id: &str, update: &HabitUpdate) -> Result<Habit, StoreError> {
    let habit = store.update_habit(user_id, habit_id, update)?;
    logging::log_store(Some(user_id), &format!("Updated habit {} ({})", habit.id, habit.name));
    Ok(habit)
}

pub fn delete_habit(store: &SqliteStore, user_id: &str, habit_id: &str) -> Result<(), StoreError> {
    store.delete_habit(user_id, habit_id)?;
    logging::log_store(Some(user_id), &format!("Deleted habit {}", habit_id));
    Ok(())
}

pub fn create_goal(store: &SqliteStore, user_id: &str, goal: &NewGoal) -> Result<Goal, StoreError> {
    let goal = store.create_goal(user_id, goal)?;
    logging::log_store(
        Some(user_id),
        &format!("Created {} goal of {} days for {}", goal.goal_type.as_str(), goal.target_days, goal.habit_id),
    );
    Ok(goal)
}

/// Every goal the user has, with progress measured against `today`
pub fn get_goal_progress(store: &SqliteStore, user_id: &str, today: NaiveDate) -> Result<Vec<GoalProgress>, StoreError> {
    let goals = store.get_goals(user_id)?;
    let completions = store.get_all_completions(user_id)?;
    Ok(goals.iter().map(|g| streaks::goal_progress(g, &completions, today)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("habitloop-lib-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_build_generator_requires_key() {
        let config = AppConfig { provider: Provider::Anthropic, ..AppConfig::default() };
        assert!(matches!(build_generator(&config), Err(LlmError::MissingApiKey(p)) if p == "anthropic"));

        let config = AppConfig { gemini_api_key: Some("g-key".to_string()), ..AppConfig::default() };
        assert!(build_generator(&config).is_ok());
    }

    #[test]
    fn test_init_app_opens_store() {
        let dir = temp_dir();
        let config = AppConfig {
            gemini_api_key: Some("g-key".to_string()),
            db_path: dir.join("data").join("habitloop.db"),
            log_dir: dir.join("logs"),
            ..AppConfig::default()
        };

        let app = init_app(config).unwrap();
        let user = app.store.create_user("kim@example.com").unwrap();
        assert!(app.store.get_habits(&user.id, false).unwrap().is_empty());
        assert!(dir.join("data").join("habitloop.db").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_init_app_rejects_invalid_config() {
        let config = AppConfig { llm_timeout_secs: 0, gemini_api_key: Some("k".into()), ..AppConfig::default() };
        assert!(init_app(config).is_err());
    }

    #[test]
    fn test_toggle_and_stats() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store.create_user("lee@example.com").unwrap();
        let habit = store.insert_habit(&user.id, &NewHabit::auto("Stretch")).unwrap();
        let today = day(2024, 3, 15);

        // Past dates are forced to backfill and do not count toward streaks
        let past = toggle_habit_completion(&store, &user.id, &habit.id, Some(day(2024, 3, 14)), false, today).unwrap();
        assert!(past.completed && past.is_backfill);
        let now = toggle_habit_completion(&store, &user.id, &habit.id, None, false, today).unwrap();
        assert!(now.completed && !now.is_backfill);

        let stats = get_stats(&store, &user.id, today).unwrap();
        assert_eq!(stats.overview.current_streak, 1);
        assert_eq!(stats.overview.today_completed, 1);

        let heatmap = get_month_heatmap(&store, &user.id, today).unwrap();
        assert_eq!(heatmap.len(), 31);
        assert_eq!(heatmap[13].completed, 1);
        assert_eq!(heatmap[14].rate, 100);

        let off = toggle_habit_completion(&store, &user.id, &habit.id, None, false, today).unwrap();
        assert!(!off.completed);
        assert_eq!(store.get_all_completions(&user.id).unwrap().len(), 1);
    }

    #[test]
    fn test_goal_progress_follows_completions() {
        let store = SqliteStore::open_in_memory().unwrap();
        let user = store.create_user("sam@example.com").unwrap();
        let habit = store.insert_habit(&user.id, &NewHabit::auto("Journal")).unwrap();
        let today = day(2024, 3, 15);
        let goal = NewGoal { habit_id: habit.id.clone(), goal_type: GoalType::Streak, target_days: 4 };
        create_goal(&store, &user.id, &goal).unwrap();

        for d in [13, 14, 15] {
            toggle_habit_completion(&store, &user.id, &habit.id, Some(day(2024, 3, d)), false, day(2024, 3, d)).unwrap();
        }

        let progress = get_goal_progress(&store, &user.id, today).unwrap();
        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].current_streak, 3);
        assert_eq!(progress[0].progress, 75);

        let renamed = update_habit(
            &store,
            &user.id,
            &habit.id,
            &HabitUpdate { name: Some("Evening Journal".to_string()), ..HabitUpdate::default() },
        )
        .unwrap();
        assert_eq!(renamed.name, "Evening Journal");

        delete_habit(&store, &user.id, &habit.id).unwrap();
        assert!(get_goal_progress(&store, &user.id, today).unwrap().is_empty());
        assert!(store.get_all_completions(&user.id).unwrap().is_empty());
    }

    #[test]
    fn test_toggle_rejects_foreign_habit() {
        let store = SqliteStore::open_in_memory().unwrap();
        let owner = store.create_user("a@example.com").unwrap();
        let other = store.create_user("b@example.com").unwrap();
        let habit = store.insert_habit(&owner.id, &NewHabit::auto("Walk")).unwrap();

        let err = toggle_habit_completion(&store, &other.id, &habit.id, None, false, day(2024, 3, 15)).unwrap_err();
        assert!(matches!(err, StoreError::HabitNotFound { .. }));
    }
}
