use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

pub const DEFAULT_HABIT_COLOR: &str = "#8b5cf6";
pub const DEFAULT_HABIT_ICON: &str = "✨";
pub const MAX_HABIT_NAME_LEN: usize = 100;
pub const MAX_GOAL_TARGET_DAYS: u32 = 365;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
        }
    }

    pub fn from_str(s: &str) -> Option<Frequency> {
        match s.to_lowercase().as_str() {
            "daily" => Some(Frequency::Daily),
            "weekly" => Some(Frequency::Weekly),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub icon: String,
    pub frequency: Frequency,
    pub weekly_days: Option<String>, // JSON array of weekday numbers, e.g. "[1,3,5]"
    pub reminder_time: Option<String>,
    pub archived: bool,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub id: String,
    pub habit_id: String,
    pub date: NaiveDate,
    pub is_backfill: bool,
    pub created_at: String,
}

/// A completion joined with its habit's name
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    pub habit_id: String,
    pub habit_name: String,
    pub date: NaiveDate,
    pub is_backfill: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewHabit {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_frequency")]
    pub frequency: Frequency,
    #[serde(default)]
    pub weekly_days: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub reminder_time: Option<String>, // HH:MM
}

fn default_frequency() -> Frequency {
    Frequency::Daily
}

impl NewHabit {
    /// Defaults used when the assistant creates a habit on the user's behalf
    pub fn auto(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            description: None,
            frequency: Frequency::Daily,
            weekly_days: None,
            color: Some(DEFAULT_HABIT_COLOR.to_string()),
            icon: Some(DEFAULT_HABIT_ICON.to_string()),
            reminder_time: None,
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        validate_name(&self.name)?;
        validate_color(self.color.as_deref())?;
        validate_reminder_time(self.reminder_time.as_deref())
    }
}

/// Partial edit of a habit; `None` leaves the field unchanged
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct HabitUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub weekly_days: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub reminder_time: Option<String>,
    #[serde(default)]
    pub archived: Option<bool>,
}

impl HabitUpdate {
    pub fn validate(&self) -> Result<(), StoreError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        validate_color(self.color.as_deref())?;
        validate_reminder_time(self.reminder_time.as_deref())
    }
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StoreError::Validation("Name is required".to_string()));
    }
    if name.chars().count() > MAX_HABIT_NAME_LEN {
        return Err(StoreError::Validation("Name is too long".to_string()));
    }
    Ok(())
}

fn validate_color(color: Option<&str>) -> Result<(), StoreError> {
    match color {
        Some(color) if !is_hex_color(color) => {
            Err(StoreError::Validation(format!("Invalid color '{}'", color)))
        }
        _ => Ok(()),
    }
}

fn validate_reminder_time(time: Option<&str>) -> Result<(), StoreError> {
    match time {
        Some(time) if !is_reminder_time(time) => {
            Err(StoreError::Validation(format!("Invalid reminder time '{}', expected HH:MM", time)))
        }
        _ => Ok(()),
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// 24-hour `HH:MM`, 00:00 through 23:59
fn is_reminder_time(value: &str) -> bool {
    let Some((hours, minutes)) = value.split_once(':') else {
        return false;
    };
    let two_digits = |part: &str| part.len() == 2 && part.chars().all(|c| c.is_ascii_digit());
    if !two_digits(hours) || !two_digits(minutes) {
        return false;
    }
    matches!((hours.parse::<u8>(), minutes.parse::<u8>()), (Ok(h), Ok(m)) if h < 24 && m < 60)
}

// ============ Goals ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalType {
    Streak,
    Consistency,
}

impl GoalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalType::Streak => "streak",
            GoalType::Consistency => "consistency",
        }
    }

    pub fn from_str(s: &str) -> Option<GoalType> {
        match s.to_lowercase().as_str() {
            "streak" => Some(GoalType::Streak),
            "consistency" => Some(GoalType::Consistency),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    pub user_id: String,
    pub habit_id: String,
    #[serde(rename = "type")]
    pub goal_type: GoalType,
    pub target_days: u32,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    pub habit_id: String,
    #[serde(rename = "type", default = "default_goal_type")]
    pub goal_type: GoalType,
    pub target_days: u32,
}

fn default_goal_type() -> GoalType {
    GoalType::Streak
}

impl NewGoal {
    pub fn validate(&self) -> Result<(), StoreError> {
        if !(1..=MAX_GOAL_TARGET_DAYS).contains(&self.target_days) {
            return Err(StoreError::Validation(format!(
                "Target days must be between 1 and {}",
                MAX_GOAL_TARGET_DAYS
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResult {
    pub completed: bool,
    pub is_backfill: bool,
}

/// Persistence operations the assistant needs. Every call is scoped by `user_id`.
#[async_trait]
pub trait HabitStore: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError>;

    async fn find_active_habits(&self, user_id: &str) -> Result<Vec<Habit>, StoreError>;

    /// Most recent completions first, joined with habit names
    async fn find_recent_completions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<CompletionRecord>, StoreError>;

    /// Fails with `DuplicateCompletion` when the habit is already logged for `date`
    async fn create_completion(
        &self,
        user_id: &str,
        habit_id: &str,
        date: NaiveDate,
        is_backfill: bool,
    ) -> Result<Completion, StoreError>;

    async fn create_habit(&self, user_id: &str, habit: &NewHabit) -> Result<Habit, StoreError>;
}

// ============ SQLite Store ============

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        email TEXT UNIQUE NOT NULL,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS habits (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        frequency TEXT NOT NULL DEFAULT 'daily',
        weekly_days TEXT,
        color TEXT NOT NULL DEFAULT '#8b5cf6',
        archived INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
    );

    -- One completion per habit per calendar day
    CREATE TABLE IF NOT EXISTS habit_completions (
        id TEXT PRIMARY KEY,
        habit_id TEXT NOT NULL,
        date TEXT NOT NULL,
        is_backfill INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        UNIQUE(habit_id, date),
        FOREIGN KEY (habit_id) REFERENCES habits(id) ON DELETE CASCADE
    );

    CREATE TABLE IF NOT EXISTS goals (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        habit_id TEXT NOT NULL,
        type TEXT NOT NULL DEFAULT 'streak',
        target_days INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
        FOREIGN KEY (habit_id) REFERENCES habits(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_habits_user ON habits(user_id, archived);
    CREATE INDEX IF NOT EXISTS idx_completions_date ON habit_completions(date);
    CREATE INDEX IF NOT EXISTS idx_goals_user ON goals(user_id);
";

const HABIT_COLUMNS: &str =
    "id, user_id, name, description, color, icon, frequency, weekly_days, reminder_time, archived, created_at";

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("Failed to create data dir: {}", e)))?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        // Migrations: icon and reminder_time were added after the first release
        if !has_column(&conn, "habits", "icon") {
            conn.execute(
                &format!("ALTER TABLE habits ADD COLUMN icon TEXT NOT NULL DEFAULT '{}'", DEFAULT_HABIT_ICON),
                [],
            )?;
        }
        if !has_column(&conn, "habits", "reminder_time") {
            conn.execute("ALTER TABLE habits ADD COLUMN reminder_time TEXT", [])?;
        }

        Ok(Self { conn: Mutex::new(conn) })
    }

    fn with_connection<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|_| StoreError::Backend("Database lock poisoned".to_string()))?;
        f(&conn)
    }

    // ============ Users ============

    pub fn create_user(&self, email: &str) -> Result<User, StoreError> {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.trim().to_lowercase(),
            created_at: Utc::now().to_rfc3339(),
        };
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, created_at) VALUES (?1, ?2, ?3)",
                params![user.id, user.email, user.created_at],
            )?;
            Ok(())
        })?;
        Ok(user)
    }

    fn get_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        self.with_connection(|conn| {
            let user = conn
                .query_row(
                    "SELECT id, email, created_at FROM users WHERE id = ?1",
                    [user_id],
                    |row| {
                        Ok(User {
                            id: row.get(0)?,
                            email: row.get(1)?,
                            created_at: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
    }

    // ============ Habits ============

    /// All habits for a user, archived ones included
    pub fn get_habits(&self, user_id: &str, include_archived: bool) -> Result<Vec<Habit>, StoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM habits
                 WHERE user_id = ?1 AND (?2 OR archived = 0)
                 ORDER BY created_at ASC, rowid ASC",
                HABIT_COLUMNS
            ))?;
            let habits = stmt.query_map(params![user_id, include_archived], habit_from_row)?;
            Ok(habits.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    pub fn insert_habit(&self, user_id: &str, new_habit: &NewHabit) -> Result<Habit, StoreError> {
        new_habit.validate()?;

        let habit = Habit {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: new_habit.name.trim().to_string(),
            description: new_habit.description.clone(),
            color: new_habit.color.clone().unwrap_or_else(|| DEFAULT_HABIT_COLOR.to_string()),
            icon: new_habit.icon.clone().unwrap_or_else(|| DEFAULT_HABIT_ICON.to_string()),
            frequency: new_habit.frequency,
            weekly_days: new_habit.weekly_days.clone(),
            reminder_time: new_habit.reminder_time.clone(),
            archived: false,
            created_at: Utc::now().to_rfc3339(),
        };

        self.with_connection(|conn| {
            let owner_exists: bool = conn.query_row(
                "SELECT COUNT(*) FROM users WHERE id = ?1",
                [user_id],
                |row| Ok(row.get::<_, i64>(0)? > 0),
            )?;
            if !owner_exists {
                return Err(StoreError::UserNotFound { user_id: user_id.to_string() });
            }

            conn.execute(
                "INSERT INTO habits (id, user_id, name, description, color, icon, frequency, weekly_days, reminder_time, archived, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, ?10)",
                params![
                    habit.id,
                    habit.user_id,
                    habit.name,
                    habit.description,
                    habit.color,
                    habit.icon,
                    habit.frequency.as_str(),
                    habit.weekly_days,
                    habit.reminder_time,
                    habit.created_at
                ],
            )?;
            Ok(())
        })?;

        Ok(habit)
    }

    /// Apply the fields present in `update` and return the stored habit
    pub fn update_habit(&self, user_id: &str, habit_id: &str, update: &HabitUpdate) -> Result<Habit, StoreError> {
        update.validate()?;

        self.with_connection(|conn| {
            ensure_owned(conn, user_id, habit_id)?;

            conn.execute(
                "UPDATE habits SET
                    name = COALESCE(?1, name),
                    description = COALESCE(?2, description),
                    frequency = COALESCE(?3, frequency),
                    weekly_days = COALESCE(?4, weekly_days),
                    color = COALESCE(?5, color),
                    icon = COALESCE(?6, icon),
                    reminder_time = COALESCE(?7, reminder_time),
                    archived = COALESCE(?8, archived)
                 WHERE id = ?9 AND user_id = ?10",
                params![
                    update.name.as_deref().map(str::trim),
                    update.description,
                    update.frequency.map(|f| f.as_str()),
                    update.weekly_days,
                    update.color,
                    update.icon,
                    update.reminder_time,
                    update.archived,
                    habit_id,
                    user_id
                ],
            )?;

            let habit = conn.query_row(
                &format!("SELECT {} FROM habits WHERE id = ?1", HABIT_COLUMNS),
                [habit_id],
                habit_from_row,
            )?;
            Ok(habit)
        })
    }

    /// Remove a habit; its completions and goals go with it
    pub fn delete_habit(&self, user_id: &str, habit_id: &str) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            ensure_owned(conn, user_id, habit_id)?;
            conn.execute(
                "DELETE FROM habits WHERE id = ?1 AND user_id = ?2",
                params![habit_id, user_id],
            )?;
            Ok(())
        })
    }

    /// Flip the archived flag; returns the new value
    pub fn toggle_archive(&self, user_id: &str, habit_id: &str) -> Result<bool, StoreError> {
        self.with_connection(|conn| {
            let archived: Option<bool> = conn
                .query_row(
                    "SELECT archived FROM habits WHERE id = ?1 AND user_id = ?2",
                    params![habit_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;

            let archived = archived.ok_or_else(|| StoreError::HabitNotFound {
                habit_id: habit_id.to_string(),
            })?;

            conn.execute(
                "UPDATE habits SET archived = ?1 WHERE id = ?2",
                params![!archived, habit_id],
            )?;
            Ok(!archived)
        })
    }

    // ============ Goals ============

    pub fn create_goal(&self, user_id: &str, new_goal: &NewGoal) -> Result<Goal, StoreError> {
        new_goal.validate()?;

        let goal = Goal {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            habit_id: new_goal.habit_id.clone(),
            goal_type: new_goal.goal_type,
            target_days: new_goal.target_days,
            created_at: Utc::now().to_rfc3339(),
        };

        self.with_connection(|conn| {
            ensure_owned(conn, user_id, &goal.habit_id)?;
            conn.execute(
                "INSERT INTO goals (id, user_id, habit_id, type, target_days, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    goal.id,
                    goal.user_id,
                    goal.habit_id,
                    goal.goal_type.as_str(),
                    goal.target_days,
                    goal.created_at
                ],
            )?;
            Ok(())
        })?;

        Ok(goal)
    }

    /// The user's goals, newest first
    pub fn get_goals(&self, user_id: &str) -> Result<Vec<Goal>, StoreError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, habit_id, type, target_days, created_at
                 FROM goals
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let goals = stmt.query_map([user_id], |row| {
                let goal_type: String = row.get(3)?;
                Ok(Goal {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    habit_id: row.get(2)?,
                    goal_type: GoalType::from_str(&goal_type).unwrap_or(GoalType::Streak),
                    target_days: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })?;
            Ok(goals.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    // ============ Completions ============

    /// Every completion across the user's habits, newest first
    pub fn get_all_completions(&self, user_id: &str) -> Result<Vec<CompletionRecord>, StoreError> {
        self.query_completions(user_id, None)
    }

    fn query_completions(&self, user_id: &str, limit: Option<usize>) -> Result<Vec<CompletionRecord>, StoreError> {
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.habit_id, h.name, c.date, c.is_backfill
                 FROM habit_completions c
                 JOIN habits h ON h.id = c.habit_id
                 WHERE h.user_id = ?1
                 ORDER BY c.date DESC, c.created_at DESC
                 LIMIT ?2",
            )?;
            let records = stmt.query_map(params![user_id, limit], |row| {
                Ok(CompletionRecord {
                    habit_id: row.get(0)?,
                    habit_name: row.get(1)?,
                    date: row.get(2)?,
                    is_backfill: row.get(3)?,
                })
            })?;
            Ok(records.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    fn insert_completion(
        &self,
        user_id: &str,
        habit_id: &str,
        date: NaiveDate,
        is_backfill: bool,
    ) -> Result<Completion, StoreError> {
        let completion = Completion {
            id: uuid::Uuid::new_v4().to_string(),
            habit_id: habit_id.to_string(),
            date,
            is_backfill,
            created_at: Utc::now().to_rfc3339(),
        };

        self.with_connection(|conn| {
            ensure_owned(conn, user_id, habit_id)?;

            let inserted = conn.execute(
                "INSERT INTO habit_completions (id, habit_id, date, is_backfill, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    completion.id,
                    completion.habit_id,
                    completion.date,
                    completion.is_backfill,
                    completion.created_at
                ],
            );

            match inserted {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                    Err(StoreError::DuplicateCompletion {
                        habit_id: habit_id.to_string(),
                        day: date.to_string(),
                    })
                }
                Err(e) => Err(e.into()),
            }
        })?;

        Ok(completion)
    }

    /// Create the completion if absent, delete it if present.
    /// Past dates are always recorded as backfill.
    pub fn toggle_completion(
        &self,
        user_id: &str,
        habit_id: &str,
        date: Option<NaiveDate>,
        is_backfill: bool,
        today: NaiveDate,
    ) -> Result<ToggleResult, StoreError> {
        let target = date.unwrap_or(today);
        let is_backfill = is_backfill || target < today;

        self.with_connection(|conn| {
            ensure_owned(conn, user_id, habit_id)?;

            let removed = conn.execute(
                "DELETE FROM habit_completions WHERE habit_id = ?1 AND date = ?2",
                params![habit_id, target],
            )?;
            if removed > 0 {
                return Ok(ToggleResult { completed: false, is_backfill });
            }

            conn.execute(
                "INSERT INTO habit_completions (id, habit_id, date, is_backfill, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    uuid::Uuid::new_v4().to_string(),
                    habit_id,
                    target,
                    is_backfill,
                    Utc::now().to_rfc3339()
                ],
            )?;
            Ok(ToggleResult { completed: true, is_backfill })
        })
    }
}

fn ensure_owned(conn: &Connection, user_id: &str, habit_id: &str) -> Result<(), StoreError> {
    let owned: bool = conn.query_row(
        "SELECT COUNT(*) FROM habits WHERE id = ?1 AND user_id = ?2",
        params![habit_id, user_id],
        |row| Ok(row.get::<_, i64>(0)? > 0),
    )?;
    if owned {
        Ok(())
    } else {
        Err(StoreError::HabitNotFound { habit_id: habit_id.to_string() })
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        params![table, column],
        |row| Ok(row.get::<_, i64>(0)? > 0),
    )
    .unwrap_or(false)
}

/// Maps a row selected with `HABIT_COLUMNS`
fn habit_from_row(row: &Row) -> rusqlite::Result<Habit> {
    let frequency: String = row.get(6)?;
    Ok(Habit {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        color: row.get(4)?,
        icon: row.get(5)?,
        frequency: Frequency::from_str(&frequency).unwrap_or(Frequency::Daily),
        weekly_days: row.get(7)?,
        reminder_time: row.get(8)?,
        archived: row.get(9)?,
        created_at: row.get(10)?,
    })
}

#[async_trait]
impl HabitStore for SqliteStore {
    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        self.get_user(user_id)
    }

    async fn find_active_habits(&self, user_id: &str) -> Result<Vec<Habit>, StoreError> {
        self.get_habits(user_id, false)
    }

    async fn find_recent_completions(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<CompletionRecord>, StoreError> {
        self.query_completions(user_id, Some(limit))
    }

    async fn create_completion(
        &self,
        user_id: &str,
        habit_id: &str,
        date: NaiveDate,
        is_backfill: bool,
    ) -> Result<Completion, StoreError> {
        self.insert_completion(user_id, habit_id, date, is_backfill)
    }

    async fn create_habit(&self, user_id: &str, habit: &NewHabit) -> Result<Habit, StoreError> {
        self.insert_habit(user_id, habit)
    }
}
