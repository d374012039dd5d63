//! Streak engine
//!
//! Pure functions over day-granular completion data. "Today" is always an
//! argument so results never depend on the wall clock. Backfilled completions
//! count for display (rates, heatmap) but never for streaks or perfect days.

use crate::db::{CompletionRecord, Goal, Habit};
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Longest perfect-day streak only looks this far back
pub const PERFECT_STREAK_LOOKBACK_DAYS: i64 = 90;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakResult {
    pub current_streak: u32,
    pub longest_streak: u32,
}

/// Consecutive days ending today, or ending yesterday when today isn't done yet
fn current_run<F>(today: NaiveDate, is_done: F) -> u32
where
    F: Fn(NaiveDate) -> bool,
{
    let mut check = today;
    if !is_done(check) {
        check = today - Duration::days(1);
        if !is_done(check) {
            return 0;
        }
    }

    let mut run = 0;
    while is_done(check) {
        run += 1;
        check = check - Duration::days(1);
    }
    run
}

/// Current and longest streak for one habit's non-backfill completion days
pub fn calculate_streaks(dates: &[NaiveDate], today: NaiveDate) -> StreakResult {
    if dates.is_empty() {
        return StreakResult::default();
    }

    let unique: BTreeSet<NaiveDate> = dates.iter().copied().collect();

    let current_streak = current_run(today, |d| unique.contains(&d));

    let mut longest_streak: u32 = 0;
    let mut run: u32 = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in unique.iter().rev() {
        run = match previous {
            Some(prev) if (prev - *day).num_days() == 1 => run + 1,
            _ => 1,
        };
        longest_streak = longest_streak.max(run);
        previous = Some(*day);
    }

    StreakResult { current_streak, longest_streak }
}

/// Streaks for one habit, skipping backfilled completions
pub fn habit_streaks(habit_id: &str, completions: &[CompletionRecord], today: NaiveDate) -> StreakResult {
    let dates: Vec<NaiveDate> = completions
        .iter()
        .filter(|c| c.habit_id == habit_id && !c.is_backfill)
        .map(|c| c.date)
        .collect();
    calculate_streaks(&dates, today)
}

/// True when there is at least one active habit and all of them were done
pub fn is_perfect_day(completed_habit_ids: &HashSet<String>, active_habit_ids: &[String]) -> bool {
    !active_habit_ids.is_empty() && active_habit_ids.iter().all(|id| completed_habit_ids.contains(id))
}

/// Non-backfill completions grouped by day, for perfect-day checks
pub struct PerfectDays {
    by_day: HashMap<NaiveDate, HashSet<String>>,
    active_habit_ids: Vec<String>,
}

impl PerfectDays {
    pub fn new(completions: &[CompletionRecord], active_habit_ids: Vec<String>) -> Self {
        let mut by_day: HashMap<NaiveDate, HashSet<String>> = HashMap::new();
        for completion in completions.iter().filter(|c| !c.is_backfill) {
            by_day
                .entry(completion.date)
                .or_default()
                .insert(completion.habit_id.clone());
        }
        Self { by_day, active_habit_ids }
    }

    pub fn is_perfect(&self, day: NaiveDate) -> bool {
        match self.by_day.get(&day) {
            Some(done) => is_perfect_day(done, &self.active_habit_ids),
            None => false,
        }
    }

    /// Active habits with a non-backfill completion on `day`
    pub fn completed_on(&self, day: NaiveDate) -> usize {
        self.by_day
            .get(&day)
            .map(|done| self.active_habit_ids.iter().filter(|id| done.contains(*id)).count())
            .unwrap_or(0)
    }

    pub fn current_streak(&self, today: NaiveDate) -> u32 {
        current_run(today, |d| self.is_perfect(d))
    }

    /// Longest run inside the trailing lookback window ending today
    pub fn longest_streak(&self, today: NaiveDate) -> u32 {
        let start = today - Duration::days(PERFECT_STREAK_LOOKBACK_DAYS - 1);
        let mut longest: u32 = 0;
        let mut run: u32 = 0;
        for offset in 0..PERFECT_STREAK_LOOKBACK_DAYS {
            if self.is_perfect(start + Duration::days(offset)) {
                run += 1;
                longest = longest.max(run);
            } else {
                run = 0;
            }
        }
        longest
    }

    pub fn streaks(&self, today: NaiveDate) -> StreakResult {
        StreakResult {
            current_streak: self.current_streak(today),
            longest_streak: self.longest_streak(today),
        }
    }
}

/// Rounded percentage; 0 when there is nothing to divide by
pub fn completion_rate(completed: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u32
}

/// Rate over month start through today inclusive
pub fn monthly_completion_rate(completed_days: u32, total_days_so_far: u32) -> u32 {
    completion_rate(completed_days, total_days_so_far)
}

fn month_start(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

fn days_in_month(day: NaiveDate) -> u32 {
    let (year, month) = if day.month() == 12 {
        (day.year() + 1, 1)
    } else {
        (day.year(), day.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|next| (next - month_start(day)).num_days() as u32)
        .unwrap_or(31)
}

// ============ Stats Overview ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HabitStats {
    pub habit_id: String,
    pub habit_name: String,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub monthly_rate: u32,
    pub total_completions: usize,
    pub completed_today: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatsOverview {
    pub total_habits: usize,
    pub today_completed: usize,
    pub today_total: usize,
    /// Perfect-day streaks
    pub current_streak: u32,
    pub longest_streak: u32,
    pub monthly_completion_rate: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub overview: StatsOverview,
    pub habits: Vec<HabitStats>,
}

pub fn habit_stats(habit: &Habit, completions: &[CompletionRecord], today: NaiveDate) -> HabitStats {
    let own: Vec<&CompletionRecord> = completions.iter().filter(|c| c.habit_id == habit.id).collect();
    let streaks = habit_streaks(&habit.id, completions, today);

    let all_days: HashSet<NaiveDate> = own.iter().map(|c| c.date).collect();
    let start = month_start(today);
    let completed_this_month = all_days.iter().filter(|d| **d >= start && **d <= today).count() as u32;

    HabitStats {
        habit_id: habit.id.clone(),
        habit_name: habit.name.clone(),
        current_streak: streaks.current_streak,
        longest_streak: streaks.longest_streak,
        monthly_rate: monthly_completion_rate(completed_this_month, today.day()),
        total_completions: own.len(),
        completed_today: all_days.contains(&today),
    }
}

/// Per-habit stats plus the perfect-day overview for the active habits
pub fn overview(habits: &[Habit], completions: &[CompletionRecord], today: NaiveDate) -> Stats {
    let active: Vec<&Habit> = habits.iter().filter(|h| !h.archived).collect();
    let perfect = PerfectDays::new(completions, active.iter().map(|h| h.id.clone()).collect());
    let streaks = perfect.streaks(today);

    let start = month_start(today);
    let perfect_this_month = start
        .iter_days()
        .take_while(|d| *d <= today)
        .filter(|d| perfect.is_perfect(*d))
        .count() as u32;

    Stats {
        overview: StatsOverview {
            total_habits: active.len(),
            today_completed: perfect.completed_on(today),
            today_total: active.len(),
            current_streak: streaks.current_streak,
            longest_streak: streaks.longest_streak,
            monthly_completion_rate: monthly_completion_rate(perfect_this_month, today.day()),
        },
        habits: active.iter().map(|h| habit_stats(h, completions, today)).collect(),
    }
}

// ============ Heatmap ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeatLevel {
    None,
    Low,
    Medium,
    High,
    Full,
}

impl HeatLevel {
    pub fn from_rate(rate: u32) -> HeatLevel {
        match rate {
            0 => HeatLevel::None,
            1..=32 => HeatLevel::Low,
            33..=65 => HeatLevel::Medium,
            66..=99 => HeatLevel::High,
            _ => HeatLevel::Full,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapDay {
    pub date: NaiveDate,
    pub completed: usize,
    pub total: usize,
    pub rate: u32,
    pub level: HeatLevel,
}

/// One entry per day of the month containing `month_of`; backfills included
pub fn month_heatmap(habits: &[Habit], completions: &[CompletionRecord], month_of: NaiveDate) -> Vec<HeatmapDay> {
    let active: HashSet<&str> = habits.iter().filter(|h| !h.archived).map(|h| h.id.as_str()).collect();

    let mut by_day: HashMap<NaiveDate, HashSet<&str>> = HashMap::new();
    for completion in completions.iter().filter(|c| active.contains(c.habit_id.as_str())) {
        by_day.entry(completion.date).or_default().insert(completion.habit_id.as_str());
    }

    month_start(month_of)
        .iter_days()
        .take(days_in_month(month_of) as usize)
        .map(|date| {
            let completed = by_day.get(&date).map_or(0, |done| done.len());
            let rate = completion_rate(completed as u32, active.len() as u32);
            HeatmapDay {
                date,
                completed,
                total: active.len(),
                rate,
                level: HeatLevel::from_rate(rate),
            }
        })
        .collect()
}

// ============ Goals ============

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoalProgress {
    pub goal_id: String,
    pub habit_id: String,
    pub current_streak: u32,
    pub target_days: u32,
    /// Percent of the target, capped at 100
    pub progress: u32,
    pub achieved: bool,
}

/// Progress is the habit's current streak over the goal's target days
pub fn goal_progress(goal: &Goal, completions: &[CompletionRecord], today: NaiveDate) -> GoalProgress {
    let streak = habit_streaks(&goal.habit_id, completions, today).current_streak;
    let progress = completion_rate(streak.min(goal.target_days), goal.target_days);

    GoalProgress {
        goal_id: goal.id.clone(),
        habit_id: goal.habit_id.clone(),
        current_streak: streak,
        target_days: goal.target_days,
        progress,
        achieved: goal.target_days > 0 && streak >= goal.target_days,
    }
}
