use crate::db::Habit;

/// Resolve a parsed activity to a known habit.
///
/// The model's own `matched_to` suggestion is honoured only on an exact
/// case-insensitive name hit; otherwise the raw activity name goes through
/// [`find_best_match`].
pub fn match_habit<'a>(activity: &str, matched_to: Option<&str>, habits: &'a [Habit]) -> Option<&'a Habit> {
    if let Some(suggested) = matched_to {
        let suggested = suggested.trim().to_lowercase();
        if let Some(habit) = habits.iter().find(|h| h.name.to_lowercase() == suggested) {
            return Some(habit);
        }
    }

    find_best_match(activity, habits)
}

/// Exact name anywhere in the list, else the first habit that matches by substring or shared token.
pub fn find_best_match<'a>(input: &str, habits: &'a [Habit]) -> Option<&'a Habit> {
    let input_lower = input.trim().to_lowercase();
    if input_lower.is_empty() {
        return None;
    }

    habits
        .iter()
        .find(|habit| habit.name.to_lowercase() == input_lower)
        .or_else(|| habits.iter().find(|habit| fuzzy_match(&input_lower, &habit.name.to_lowercase())))
}

fn fuzzy_match(input: &str, habit: &str) -> bool {
    if habit.contains(input) || input.contains(habit) {
        return true;
    }

    input.split_whitespace().any(|word| {
        habit
            .split_whitespace()
            .any(|habit_word| habit_word.contains(word) || word.contains(habit_word))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Frequency;

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

    #[test]
    fn test_suggested_match_is_case_insensitive() {
        let habits = vec![habit("h1", "Morning Run"), habit("h2", "Reading")];
        let found = match_habit("ran", Some("morning run"), &habits).unwrap();
        assert_eq!(found.id, "h1");
    }

    #[test]
    fn test_bad_suggestion_falls_through_to_fuzzy() {
        let habits = vec![habit("h1", "Reading")];
        let found = match_habit("read", Some("Books"), &habits).unwrap();
        assert_eq!(found.id, "h1");
    }

    #[test]
    fn test_substring_either_direction() {
        let habits = vec![habit("h1", "Drink Water")];
        assert!(find_best_match("water", &habits).is_some());
        assert!(find_best_match("drink water with lemon", &habits).is_some());
    }

    #[test]
    fn test_token_overlap() {
        let habits = vec![habit("h1", "Gym Workout")];
        assert_eq!(find_best_match("morning gym", &habits).unwrap().id, "h1");
    }

    #[test]
    fn test_exact_name_beats_substring_via_suggestion() {
        // "Run" is a substring of "Morning Run", which comes first in list order
        let habits = vec![habit("h1", "Morning Run"), habit("h2", "Run")];
        assert_eq!(match_habit("run", Some("Run"), &habits).unwrap().id, "h2");
    }

    #[test]
    fn test_exact_name_beats_earlier_substring() {
        let habits = vec![habit("h1", "Morning Run"), habit("h2", "Run")];
        assert_eq!(find_best_match("RUN", &habits).unwrap().id, "h2");
    }

    #[test]
    fn test_first_hit_in_list_order() {
        let habits = vec![habit("h1", "Evening Walk"), habit("h2", "Walk")];
        assert_eq!(find_best_match("brisk walk", &habits).unwrap().id, "h1");
    }

    #[test]
    fn test_no_overlap_is_unmatched() {
        let habits = vec![habit("h1", "Reading"), habit("h2", "Morning Run")];
        assert!(match_habit("yoga", None, &habits).is_none());
        assert!(find_best_match("   ", &habits).is_none());
    }
}
