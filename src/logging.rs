//! Structured logging module for Habitloop
//!
//! Writes category-tagged lines to stdout and, once initialized, to
//! `<log_dir>/habitloop-YYYY-MM-DD.log`:
//! - ROUTING: intent classification decisions
//! - MODE: mode handler outcomes and fallbacks
//! - STORE: persistence side effects (completions, auto-created habits)
//! - REQUEST: assistant turn lifecycle
//! - ERROR: failures caught at the request boundary

use chrono::{Local, Utc};
use once_cell::sync::Lazy;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
pub enum LogCategory {
    Routing,
    Mode,
    Store,
    Request,
    Error,
}

impl LogCategory {
    fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Routing => "ROUTING",
            LogCategory::Mode => "MODE",
            LogCategory::Store => "STORE",
            LogCategory::Request => "REQUEST",
            LogCategory::Error => "ERROR",
        }
    }
}

/// Active log directory; `None` means console only
static LOG_DIR: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

fn log_file_path(dir: &Path) -> PathBuf {
    let today = Local::now().format("%Y-%m-%d").to_string();
    dir.join(format!("habitloop-{}.log", today))
}

/// Initialize file logging - creates the log directory if needed
pub fn init_logging(log_dir: &Path) -> std::io::Result<()> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    if let Ok(mut guard) = LOG_DIR.lock() {
        *guard = Some(log_dir.to_path_buf());
    }

    log(LogCategory::Request, None, "Habitloop logging initialized");
    Ok(())
}

pub fn format_line(category: LogCategory, user_id: Option<&str>, message: &str) -> String {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let user_context = user_id
        .map(|id| format!("user={} | ", &id[..id.char_indices().nth(8).map_or(id.len(), |(i, _)| i)]))
        .unwrap_or_default();

    format!("[{}] [{}] {}{}\n", timestamp, category.as_str(), user_context, message)
}

/// Log a message with category and optional user context
pub fn log(category: LogCategory, user_id: Option<&str>, message: &str) {
    let line = format_line(category, user_id, message);

    print!("{}", line);

    let dir = LOG_DIR.lock().ok().and_then(|guard| guard.clone());
    if let Some(dir) = dir {
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path(&dir))
        {
            let _ = file.write_all(line.as_bytes());
        }
    }
}

pub fn log_routing(user_id: Option<&str>, message: &str) {
    log(LogCategory::Routing, user_id, message);
}

pub fn log_mode(user_id: Option<&str>, message: &str) {
    log(LogCategory::Mode, user_id, message);
}

pub fn log_store(user_id: Option<&str>, message: &str) {
    log(LogCategory::Store, user_id, message);
}

pub fn log_request(user_id: Option<&str>, message: &str) {
    log(LogCategory::Request, user_id, message);
}

pub fn log_error(user_id: Option<&str>, message: &str) {
    log(LogCategory::Error, user_id, message);
}

/// Delete log files older than `retention_days`
pub fn cleanup_old_logs(log_dir: &Path, retention_days: i64) -> std::io::Result<usize> {
    let mut deleted = 0;

    if !log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(retention_days);

    for entry in fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }

        if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
            let modified_time: chrono::DateTime<Utc> = modified.into();
            if modified_time < cutoff && fs::remove_file(&path).is_ok() {
                deleted += 1;
            }
        }
    }

    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line_truncates_user_id() {
        let line = format_line(LogCategory::Store, Some("user-1234567890"), "created completion");
        assert!(line.contains("[STORE]"));
        assert!(line.contains("user=user-123 | created completion"));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn test_format_line_without_user() {
        let line = format_line(LogCategory::Routing, None, "intent=coach");
        assert!(line.contains("[ROUTING] intent=coach"));
        assert!(!line.contains("user="));
    }

    #[test]
    fn test_cleanup_missing_dir_is_noop() {
        let dir = std::env::temp_dir().join(format!("habitloop-missing-{}", uuid::Uuid::new_v4()));
        assert_eq!(cleanup_old_logs(&dir, 7).unwrap(), 0);
    }

    #[test]
    fn test_cleanup_keeps_fresh_logs() {
        let dir = std::env::temp_dir().join(format!("habitloop-logs-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("habitloop-today.log"), "line\n").unwrap();

        assert_eq!(cleanup_old_logs(&dir, 7).unwrap(), 0);
        assert!(dir.join("habitloop-today.log").exists());

        fs::remove_dir_all(&dir).unwrap();
    }
}
