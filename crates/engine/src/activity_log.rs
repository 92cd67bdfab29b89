use std::collections::VecDeque;

pub const DEFAULT_LOG_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Notice,
    Debug,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub text: String,
}

/// Bounded newest-first list of player-facing messages.
///
/// `revision` bumps on every push so views can tell when to refresh.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<LogEntry>,
    limit: usize,
    revision: u64,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_LIMIT)
    }
}

impl ActivityLog {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
            revision: 0,
        }
    }

    pub fn push(&mut self, level: LogLevel, text: impl Into<String>) {
        self.entries.push_front(LogEntry {
            level,
            text: text.into(),
        });
        self.entries.truncate(self.limit);
        self.revision = self.revision.wrapping_add(1);
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&LogEntry> {
        self.entries.front()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_newest_entries_up_to_limit() {
        let mut log = ActivityLog::new(3);
        for index in 0..5 {
            log.push(LogLevel::Notice, format!("entry {index}"));
        }

        let texts: Vec<&str> = log.entries().map(|entry| entry.text.as_str()).collect();
        assert_eq!(texts, vec!["entry 4", "entry 3", "entry 2"]);
        assert_eq!(log.revision(), 5);
    }

    #[test]
    fn zero_limit_still_keeps_latest_entry() {
        let mut log = ActivityLog::new(0);
        log.push(LogLevel::Info, "first");
        log.push(LogLevel::Debug, "second");

        assert_eq!(log.len(), 1);
        assert_eq!(log.latest().map(|entry| entry.level), Some(LogLevel::Debug));
    }
}
