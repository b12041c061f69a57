//! Temporal classification of task records.
//!
//! Every record date falls into exactly one bucket relative to a fixed
//! `today`: past (`< today`), today (`== today`), or future (`> today`).
//! Comparisons are plain string comparisons, which match chronological
//! order because the canonical date format is fixed-width and zero-padded.

use crate::task::TaskRecord;

/// Separator between task text and date in a rendered future row.
pub const ROW_SEPARATOR: &str = ":\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Past,
    Today,
    Future,
}

#[must_use]
pub fn classify(date: &str, today: &str) -> Bucket {
    if date < today {
        Bucket::Past
    } else if date == today {
        Bucket::Today
    } else {
        Bucket::Future
    }
}

#[must_use]
pub fn is_past(date: &str, today: &str) -> bool {
    date < today
}

#[must_use]
pub fn is_today(date: &str, today: &str) -> bool {
    date == today
}

#[must_use]
pub fn is_future(date: &str, today: &str) -> bool {
    date > today
}

/// Which partition is materialized into the display list. Past records
/// are never displayed, only purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Today,
    Future,
}

impl ViewMode {
    #[must_use]
    pub fn admits(self, date: &str, today: &str) -> bool {
        match self {
            Self::Today => is_today(date, today),
            Self::Future => is_future(date, today),
        }
    }

    /// Render a record as a display row. Today rows carry the text alone;
    /// future rows append the date behind [`ROW_SEPARATOR`] so the user
    /// can see when the task is scheduled.
    #[must_use]
    pub fn render_row(self, record: &TaskRecord) -> String {
        match self {
            Self::Today => record.task.clone(),
            Self::Future => format!("{}{ROW_SEPARATOR}{}", record.task, record.task_date),
        }
    }

    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Today => Self::Future,
            Self::Future => Self::Today,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Future => "future",
        }
    }
}

/// Invert a rendered future row back into `(text, date)`.
///
/// Splits at the first [`ROW_SEPARATOR`] occurrence: everything before it
/// is the task text, everything after the separator's literal width is the
/// date. Returns `None` for a row without a separator (a today-style row).
#[must_use]
pub fn split_display_row(raw: &str) -> Option<(&str, &str)> {
    raw.split_once(ROW_SEPARATOR)
}
