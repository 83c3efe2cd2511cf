//! User-facing status of an edit record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Persisted value of `edits.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl EditStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EditStatus::Pending => "pending",
            EditStatus::Processing => "processing",
            EditStatus::Completed => "completed",
            EditStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EditStatus::Completed | EditStatus::Failed)
    }

    /// `pending → processing → {completed | failed}`; `pending` may also fail
    /// directly when the first step exhausts its retries. Never in reverse.
    pub fn can_transition_to(self, next: EditStatus) -> bool {
        match (self, next) {
            (EditStatus::Pending, EditStatus::Processing | EditStatus::Failed) => true,
            (EditStatus::Processing, EditStatus::Completed | EditStatus::Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for EditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EditStatus::Pending),
            "processing" => Ok(EditStatus::Processing),
            "completed" => Ok(EditStatus::Completed),
            "failed" => Ok(EditStatus::Failed),
            other => Err(CoreError::Validation(format!("Unknown edit status '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_allowed() {
        assert!(EditStatus::Pending.can_transition_to(EditStatus::Processing));
        assert!(EditStatus::Processing.can_transition_to(EditStatus::Completed));
        assert!(EditStatus::Processing.can_transition_to(EditStatus::Failed));
        assert!(EditStatus::Pending.can_transition_to(EditStatus::Failed));
    }

    #[test]
    fn reverse_and_terminal_transitions_rejected() {
        assert!(!EditStatus::Processing.can_transition_to(EditStatus::Pending));
        assert!(!EditStatus::Completed.can_transition_to(EditStatus::Failed));
        assert!(!EditStatus::Failed.can_transition_to(EditStatus::Processing));
        assert!(!EditStatus::Pending.can_transition_to(EditStatus::Completed));
    }

    #[test]
    fn parses_database_names() {
        assert_eq!("processing".parse::<EditStatus>().unwrap(), EditStatus::Processing);
        assert!("done".parse::<EditStatus>().is_err());
    }
}
