//! Poll and vote records

use crate::error::{PollError, PollResult};
use serde::{Deserialize, Serialize};

/// Maximum question length in characters
pub const MAX_QUESTION_LEN: usize = 500;

/// Maximum option label length in characters
pub const MAX_OPTION_LEN: usize = 200;

/// Minimum number of non-blank options a poll needs
pub const MIN_OPTIONS: usize = 2;

/// Maximum number of options a poll may carry
pub const MAX_OPTIONS: usize = 32;

/// A stored poll. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub question: String,
    pub options: Vec<String>,
    pub created_at: i64,
}

impl Poll {
    pub fn option_count(&self) -> usize {
        self.options.len()
    }
}

/// A validated poll draft, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPoll {
    question: String,
    options: Vec<String>,
}

impl NewPoll {
    /// Trim the question and options, drop blank options and enforce limits.
    pub fn new(question: &str, options: &[String]) -> PollResult<Self> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PollError::InvalidArgument(
                "Question cannot be empty".to_string(),
            ));
        }
        if question.chars().count() > MAX_QUESTION_LEN {
            return Err(PollError::InvalidArgument(format!(
                "Question exceeds {} characters",
                MAX_QUESTION_LEN
            )));
        }

        let options: Vec<String> = options
            .iter()
            .map(|o| o.trim())
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        if options.len() < MIN_OPTIONS {
            return Err(PollError::InvalidArgument(format!(
                "Need at least {} valid options",
                MIN_OPTIONS
            )));
        }
        if options.len() > MAX_OPTIONS {
            return Err(PollError::InvalidArgument(format!(
                "At most {} options are allowed",
                MAX_OPTIONS
            )));
        }
        if options.iter().any(|o| o.chars().count() > MAX_OPTION_LEN) {
            return Err(PollError::InvalidArgument(format!(
                "Option exceeds {} characters",
                MAX_OPTION_LEN
            )));
        }

        Ok(Self {
            question: question.to_string(),
            options,
        })
    }

    /// Assign an id and creation time.
    pub fn into_poll(self) -> Poll {
        Poll {
            id: uuid::Uuid::new_v4().to_string(),
            question: self.question,
            options: self.options,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

/// One accepted vote. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub poll_id: String,
    pub option_index: u32,
    /// Canonical network origin of the voter
    pub origin: String,
    pub fingerprint: String,
    pub cast_at: i64,
}
