use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub type ClassificationMap = HashMap<String, bool>;

/// Verdict for a post. Anything that cannot be classified is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Decision {
    #[default]
    Keep,
    Remove,
}

impl Decision {
    pub fn is_keep(self) -> bool {
        matches!(self, Decision::Keep)
    }

    pub fn label(self) -> &'static str {
        match self {
            Decision::Keep => "keep",
            Decision::Remove => "remove",
        }
    }
}

impl From<bool> for Decision {
    fn from(keep: bool) -> Self {
        if keep {
            Decision::Keep
        } else {
            Decision::Remove
        }
    }
}

impl From<Decision> for bool {
    fn from(decision: Decision) -> Self {
        decision.is_keep()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostContent {
    pub author: String,
    pub text: String,
}

impl PostContent {
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            text: text.into(),
        }
    }

    /// Posts without body text are never fingerprinted or cached.
    pub fn is_classifiable(&self) -> bool {
        !self.text.is_empty()
    }

    pub fn preview(&self, max_chars: usize) -> String {
        self.text.chars().take(max_chars).collect()
    }
}
