use serde::Serialize;

use crate::domain::ClassificationMap;

const WORDS_PER_POST: f64 = 10.0;
const WORDS_PER_MINUTE: f64 = 200.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSaved {
    pub posts_filtered: usize,
    pub minutes: f64,
    pub display: String,
}

impl TimeSaved {
    /// `None` when nothing has been filtered yet.
    pub fn from_classifications(classifications: &ClassificationMap) -> Option<Self> {
        let posts_filtered = classifications.values().filter(|keep| !**keep).count();
        if posts_filtered == 0 {
            return None;
        }
        let minutes = posts_filtered as f64 * WORDS_PER_POST / WORDS_PER_MINUTE;
        Some(Self {
            posts_filtered,
            minutes,
            display: format_minutes(minutes),
        })
    }
}

fn format_minutes(minutes: f64) -> String {
    if minutes < 60.0 {
        format!("{} minutes", minutes.round())
    } else if minutes < 1440.0 {
        format!("{} hours", round_tenths(minutes / 60.0))
    } else {
        format!("{} days", round_tenths(minutes / 1440.0))
    }
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
