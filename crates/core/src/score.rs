//! Landing score and tier

use serde::{Deserialize, Serialize};
use std::fmt;

/// A landing rating, always within 1..=10
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    /// Clamp any integer into the valid range
    pub fn clamped(raw: i64) -> Self {
        Self(raw.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn level(self) -> Level {
        Level::for_score(self)
    }

    /// Iterate all scores from 1 to 10
    pub fn all() -> impl Iterator<Item = Score> {
        (Self::MIN..=Self::MAX).map(Score)
    }
}

impl Default for Score {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Colour tier shown by the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// 1–3, red
    Bad,
    /// 4–6, amber
    Ok,
    /// 7–8, yellow
    Good,
    /// 9–10, green
    Great,
}

impl Level {
    pub fn for_score(score: Score) -> Self {
        match score.value() {
            0..=3 => Level::Bad,
            4..=6 => Level::Ok,
            7..=8 => Level::Good,
            _ => Level::Great,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Bad => "bad",
            Level::Ok => "ok",
            Level::Good => "good",
            Level::Great => "great",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
