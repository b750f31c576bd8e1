//! Sampling seed and narration voice parameters.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Largest seed the image backend accepts.
pub const MAX_SEED: u64 = (1 << 31) - 1;

/// A sampling seed as given on the command line.
///
/// `-1` requests a random seed; it must be resolved to a concrete
/// non-negative value before submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Seed {
    #[default]
    Random,
    Fixed(u64),
}

impl Seed {
    /// Concrete seed value, drawing a fresh one for [`Seed::Random`].
    pub fn resolve(self) -> u64 {
        match self {
            Self::Fixed(value) => value,
            Self::Random => rand::rng().random_range(0..=MAX_SEED),
        }
    }
}

impl FromStr for Seed {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("Seed must be an integer, got '{s}'")))?;
        match value {
            -1 => Ok(Self::Random),
            v if v >= 0 && v as u64 <= MAX_SEED => Ok(Self::Fixed(v as u64)),
            v => Err(CoreError::Validation(format!(
                "Seed must be -1 (random) or between 0 and {MAX_SEED}, got {v}"
            ))),
        }
    }
}

impl fmt::Display for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random => f.write_str("-1"),
            Self::Fixed(v) => write!(f, "{v}"),
        }
    }
}

/// Voices offered by the OpenAI-compatible speech endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    Alloy,
    Echo,
    Fable,
    #[default]
    Onyx,
    Nova,
    Shimmer,
    Coral,
}

pub const ALL_VOICES: &[Voice] = &[
    Voice::Alloy,
    Voice::Echo,
    Voice::Fable,
    Voice::Onyx,
    Voice::Nova,
    Voice::Shimmer,
    Voice::Coral,
];

impl Voice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Echo => "echo",
            Self::Fable => "fable",
            Self::Onyx => "onyx",
            Self::Nova => "nova",
            Self::Shimmer => "shimmer",
            Self::Coral => "coral",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Voice {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ALL_VOICES
            .iter()
            .copied()
            .find(|v| v.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = ALL_VOICES.iter().map(Voice::as_str).collect();
                CoreError::Validation(format!(
                    "Unknown voice '{s}'. Must be one of: {}",
                    names.join(", ")
                ))
            })
    }
}
