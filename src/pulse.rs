/// Haptic pattern data: pulse sequences, candidate pairs and completed rounds.
///
/// Wire shape (shared by the generation service and the history context):
///
///   { "vibrations": [v1, v2, ...], "delays": [d1, d2, ...] }
///
/// where v_i is how long the motor runs and d_i the pause after it. The
/// last delay is conventionally 0.

use crate::error::PulseError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One actuation: run the motor for `vibration_ms`, then wait `delay_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    pub vibration_ms: u32,
    pub delay_ms: u32,
}

/// Non-empty, immutable list of pulses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSequence", into = "RawSequence")]
pub struct PulseSequence {
    pulses: Vec<Pulse>,
}

/// Parallel-array form as it appears on the wire. Values are signed so that
/// negative numbers from the generator are reported as such rather than as
/// a generic parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSequence {
    pub vibrations: Vec<i64>,
    pub delays: Vec<i64>,
}

impl PulseSequence {
    /// Build a sequence from parallel vibration/delay arrays.
    pub fn new(vibrations: &[i64], delays: &[i64]) -> Result<Self, PulseError> {
        if vibrations.len() != delays.len() {
            return Err(PulseError::LengthMismatch {
                vibrations: vibrations.len(),
                delays: delays.len(),
            });
        }
        if vibrations.is_empty() {
            return Err(PulseError::Empty);
        }
        let pulses = vibrations
            .iter()
            .zip(delays)
            .enumerate()
            .map(|(index, (&v, &d))| {
                Ok(Pulse {
                    vibration_ms: to_millis("vibrations", index, v)?,
                    delay_ms: to_millis("delays", index, d)?,
                })
            })
            .collect::<Result<Vec<_>, PulseError>>()?;
        Ok(Self { pulses })
    }

    pub fn pulses(&self) -> &[Pulse] {
        &self.pulses
    }

    /// Time from the first actuation until the last one stops, in ms.
    /// The trailing delay is not counted since nothing follows it.
    pub fn span_ms(&self) -> u64 {
        let last = self.pulses.len() - 1;
        self.pulses
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let delay = if i == last { 0 } else { p.delay_ms as u64 };
                p.vibration_ms as u64 + delay
            })
            .sum()
    }
}

fn to_millis(field: &'static str, index: usize, value: i64) -> Result<u32, PulseError> {
    u32::try_from(value).map_err(|_| PulseError::InvalidValue { field, index, value })
}

impl TryFrom<RawSequence> for PulseSequence {
    type Error = PulseError;

    fn try_from(raw: RawSequence) -> Result<Self, Self::Error> {
        PulseSequence::new(&raw.vibrations, &raw.delays)
    }
}

impl From<PulseSequence> for RawSequence {
    fn from(seq: PulseSequence) -> Self {
        RawSequence {
            vibrations: seq.pulses.iter().map(|p| p.vibration_ms as i64).collect(),
            delays: seq.pulses.iter().map(|p| p.delay_ms as i64).collect(),
        }
    }
}

impl fmt::Display for PulseSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |values: Vec<String>| values.join(", ");
        write!(
            f,
            "Vibrations: {}, Delays: {}",
            join(self.pulses.iter().map(|p| p.vibration_ms.to_string()).collect()),
            join(self.pulses.iter().map(|p| p.delay_ms.to_string()).collect()),
        )
    }
}

/// Which of the two offered options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    A,
    B,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => f.write_str("Option 1"),
            Side::B => f.write_str("Option 2"),
        }
    }
}

/// Two candidate patterns offered together in one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidatePair {
    #[serde(rename = "option1")]
    option_a: PulseSequence,
    #[serde(rename = "option2")]
    option_b: PulseSequence,
}

impl CandidatePair {
    pub fn new(option_a: PulseSequence, option_b: PulseSequence) -> Self {
        Self { option_a, option_b }
    }

    pub fn option(&self, side: Side) -> &PulseSequence {
        match side {
            Side::A => &self.option_a,
            Side::B => &self.option_b,
        }
    }
}

impl fmt::Display for CandidatePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", Side::A, self.option_a)?;
        write!(f, "{}: {}", Side::B, self.option_b)
    }
}

/// The user's verdict on a candidate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preference {
    #[serde(rename = "option1")]
    OptionA,
    #[serde(rename = "option2")]
    OptionB,
    #[serde(rename = "neither")]
    Neither,
}

impl Preference {
    /// The preferred side, if any.
    pub fn side(self) -> Option<Side> {
        match self {
            Preference::OptionA => Some(Side::A),
            Preference::OptionB => Some(Side::B),
            Preference::Neither => None,
        }
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preference::OptionA => f.write_str("option1"),
            Preference::OptionB => f.write_str("option2"),
            Preference::Neither => f.write_str("neither"),
        }
    }
}

/// A completed comparison. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    #[serde(flatten)]
    pair: CandidatePair,
    preferred: Preference,
    #[serde(default)]
    feedback: String,
}

impl Round {
    pub fn new(pair: CandidatePair, preferred: Preference, feedback: impl Into<String>) -> Self {
        Self {
            pair,
            preferred,
            feedback: feedback.into(),
        }
    }

    pub fn preferred(&self) -> Preference {
        self.preferred
    }

    pub fn feedback(&self) -> &str {
        &self.feedback
    }

    /// The sequence the user picked, or None for "neither".
    pub fn chosen(&self) -> Option<&PulseSequence> {
        self.preferred.side().map(|side| self.pair.option(side))
    }
}

#[cfg(test)]
pub(crate) fn seq(vibrations: &[i64], delays: &[i64]) -> PulseSequence {
    PulseSequence::new(vibrations, delays).unwrap()
}
