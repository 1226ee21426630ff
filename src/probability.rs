//! Probability display mapping
//!
//! The band is a deterministic function of how many conditions held; the value
//! inside the band is drawn from an injected random source. This is display
//! jitter, not a modelled probability, so seeded sources are used wherever a
//! result must be reproducible.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::types::Signal;

/// Inclusive percent range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbabilityBand {
    pub low: u8,
    pub high: u8,
}

impl ProbabilityBand {
    pub const fn new(low: u8, high: u8) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: u8) -> bool {
        (self.low..=self.high).contains(&value)
    }

    pub fn sample<R: Rng>(&self, rng: &mut R) -> u8 {
        rng.gen_range(self.low..=self.high)
    }
}

pub const NEUTRAL_BAND: ProbabilityBand = ProbabilityBand::new(0, 10);
const FALLBACK_BAND: ProbabilityBand = ProbabilityBand::new(5, 24);

/// Band for a decision with `met` of `total` conditions satisfied
pub fn band_for(signal: Signal, met: usize, total: usize) -> ProbabilityBand {
    if signal == Signal::Neutral {
        return NEUTRAL_BAND;
    }

    let missed = total.checked_sub(met);
    match (missed, met) {
        (Some(0), _) => ProbabilityBand::new(90, 99),
        (Some(1), _) => ProbabilityBand::new(75, 89),
        (Some(2), _) => ProbabilityBand::new(60, 74),
        (Some(3), _) => ProbabilityBand::new(45, 59),
        (_, 1) => ProbabilityBand::new(25, 44),
        (_, 0) => ProbabilityBand::new(5, 24),
        _ => FALLBACK_BAND,
    }
}

/// Draw a display probability for the decision
pub fn probability_percent<R: Rng>(signal: Signal, met: usize, total: usize, rng: &mut R) -> u8 {
    band_for(signal, met, total).sample(rng)
}
