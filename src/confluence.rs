//! SMC + AI confluence
//!
//! Confluence holds when the AI is confident enough, agrees with the SMC bias,
//! and price sits inside an order block or fair-value gap. The combined signal
//! weighs SMC above AI and is reported alongside the rule-based decision.

use serde::{Deserialize, Serialize};

use crate::services::{AiPrediction, ServiceReadout, SmcReport};
use crate::types::Signal;

const SMC_WEIGHT: f64 = 0.7;
const AGREEMENT_BASE: f64 = 0.8;
const AI_AGREEMENT_WEIGHT: f64 = 0.2;
const CONFLICT_CONFIDENCE: f64 = 0.7;
const SMC_ONLY_CONFIDENCE: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfluenceReport {
    pub smc_bias: Signal,
    pub ai_signal: Signal,
    pub ai_confidence: f64,
    pub price_in_zone: bool,
    pub confirmed: bool,
    pub combined_signal: Signal,
    pub combined_confidence: f64,
}

/// Directional agreement backed by a confident AI and a structural zone
pub fn is_confluent(smc: &SmcReport, ai: &AiPrediction, price: f64, threshold: f64) -> bool {
    let bias = smc.bias_signal();
    bias.is_directional()
        && ai.signal() == bias
        && ai.confidence() >= threshold
        && smc.price_in_zone(price)
}

/// Merge the two sources, SMC taking priority on conflict
pub fn combine(smc_bias: Signal, ai: &AiPrediction, risk_ok: bool) -> (Signal, f64) {
    if !risk_ok {
        return (Signal::Neutral, 0.0);
    }

    let ai_signal = ai.signal();
    match (smc_bias.is_directional(), ai_signal.is_directional()) {
        (true, true) if smc_bias == ai_signal => {
            let confidence = AGREEMENT_BASE * SMC_WEIGHT + AI_AGREEMENT_WEIGHT * ai.confidence();
            (smc_bias, confidence.min(1.0))
        }
        (true, true) => (smc_bias, CONFLICT_CONFIDENCE),
        (true, false) => (smc_bias, SMC_ONLY_CONFIDENCE),
        (false, true) => (ai_signal, ai.confidence()),
        (false, false) => (Signal::Neutral, 0.0),
    }
}

pub fn evaluate(readout: &ServiceReadout, price: f64, threshold: f64, risk_ok: bool) -> ConfluenceReport {
    let smc_bias = readout.smc.bias_signal();
    let (combined_signal, combined_confidence) = combine(smc_bias, &readout.ai, risk_ok);

    ConfluenceReport {
        smc_bias,
        ai_signal: readout.ai.signal(),
        ai_confidence: readout.ai.confidence(),
        price_in_zone: readout.smc.price_in_zone(price),
        confirmed: is_confluent(&readout.smc, &readout.ai, price, threshold),
        combined_signal,
        combined_confidence,
    }
}
