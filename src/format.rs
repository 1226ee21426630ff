//! Chat message rendering

use crate::confluence::ConfluenceReport;
use crate::patterns::Pattern;
use crate::types::AnalysisReport;

const NOT_AVAILABLE: &str = "N/A";

fn price_or_na(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Render one timeframe's analysis, optionally with the SMC/AI section
pub fn format_report(report: &AnalysisReport, confluence: Option<&ConfluenceReport>) -> String {
    let snap = &report.snapshot;
    let decision = &report.decision;
    let risk = &report.risk;

    let pattern = match report.pattern.pattern {
        Pattern::None => "No pattern".to_string(),
        other => other.to_string(),
    };

    let mut lines = vec![
        format!("📊 {} Signal ({})", report.symbol, report.timeframe),
        format!("💰 Price: {:.2}", snap.price),
        format!("📈 RSI14: {:.2}", snap.rsi14),
        format!("📉 EMA20: {}", price_or_na(snap.ema20)),
        format!("📉 EMA50: {:.2}", snap.ema50),
        format!("📉 EMA200: {:.2}", snap.ema200),
        format!("🕯 Pattern Detected: {}", pattern),
        format!("📌 Trend direction: {}", snap.trend()),
        format!(
            "⚠️ Risk: {} ({}%) → {}",
            risk.risk_level, risk.risk_percent, risk.risk_direction
        ),
        format!(
            "🧮 Risk score: {:.1}/100 ({})",
            risk.risk_score,
            if risk.safe_trade { "safe" } else { "unsafe" }
        ),
        format!("🎯 Final SIGNAL: {}", decision.signal),
        format!("🔮 Probability: {}%", decision.probability_percent),
        format!("🚪 Entry: {}", price_or_na(report.levels.map(|l| l.entry))),
        format!("🛑 Stop Loss: {}", price_or_na(report.levels.map(|l| l.stop_loss))),
        format!("✅ Take Profit: {}", price_or_na(report.levels.map(|l| l.take_profit))),
        format!(
            "💡 Reason: {}/{} conditions met ({})",
            decision.conditions_met,
            decision.total_conditions,
            decision.reasons.join(", ")
        ),
    ];

    if let Some(c) = confluence {
        lines.push(format!("🏛 SMC bias: {}", c.smc_bias));
        lines.push(format!(
            "🤖 AI: {} ({:.0}%)",
            c.ai_signal,
            c.ai_confidence * 100.0
        ));
        lines.push(format!(
            "🔗 Confluence: {}",
            if c.confirmed { "yes" } else { "no" }
        ));
    }

    lines.join("\n")
}

/// Short reply for a failed on-demand analysis
pub fn format_failure(interval: &str, reason: &str) -> String {
    format!("Error processing {} timeframe: {}", interval, reason)
}
