// Colored terminal output for scores and replay summaries.
//
// This module handles all terminal-specific formatting. The main.rs
// display paths delegate here.

use colored::Colorize;

use crate::models::{AnomalyScore, Severity};
use crate::pipeline::replay::ReplaySummary;

/// Display one scored action in detail.
pub fn display_score(label: &str, score: &AnomalyScore) {
    println!("\n{}", format!("=== {label} ===").bold());

    println!("  Severity: {}", colorize_severity(score.severity));
    println!("  Overall score: {:.3}", score.overall);
    println!("  Confidence: {:.2}", score.confidence);

    let anomaly_str = if score.is_anomaly {
        "yes".red().to_string()
    } else {
        "no".green().to_string()
    };
    let flag_str = if score.should_auto_flag {
        "yes".red().bold().to_string()
    } else {
        "no".normal().to_string()
    };
    println!("  Anomaly: {anomaly_str}  |  Auto-flag: {flag_str}");

    if score.reason_codes.is_empty() {
        println!("  Reasons: {}", "none".dimmed());
    } else {
        let reasons: Vec<&str> = score.reason_codes.iter().map(|r| r.as_str()).collect();
        println!("  Reasons: {}", reasons.join(", ").yellow());
    }

    let f = &score.features;
    println!(
        "  Velocity: {}/5m {}/1h  |  IP fan-in: {}  UA fan-in: {}  IPs used: {}",
        f.short_window_count, f.long_window_count, f.ip_fan_in, f.ua_fan_in, f.distinct_ips
    );
    println!(
        "  Burst: {:.2}  Timing entropy: {:.2} ({} samples)  Trust: {}  Age: {:.0}d",
        f.burst_score, f.timing_entropy, f.timing_samples, f.trust_score, f.account_age_days
    );
}

/// Display the outcome of a replay run: flagged actions, then totals.
pub fn display_replay_summary(summary: &ReplaySummary) {
    if !summary.flagged.is_empty() {
        println!(
            "\n{}",
            format!("=== Flagged Actions ({}) ===", summary.flagged.len()).bold()
        );
        println!();
        println!(
            "  {:<36} {:>6}  {:<9}  {:>4}  {}",
            "Action".dimmed(),
            "Score".dimmed(),
            "Severity".dimmed(),
            "Conf".dimmed(),
            "Reasons".dimmed(),
        );
        println!("  {}", "-".repeat(78).dimmed());

        for flagged in &summary.flagged {
            let reasons: Vec<&str> = flagged
                .score
                .reason_codes
                .iter()
                .map(|r| r.as_str())
                .collect();
            println!(
                "  {:<36} {:>6.3}  {:<9}  {:>4.2}  {}",
                super::truncate_chars(&flagged.record.describe(), 34),
                flagged.score.overall,
                colorize_severity(flagged.score.severity),
                flagged.score.confidence,
                reasons.join(",").dimmed(),
            );
        }
    }

    println!();
    println!(
        "  {} actions scored ({} parse failures, {} rejected)",
        summary.scored, summary.parse_failures, summary.validation_failures
    );

    let critical = summary.at_or_above(Severity::Critical);
    let high = summary.at_or_above(Severity::High) - critical;
    if critical > 0 {
        println!("  {} {} critical actions", "!!".red().bold(), critical);
    }
    if high > 0 {
        println!("  {} {} high-severity actions", "!".bright_red(), high);
    }
    if summary.anomalies > 0 {
        println!("  {} {} anomalous actions", "~".yellow(), summary.anomalies);
    }
    if summary.auto_flagged > 0 {
        println!(
            "  {} {} eligible for auto-flagging",
            ">".red(),
            summary.auto_flagged
        );
    }
    if summary.anomalies == 0 {
        println!("  {}", "No anomalies detected.".green());
    }
}

/// Colorize a severity tier.
fn colorize_severity(severity: Severity) -> colored::ColoredString {
    let s = severity.as_str();
    match severity {
        Severity::Critical => s.red().bold(),
        Severity::High => s.bright_red(),
        Severity::Medium => s.yellow(),
        Severity::Low => s.cyan(),
        Severity::None => s.green(),
    }
}
