use colored::Colorize;

use crate::core::results::{KeyReport, RunSummary};

/// Mask a key for display: leading characters and the last four only.
pub fn mask_key(key: &str) -> String {
    let count = key.chars().count();
    if count <= 14 {
        return key.to_string();
    }
    let head: String = key.chars().take(10).collect();
    let tail: String = key.chars().skip(count - 4).collect();
    format!("{}...{}", head, tail)
}

pub struct OutputFormatter;

impl OutputFormatter {
    pub fn print_banner() {
        println!("{}", "=".repeat(70).bright_cyan());
        println!(
            "{}",
            "  key-sweep - leaked key discovery and validation"
                .bright_cyan()
                .bold()
        );
        println!("{}", "=".repeat(70).bright_cyan());
        println!();
    }

    pub fn print_ethical_warning() {
        println!("{}", "ETHICAL USE ONLY".yellow().bold());
        println!("This tool is for security research and responsible disclosure only.");
        println!("Report every live key to its owner and provider; never use one.");
        println!();
    }

    pub fn print_valid_key(report: &KeyReport) {
        let limit = report
            .facts
            .hard_limit_usd
            .map(|l| format!("${:.2}", l))
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "  {} {} [{}] plan: {}, limit: {}, payment method: {}, gpt-4: {}",
            "VALID".bright_green().bold(),
            mask_key(&report.key).bright_cyan(),
            report.source,
            report.facts.plan.as_deref().unwrap_or("unknown").bright_white(),
            limit.bright_yellow(),
            fmt_opt_bool(report.facts.has_payment_method),
            if report.facts.gpt4_allowed { "yes" } else { "no" },
        );
    }

    pub fn print_invalid_key(key: &str, reason: &str) {
        println!(
            "  {} {} ({})",
            "invalid".bright_black(),
            mask_key(key),
            reason
        );
    }

    pub fn print_summary(summary: &RunSummary) {
        println!();
        println!("{}", "=".repeat(70).bright_cyan());
        println!("{}", "  Run Summary".bright_cyan().bold());
        println!("{}", "=".repeat(70).bright_cyan());
        println!();
        println!(
            "  Candidates discovered: {}",
            summary.discovered.to_string().bright_white()
        );
        println!(
            "  Unique this run: {}",
            summary.unique_candidates.to_string().bright_white()
        );
        println!(
            "  Already known: {}",
            summary.skipped_known.to_string().bright_white()
        );
        println!("  Valid: {}", summary.valid.to_string().bright_green());
        println!("  Invalid: {}", summary.invalid.to_string().bright_red());
        println!(
            "  Transient failures: {}",
            summary.transient_errors.to_string().bright_yellow()
        );
        if summary.persistence_failures > 0 {
            println!(
                "  {} {}",
                "Persistence failures:".red().bold(),
                summary.persistence_failures.to_string().bright_red()
            );
        }
        println!();

        if summary.valid > 0 {
            println!(
                "{}",
                "VALID KEYS FOUND - RESPONSIBLE DISCLOSURE REQUIRED"
                    .yellow()
                    .bold()
            );
            println!("Report them to the repository owners and the provider.");
            println!();
        }
        println!("{}", "=".repeat(70).bright_cyan());
    }

    pub fn print_error(message: &str) {
        eprintln!("{}", message.red());
    }
}

fn fmt_opt_bool(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_key_hides_middle() {
        let key = format!("sk-{}", "a".repeat(48));
        let masked = mask_key(&key);
        assert!(masked.starts_with("sk-aaaaaaa"));
        assert!(masked.ends_with("aaaa"));
        assert!(masked.len() < key.len());
    }

    #[test]
    fn test_mask_key_leaves_short_strings() {
        assert_eq!(mask_key("sk-short"), "sk-short");
    }

    #[test]
    fn test_mask_key_handles_multibyte_chars() {
        let key = format!("sk-{}", "é".repeat(20));
        let masked = mask_key(&key);
        assert!(masked.starts_with("sk-ééééééé"));
        assert!(masked.ends_with("éééé"));
    }
}
