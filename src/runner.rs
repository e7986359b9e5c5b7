//! Helpers for following a running fit.

use std::sync::OnceLock;

use regex::Regex;

use crate::state::controls::Procedure;

fn simplex_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(\d+\.\d+)").expect("valid regex"))
}

fn de_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Best: (\d+\.\d+)").expect("valid regex"))
}

/// Chi-squared value reported in an iteration message, as written.
///
/// Only the simplex and differential evolution procedures report one.
pub fn live_chi_squared(message: &str, procedure: Procedure) -> Option<&str> {
    let pattern = match procedure {
        Procedure::Simplex => simplex_pattern(),
        Procedure::DifferentialEvolution => de_pattern(),
        _ => return None,
    };
    pattern
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}
