use rust_decimal::{Decimal, RoundingStrategy};

const BREAKDOWN_SUFFIX: &str = "_cost_breakdown.csv";
const COMPLIANCE_SUFFIX: &str = "_compliance.csv";
const MAX_STEM_CHARS: usize = 96;

/// `<site>_cost_breakdown.csv` with path separators and control characters
/// replaced so the result is a single file name.
pub fn export_file_name(site_name: &str) -> String {
    file_name(site_name, BREAKDOWN_SUFFIX)
}

pub fn compliance_file_name(site_name: &str) -> String {
    file_name(site_name, COMPLIANCE_SUFFIX)
}

fn file_name(site_name: &str, suffix: &str) -> String {
    let mut stem = String::new();
    for ch in site_name.trim().chars().take(MAX_STEM_CHARS) {
        if ch.is_control() || matches!(ch, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
            stem.push('_');
        } else {
            stem.push(ch);
        }
    }
    let stem = stem.trim_matches('.');
    if stem.is_empty() {
        format!("site{suffix}")
    } else {
        format!("{stem}{suffix}")
    }
}

/// Whole pounds with thousands separators, e.g. `£1,000,000`.
pub fn format_gbp(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let digits = rounded.abs().trunc().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded.is_sign_negative() && !rounded.is_zero() {
        format!("-£{grouped}")
    } else {
        format!("£{grouped}")
    }
}
