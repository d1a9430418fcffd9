//! Amount/currency grammar.
//!
//! A currency marker (code, symbol or written form) followed by a digit group
//! with optional thousands separators and exactly two decimal digits:
//! `KSh 1,234.56`, `KES1234.56`, `Kenya Shillings 500.00`, `US$ 20.00`.
//! Values at or above the magnitude ceiling are OCR corruption, not matches.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::super::confidence::thresholds;
use super::super::types::{Grammar, GrammarMatch};
use crate::models::{Amount, EntityType};

static AMOUNT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\b(?P<code>kenya\s+shillings?|k\s?shs?\.?|kes|shs?\.?|usd|us\$|eur|gbp)|(?P<symbol>[$€£]))\s*(?P<whole>\d{1,3}(?:,\d{3})+|\d+)\.(?P<frac>\d+)",
    )
    .unwrap()
});

/// One currency-marked amount found in text.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountHit {
    pub start: usize,
    pub end: usize,
    pub amount: Amount,
    pub currency: &'static str,
    pub confidence: f32,
}

/// Map a raw marker to an ISO currency code and a confidence for the marker kind.
fn normalize_marker(marker: &str) -> (&'static str, f32) {
    let m = marker.to_ascii_lowercase();
    let m = m.trim_end_matches('.');
    match m {
        "kes" | "usd" | "eur" | "gbp" | "us$" => (iso_code(m), thresholds::HIGH + 0.05),
        "$" => ("USD", thresholds::MODERATE + 0.05),
        "€" => ("EUR", thresholds::HIGH),
        "£" => ("GBP", thresholds::HIGH),
        // ksh / kshs / k sh / sh / shs / kenya shilling(s)
        _ if m.starts_with('k') && !m.starts_with("kenya") => ("KES", thresholds::HIGH + 0.05),
        _ => ("KES", thresholds::HIGH - 0.05),
    }
}

fn iso_code(m: &str) -> &'static str {
    match m {
        "usd" | "us$" => "USD",
        "eur" => "EUR",
        "gbp" => "GBP",
        _ => "KES",
    }
}

/// Strip separators and parse as minor units. `None` on malformed or
/// overflowing input.
fn parse_minor_units(whole: &str, frac: &str) -> Option<u64> {
    if frac.len() != 2 {
        return None;
    }
    let digits: String = whole.chars().filter(|c| *c != ',').collect();
    let whole: u64 = digits.parse().ok()?;
    let frac: u64 = frac.parse().ok()?;
    whole.checked_mul(100)?.checked_add(frac)
}

fn hit_from(caps: &Captures<'_>, ceiling_minor: u64) -> Option<AmountHit> {
    let full = caps.get(0)?;
    let marker = caps
        .name("code")
        .or_else(|| caps.name("symbol"))
        .map(|m| m.as_str())?;
    let minor = parse_minor_units(caps.name("whole")?.as_str(), caps.name("frac")?.as_str())?;
    if minor >= ceiling_minor {
        tracing::debug!(
            value = minor / 100,
            "Amount above magnitude ceiling, treating as OCR corruption"
        );
        return None;
    }
    let (currency, confidence) = normalize_marker(marker);
    Some(AmountHit {
        start: full.start(),
        end: full.end(),
        amount: Amount::from_minor(minor),
        currency,
        confidence,
    })
}

/// Every valid amount in `text`, in order of appearance.
pub fn find_amounts(text: &str, ceiling_minor: u64) -> Vec<AmountHit> {
    AMOUNT_PATTERN
        .captures_iter(text)
        .filter_map(|caps| hit_from(&caps, ceiling_minor))
        .collect()
}

/// Convert a ceiling in major units to minor units, saturating.
pub fn ceiling_to_minor(max_magnitude: f64) -> u64 {
    let minor = (max_magnitude * 100.0).floor();
    if minor >= u64::MAX as f64 {
        u64::MAX
    } else if minor <= 0.0 {
        0
    } else {
        minor as u64
    }
}

pub struct AmountGrammar {
    ceiling_minor: u64,
}

impl AmountGrammar {
    pub fn new(max_magnitude: f64) -> Self {
        Self {
            ceiling_minor: ceiling_to_minor(max_magnitude),
        }
    }
}

impl Grammar for AmountGrammar {
    fn entity_type(&self) -> EntityType {
        EntityType::Amount
    }

    fn find(&self, text: &str) -> Option<GrammarMatch> {
        AMOUNT_PATTERN
            .captures_iter(text)
            .find_map(|caps| hit_from(&caps, self.ceiling_minor))
            .map(|hit| {
                GrammarMatch::new(EntityType::Amount, text, hit.start, hit.end, hit.amount.to_string())
                    .with_currency(hit.currency)
                    .with_confidence(hit.confidence)
            })
    }
}
