//! Tax identifier grammar: `PIN`, `KRA PIN`, `VAT`, `TIN` or `Tax Ref`
//! as a whole word, optional `No.`/`Number`/`#` and separator, then an alphanumeric
//! body of at least [`MIN_BODY_LEN`] characters containing a digit.

use std::sync::LazyLock;

use regex::Regex;

use super::super::confidence::thresholds;
use super::super::types::{Grammar, GrammarMatch};
use crate::models::EntityType;

/// Shortest accepted identifier body.
pub const MIN_BODY_LEN: usize = 8;

static TAX_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?P<keyword>KRA\s+PIN|PIN|VAT(?:\s+REG(?:ISTRATION)?)?|TIN|TAX\s+REF(?:ERENCE)?)\b(?:\s*(?:NO\b\.?|NUMBER|#))?\s*[:\-]?\s*(?P<body>[A-Z0-9]{8,})\b",
    )
    .unwrap()
});

/// KRA PIN shape: letter A or P, nine digits, check letter.
static KRA_PIN_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[AP]\d{9}[A-Z]$").unwrap());

fn scheme_for(keyword: &str) -> &'static str {
    let k = keyword.to_ascii_uppercase();
    if k.starts_with("VAT") {
        "VAT"
    } else if k.starts_with("TIN") {
        "TIN"
    } else if k.starts_with("TAX") {
        "TAX_REF"
    } else {
        "PIN"
    }
}

pub struct TaxIdGrammar;

impl TaxIdGrammar {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TaxIdGrammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar for TaxIdGrammar {
    fn entity_type(&self) -> EntityType {
        EntityType::TaxId
    }

    fn find(&self, text: &str) -> Option<GrammarMatch> {
        TAX_ID_PATTERN.captures_iter(text).find_map(|caps| {
            let full = caps.get(0)?;
            let body = caps.name("body")?.as_str().to_ascii_uppercase();
            if body.len() < MIN_BODY_LEN || !body.chars().any(|c| c.is_ascii_digit()) {
                return None;
            }
            let confidence = if KRA_PIN_SHAPE.is_match(&body) {
                thresholds::VERY_HIGH
            } else {
                thresholds::HIGH
            };
            let scheme = scheme_for(caps.name("keyword")?.as_str());
            Some(
                GrammarMatch::new(EntityType::TaxId, text, full.start(), full.end(), body)
                    .with_confidence(confidence)
                    .with_attribute("scheme", scheme),
            )
        })
    }
}
