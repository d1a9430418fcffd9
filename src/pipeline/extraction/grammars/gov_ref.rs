//! Government reference grammar.
//!
//! Slash-delimited structured codes led by a known agency:
//! `KeNHA/R1-228-2021`, `KURA/RMLF/HQ/2022/115`, `PPRA/TND/034/2023-2024`.
//! Segments vary in number; the year is the first four-digit 19xx/20xx token
//! and the sequence is the last remaining all-digit token.

use std::sync::LazyLock;

use regex::Regex;

use super::super::confidence::thresholds;
use super::super::types::{Grammar, GrammarMatch};
use crate::models::EntityType;

/// Recognized issuing agencies, in canonical spelling.
pub const AGENCIES: &[&str] = &[
    "KeNHA", "KeRRA", "KURA", "KenGen", "KPLC", "KEBS", "NEMA", "NTSA", "PPRA", "NHIF", "NSSF",
    "KRA", "NCA", "KWS", "KPA", "KAA", "MOH",
];

static GOV_REF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // Longest names first so a shorter agency never shadows a longer one.
    let mut names: Vec<&str> = AGENCIES.to_vec();
    names.sort_by_key(|n| std::cmp::Reverse(n.len()));
    let alternation = names.join("|");
    Regex::new(&format!(
        r"(?i)\b(?P<agency>{alternation})(?P<rest>(?:/[A-Za-z0-9][A-Za-z0-9.\-]*)+)"
    ))
    .unwrap()
});

fn canonical_agency(raw: &str) -> Option<&'static str> {
    AGENCIES.iter().copied().find(|a| a.eq_ignore_ascii_case(raw))
}

fn is_year(token: &str) -> bool {
    token.len() == 4
        && token.chars().all(|c| c.is_ascii_digit())
        && (token.starts_with("19") || token.starts_with("20"))
}

pub struct GovRefGrammar;

impl GovRefGrammar {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GovRefGrammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar for GovRefGrammar {
    fn entity_type(&self) -> EntityType {
        EntityType::GovRef
    }

    fn find(&self, text: &str) -> Option<GrammarMatch> {
        GOV_REF_PATTERN.captures_iter(text).find_map(|caps| {
            let full = caps.get(0)?;
            let agency = canonical_agency(caps.name("agency")?.as_str())?;

            // Sentence punctuation is not part of the code
            let rest = caps.name("rest")?.as_str().trim_end_matches(['.', '-']);
            let end = caps.name("rest")?.start() + rest.len();

            let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
            if segments.is_empty() {
                return None;
            }
            let tokens: Vec<&str> = segments
                .iter()
                .flat_map(|s| s.split(['-', '.']))
                .filter(|t| !t.is_empty())
                .collect();
            let year = tokens.iter().copied().find(|t| is_year(t));
            let sequence = tokens
                .iter()
                .rev()
                .copied()
                .find(|t| Some(*t) != year && t.chars().all(|c| c.is_ascii_digit()));

            let value = format!("{agency}{rest}");
            let confidence = if year.is_some() {
                thresholds::HIGH + 0.05
            } else {
                thresholds::MODERATE + 0.05
            };

            let mut m = GrammarMatch::new(EntityType::GovRef, text, full.start(), end, value)
                .with_confidence(confidence)
                .with_attribute("agency", agency)
                .with_attribute("segments", segments.len().to_string());
            if let Some(year) = year {
                m = m.with_attribute("year", year);
            }
            if let Some(seq) = sequence {
                m = m.with_attribute("sequence", seq);
            }
            Some(m)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kenha_reference() {
        let m = GovRefGrammar::new().find("KeNHA/R1-228-2021").unwrap();
        assert_eq!(m.entity_type, EntityType::GovRef);
        assert_eq!(m.attributes["agency"], "KeNHA");
        assert_eq!(m.attributes["year"], "2021");
        assert_eq!(m.attributes["sequence"], "228");
        assert_eq!(m.value, "KeNHA/R1-228-2021");
    }

    #[test]
    fn many_segments() {
        let m = GovRefGrammar::new()
            .find("Tender No. KURA/RMLF/HQ/2022/115 closes Friday")
            .unwrap();
        assert_eq!(m.attributes["agency"], "KURA");
        assert_eq!(m.attributes["segments"], "4");
        assert_eq!(m.attributes["year"], "2022");
        assert_eq!(m.attributes["sequence"], "115");
        assert_eq!(m.span.text, "KURA/RMLF/HQ/2022/115");
    }

    #[test]
    fn agency_is_canonicalized() {
        let m = GovRefGrammar::new().find("ref kerra/07/2019/88").unwrap();
        assert_eq!(m.attributes["agency"], "KeRRA");
        assert_eq!(m.value, "KeRRA/07/2019/88");
    }

    #[test]
    fn trailing_period_excluded() {
        let m = GovRefGrammar::new().find("Quote KeNHA/R1-228-2021.").unwrap();
        assert_eq!(m.span.text, "KeNHA/R1-228-2021");
    }

    #[test]
    fn unknown_agency_is_no_match() {
        assert!(GovRefGrammar::new().find("ACME/2021/55").is_none());
    }

    #[test]
    fn agency_without_segments_is_no_match() {
        assert!(GovRefGrammar::new().find("Paid to KPLC today").is_none());
    }

    #[test]
    fn missing_year_lowers_confidence() {
        let with_year = GovRefGrammar::new().find("NEMA/EIA/2020/5").unwrap();
        let without = GovRefGrammar::new().find("NEMA/EIA/PSL/5").unwrap();
        assert!(without.attributes.get("year").is_none());
        assert!(with_year.confidence > without.confidence);
    }
}
