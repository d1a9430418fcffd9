//! Certificate grammar: prefix token, four-digit year, sequence number.
//! `CERT/2021/00123`, `Certificate No. 2019-4567`, `CPR 2020 123`.

use std::sync::LazyLock;

use regex::Regex;

use super::super::confidence::thresholds;
use super::super::types::{Grammar, GrammarMatch};
use crate::models::EntityType;

static CERTIFICATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?P<prefix>CERT(?:IFICATE)?|CRT|COC|CPR|PVT|BN|REG)(?:\s*NO\b\.?)?\s*[/\-:#\s]\s*(?P<year>(?:19|20)\d{2})\s*[/\-\s]\s*(?P<seq>\d{1,8})\b",
    )
    .unwrap()
});

fn canonical_prefix(raw: &str) -> String {
    let upper = raw.to_ascii_uppercase();
    if upper == "CERTIFICATE" {
        "CERT".to_string()
    } else {
        upper
    }
}

pub struct CertificateGrammar;

impl CertificateGrammar {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CertificateGrammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar for CertificateGrammar {
    fn entity_type(&self) -> EntityType {
        EntityType::Certificate
    }

    fn find(&self, text: &str) -> Option<GrammarMatch> {
        let caps = CERTIFICATE_PATTERN.captures(text)?;
        let full = caps.get(0)?;
        let prefix = canonical_prefix(caps.name("prefix")?.as_str());
        let year = caps.name("year")?.as_str();
        let seq = caps.name("seq")?.as_str();
        Some(
            GrammarMatch::new(
                EntityType::Certificate,
                text,
                full.start(),
                full.end(),
                format!("{prefix}/{year}/{seq}"),
            )
            .with_confidence(thresholds::HIGH)
            .with_attribute("prefix", prefix)
            .with_attribute("year", year)
            .with_attribute("sequence", seq),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_form() {
        let m = CertificateGrammar::new().find("Ref CERT/2021/00123 attached").unwrap();
        assert_eq!(m.value, "CERT/2021/00123");
        assert_eq!(m.attributes["year"], "2021");
        assert_eq!(m.attributes["sequence"], "00123");
    }

    #[test]
    fn written_prefix_with_number_label() {
        let m = CertificateGrammar::new().find("Certificate No. 2019-4567").unwrap();
        assert_eq!(m.value, "CERT/2019/4567");
        assert_eq!(m.attributes["prefix"], "CERT");
    }

    #[test]
    fn space_separated() {
        let m = CertificateGrammar::new().find("cpr 2020 123").unwrap();
        assert_eq!(m.value, "CPR/2020/123");
    }

    #[test]
    fn year_must_be_plausible() {
        assert!(CertificateGrammar::new().find("CERT/1820/55").is_none());
        assert!(CertificateGrammar::new().find("CERT/20/55").is_none());
    }

    #[test]
    fn prefix_without_year_is_no_match() {
        assert!(CertificateGrammar::new().find("CERT pending").is_none());
    }
}
