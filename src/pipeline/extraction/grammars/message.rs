//! Financial message grammar for short mobile-money and bank-alert texts.
//!
//! Provider templates differ in phrasing but share the parts we need:
//! ```text
//! QHX12ABC34 Confirmed. Ksh1,500.00 sent to JOHN DOE 0712345678 on 12/3/24 at 2:15 PM.
//! QHX98XYZ76 Confirmed. You have received Ksh2,000.00 from JANE DOE 0722000000 on 5/1/24 at 10:02 AM
//! Your account XXXX1234 has been credited with KES 5,000.00 by ACME LTD on 12-03-2024. Ref: FT24072ABC
//! ```
//! Direction comes from keywords (leftmost wins). Messages with no direction
//! keyword take the configured default instead of guessing.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::{Captures, Regex};

use super::super::confidence::{template_confidence, thresholds};
use super::super::types::{Grammar, GrammarMatch};
use super::amount::{ceiling_to_minor, find_amounts, AmountHit};
use crate::models::{Direction, EntityType, Provider};

const INBOUND_KEYWORDS: &[&str] = &["received from", "have received", "credited"];
const OUTBOUND_KEYWORDS: &[&str] = &["sent to", "paid to", "debited", "withdrawn"];

const BANK_KEYWORDS: &[&str] = &[
    "BANK", "KCB", "EQUITY", "COOP", "CO-OP", "NCBA", "ABSA", "STANBIC", "DTB", "STANCHART",
];

static COUNTERPARTY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i:received\s+from|sent\s+to|paid\s+to|from|by)\s+(?P<name>[A-Z][A-Z0-9.'&\- ]*?[A-Z0-9])(?:\s+\+?\d{9,13}\b|\s+(?i:on|at|for|via|acc|account)\b|[.,;]|\s*$)",
    )
    .unwrap()
});

static MOBILE_REFERENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?P<code>[A-Z0-9]{10})\s+(?i:confirmed)").unwrap());

static BANK_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?i:ref(?:erence)?\.?(?:\s*no\.?)?)\s*[:#]?\s*(?P<code>[A-Z0-9]{6,})\b").unwrap()
});

static ISO_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?P<y>\d{4})-(?P<m>\d{2})-(?P<d>\d{2})(?:[ T](?P<h>\d{1,2}):(?P<min>\d{2}))?").unwrap()
});

static DMY_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?P<d>\d{1,2})[/\-](?P<m>\d{1,2})[/\-](?P<y>\d{4}|\d{2})\b(?:\s*(?i:at)?\s*(?P<h>\d{1,2}):(?P<min>\d{2})(?::\d{2})?\s*(?P<ampm>(?i:am|pm))?)?",
    )
    .unwrap()
});

/// Everything the grammar pulled out of one message.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedMessage {
    pub amount: AmountHit,
    pub direction: Direction,
    /// False when `direction` is the configured default.
    pub direction_matched: bool,
    pub provider: Provider,
    pub counterparty: Option<String>,
    pub reference: Option<String>,
    pub timestamp: Option<NaiveDateTime>,
}

/// Identify the provider from the sender id, falling back to the body.
pub fn detect_provider(sender: Option<&str>, body: &str) -> Provider {
    let classify = |s: &str| -> Option<Provider> {
        let upper = s.to_ascii_uppercase();
        if upper.contains("MPESA") || upper.contains("M-PESA") {
            Some(Provider::MPesa)
        } else if upper.contains("AIRTEL") {
            Some(Provider::AirtelMoney)
        } else if BANK_KEYWORDS.iter().any(|k| upper.contains(k)) {
            Some(Provider::Bank)
        } else {
            None
        }
    };

    if let Some(p) = sender.and_then(classify) {
        return p;
    }
    if let Some(p) = classify(body) {
        return p;
    }
    let lower = body.to_lowercase();
    if lower.contains("account") && (lower.contains("credited") || lower.contains("debited")) {
        return Provider::Bank;
    }
    Provider::Unknown
}

/// Direction from the leftmost inbound/outbound keyword, if any.
pub fn infer_direction(body: &str) -> Option<Direction> {
    let lower = body.to_lowercase();
    let first = |keywords: &[&str]| keywords.iter().filter_map(|k| lower.find(k)).min();
    match (first(INBOUND_KEYWORDS), first(OUTBOUND_KEYWORDS)) {
        (Some(i), Some(o)) => Some(if i <= o { Direction::In } else { Direction::Out }),
        (Some(_), None) => Some(Direction::In),
        (None, Some(_)) => Some(Direction::Out),
        (None, None) => None,
    }
}

fn find_counterparty(body: &str) -> Option<String> {
    COUNTERPARTY_PATTERN
        .captures(body)
        .and_then(|c| c.name("name"))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| name.len() >= 2)
}

fn find_reference(body: &str) -> Option<String> {
    MOBILE_REFERENCE
        .captures(body)
        .or_else(|| BANK_REFERENCE.captures(body))
        .and_then(|c| c.name("code"))
        .map(|m| m.as_str().to_string())
}

fn number(caps: &Captures<'_>, name: &str) -> Option<u32> {
    caps.name(name)?.as_str().parse().ok()
}

fn build_timestamp(caps: &Captures<'_>) -> Option<NaiveDateTime> {
    let raw_year = caps.name("y")?.as_str();
    let mut year: i32 = raw_year.parse().ok()?;
    if raw_year.len() == 2 {
        year += 2000;
    }
    let date = NaiveDate::from_ymd_opt(year, number(caps, "m")?, number(caps, "d")?)?;

    let time = match (number(caps, "h"), number(caps, "min")) {
        (Some(mut hour), Some(minute)) => {
            if let Some(ampm) = caps.name("ampm") {
                let pm = ampm.as_str().eq_ignore_ascii_case("pm");
                if hour == 0 || hour > 12 {
                    return None;
                }
                hour = match (pm, hour) {
                    (true, 12) => 12,
                    (true, h) => h + 12,
                    (false, 12) => 0,
                    (false, h) => h,
                };
            }
            NaiveTime::from_hms_opt(hour, minute, 0)?
        }
        _ => NaiveTime::MIN,
    };
    Some(date.and_time(time))
}

/// First parseable date (ISO before day-first forms).
pub fn find_timestamp(body: &str) -> Option<NaiveDateTime> {
    ISO_TIMESTAMP
        .captures_iter(body)
        .find_map(|c| build_timestamp(&c))
        .or_else(|| DMY_TIMESTAMP.captures_iter(body).find_map(|c| build_timestamp(&c)))
}

pub struct MessageGrammar {
    ceiling_minor: u64,
    unmatched_direction: Direction,
}

impl MessageGrammar {
    pub fn new(max_magnitude: f64, unmatched_direction: Direction) -> Self {
        Self {
            ceiling_minor: ceiling_to_minor(max_magnitude),
            unmatched_direction,
        }
    }

    /// Parse a message. `None` when the body carries no valid amount.
    pub fn parse(&self, sender: Option<&str>, body: &str) -> Option<ParsedMessage> {
        let amount = find_amounts(body, self.ceiling_minor).into_iter().next()?;
        let inferred = infer_direction(body);
        Some(ParsedMessage {
            amount,
            direction: inferred.unwrap_or(self.unmatched_direction),
            direction_matched: inferred.is_some(),
            provider: detect_provider(sender, body),
            counterparty: find_counterparty(body),
            reference: find_reference(body),
            timestamp: find_timestamp(body),
        })
    }
}

impl ParsedMessage {
    pub fn confidence(&self) -> f32 {
        let hits = [
            self.direction_matched,
            self.provider != Provider::Unknown,
            self.counterparty.is_some(),
            self.timestamp.is_some(),
        ]
        .iter()
        .filter(|hit| **hit)
        .count();
        template_confidence(thresholds::LOW + 0.1, hits, 4)
    }
}

impl Grammar for MessageGrammar {
    fn entity_type(&self) -> EntityType {
        EntityType::SmsTransaction
    }

    fn find(&self, text: &str) -> Option<GrammarMatch> {
        let parsed = self.parse(None, text)?;
        let mut m = GrammarMatch::new(
            EntityType::SmsTransaction,
            text,
            0,
            text.len(),
            parsed.amount.amount.to_string(),
        )
        .with_currency(parsed.amount.currency)
        .with_confidence(parsed.confidence())
        .with_attribute("direction", parsed.direction.as_str())
        .with_attribute("provider", parsed.provider.as_str());
        if let Some(cp) = parsed.counterparty {
            m = m.with_attribute("counterparty", cp);
        }
        if let Some(reference) = parsed.reference {
            m = m.with_attribute("reference", reference);
        }
        if let Some(ts) = parsed.timestamp {
            m = m.with_attribute("timestamp", ts.format("%Y-%m-%dT%H:%M:%S").to_string());
        }
        Some(m)
    }
}
