use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{Direction, EntityType, Provider};

/// Confidence in `[0, 1]`. Out-of-range and NaN inputs are clamped on construction.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(from = "f32", into = "f32")]
pub struct Confidence(f32);

impl Confidence {
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self(0.0);
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(&self) -> f32 {
        self.0
    }
}

impl From<f32> for Confidence {
    fn from(value: f32) -> Self {
        Self::new(value)
    }
}

impl From<Confidence> for f32 {
    fn from(c: Confidence) -> Self {
        c.0
    }
}

/// Non-negative fixed-precision money value in minor units (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount {
    pub minor_units: u64,
}

impl Amount {
    pub fn from_minor(minor_units: u64) -> Self {
        Self { minor_units }
    }

    pub fn as_f64(&self) -> f64 {
        self.minor_units as f64 / 100.0
    }

    /// Parse a canonical decimal string with exactly two fraction digits.
    pub fn parse_canonical(s: &str) -> Option<Self> {
        let (whole, frac) = s.split_once('.')?;
        if frac.len() != 2 || whole.is_empty() {
            return None;
        }
        let whole: u64 = whole.parse().ok()?;
        let frac: u64 = frac.parse().ok()?;
        whole.checked_mul(100)?.checked_add(frac).map(Self::from_minor)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.minor_units / 100, self.minor_units % 100)
    }
}

/// Location of a match in the (sanitized) input text, in byte offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSpan {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl RawSpan {
    pub fn overlaps(&self, other: &RawSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One structured entity derived from a document. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub document_id: Uuid,
    pub entity_type: EntityType,
    pub value: String,
    pub currency: Option<String>,
    pub confidence: Confidence,
    pub raw_span: RawSpan,
    /// Grammar-specific fields (agency, year, direction, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl ExtractionResult {
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    /// Parsed amount for `amount` and `smsTransaction` entities.
    pub fn amount(&self) -> Option<Amount> {
        match self.entity_type {
            EntityType::Amount | EntityType::SmsTransaction => Amount::parse_canonical(&self.value),
            _ => None,
        }
    }
}

/// A short financial text message (mobile-money confirmation, bank alert).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialMessage {
    pub sender: String,
    pub body: String,
    pub timestamp: NaiveDateTime,
    pub amount: Amount,
    pub currency: String,
    pub direction: Direction,
    pub provider: Provider,
    pub counterparty: Option<String>,
    /// Provider transaction code, when the template carries one.
    pub reference: Option<String>,
}
