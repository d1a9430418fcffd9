use chrono::NaiveDateTime;
use uuid::Uuid;

use super::confidence::thresholds;
use super::grammars::{AmountGrammar, CertificateGrammar, GovRefGrammar, MessageGrammar, TaxIdGrammar};
use super::sanitize::{control_char_ratio, sanitize_text};
use super::types::{Grammar, GrammarMatch};
use super::ExtractionError;
use crate::config::Settings;
use crate::models::{Direction, DocumentFormat, EntityType, ExtractionResult, FinancialMessage};

/// Conflict precedence for overlapping spans, highest first.
pub const PRECEDENCE: [EntityType; 4] = [
    EntityType::TaxId,
    EntityType::GovRef,
    EntityType::Certificate,
    EntityType::Amount,
];

/// Above this share of control characters the input is binary noise.
const MAX_CONTROL_RATIO: f32 = 0.10;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub max_amount_magnitude: f64,
    pub max_text_bytes: usize,
    pub unmatched_direction: Direction,
    /// Matches scoring below this are dropped.
    pub min_confidence: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for EngineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            max_amount_magnitude: settings.max_amount_magnitude,
            max_text_bytes: settings.max_text_bytes,
            unmatched_direction: settings.unmatched_direction,
            min_confidence: thresholds::VERY_LOW,
        }
    }
}

fn precedence_rank(entity_type: EntityType) -> usize {
    PRECEDENCE
        .iter()
        .position(|t| *t == entity_type)
        .unwrap_or(PRECEDENCE.len())
}

/// Grammar-driven text to entity conversion.
///
/// Holds only immutable grammar tables: one engine is shared by every worker
/// (`Arc<ExtractionEngine>`) and `extract` is safe to call concurrently.
pub struct ExtractionEngine {
    config: EngineConfig,
    /// Document grammars in `PRECEDENCE` order.
    grammars: Vec<Box<dyn Grammar>>,
    message: MessageGrammar,
}

impl ExtractionEngine {
    pub fn new(config: EngineConfig) -> Self {
        let mut grammars: Vec<Box<dyn Grammar>> = vec![
            Box::new(AmountGrammar::new(config.max_amount_magnitude)),
            Box::new(CertificateGrammar::new()),
            Box::new(GovRefGrammar::new()),
            Box::new(TaxIdGrammar::new()),
        ];
        grammars.sort_by_key(|g| precedence_rank(g.entity_type()));
        let message = MessageGrammar::new(config.max_amount_magnitude, config.unmatched_direction);
        Self {
            config,
            grammars,
            message,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Extract every entity from `text`.
    ///
    /// Spans refer to the sanitized text. Output is ordered by span start,
    /// ties broken by precedence, so identical input always yields an
    /// identical list. Financial messages (`type_hint`) go through the
    /// message grammar instead of the document grammars.
    pub fn extract(
        &self,
        document_id: Uuid,
        text: &str,
        type_hint: Option<DocumentFormat>,
    ) -> Result<Vec<ExtractionResult>, ExtractionError> {
        let clean = self.prepare(text)?;

        let matches = if type_hint == Some(DocumentFormat::FinancialMessage) {
            self.message.find(&clean).into_iter().collect()
        } else {
            self.resolve(&clean)
        };

        let mut results: Vec<ExtractionResult> = matches
            .into_iter()
            .filter(|m| m.confidence.value() >= self.config.min_confidence)
            .map(|m| m.into_result(document_id))
            .collect();
        results.sort_by_key(|r| (r.raw_span.start, precedence_rank(r.entity_type)));

        tracing::debug!(
            document_id = %document_id,
            entities = results.len(),
            "Extraction complete"
        );
        Ok(results)
    }

    /// Parse a short financial message into its typed form.
    ///
    /// `received_at` stands in when the body carries no timestamp.
    /// `Ok(None)` when the body holds no valid amount.
    pub fn extract_message(
        &self,
        sender: &str,
        body: &str,
        received_at: NaiveDateTime,
    ) -> Result<Option<FinancialMessage>, ExtractionError> {
        let clean = self.prepare(body)?;
        let Some(parsed) = self.message.parse(Some(sender), &clean) else {
            return Ok(None);
        };
        Ok(Some(FinancialMessage {
            sender: sender.to_string(),
            body: clean,
            timestamp: parsed.timestamp.unwrap_or(received_at),
            amount: parsed.amount.amount,
            currency: parsed.amount.currency.to_string(),
            direction: parsed.direction,
            provider: parsed.provider,
            counterparty: parsed.counterparty,
            reference: parsed.reference,
        }))
    }

    fn prepare(&self, raw: &str) -> Result<String, ExtractionError> {
        if raw.len() > self.config.max_text_bytes {
            return Err(ExtractionError::TooLarge {
                size: raw.len(),
                max: self.config.max_text_bytes,
            });
        }
        if raw.contains('\0') {
            return Err(ExtractionError::Malformed("input contains NUL bytes".into()));
        }
        let ratio = control_char_ratio(raw);
        if ratio > MAX_CONTROL_RATIO {
            return Err(ExtractionError::Malformed(format!(
                "{:.0}% control characters",
                ratio * 100.0
            )));
        }
        let clean = sanitize_text(raw);
        if clean.is_empty() {
            return Err(ExtractionError::EmptyInput);
        }
        Ok(clean)
    }

    /// Run each grammar once, then accept matches in precedence order,
    /// dropping any that overlap a span already accepted.
    fn resolve(&self, text: &str) -> Vec<GrammarMatch> {
        let mut accepted: Vec<GrammarMatch> = Vec::new();
        for grammar in &self.grammars {
            let Some(candidate) = grammar.find(text) else {
                continue;
            };
            if let Some(winner) = accepted.iter().find(|a| a.span.overlaps(&candidate.span)) {
                tracing::debug!(
                    dropped = %candidate.entity_type,
                    kept = %winner.entity_type,
                    "Overlapping match dropped"
                );
                continue;
            }
            accepted.push(candidate);
        }
        accepted
    }
}

impl Default for ExtractionEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
