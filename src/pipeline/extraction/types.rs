use std::collections::BTreeMap;

use uuid::Uuid;

use crate::models::{Confidence, EntityType, ExtractionResult, RawSpan};

/// A single grammar's committed match, before it is bound to a document.
#[derive(Debug, Clone, PartialEq)]
pub struct GrammarMatch {
    pub entity_type: EntityType,
    pub span: RawSpan,
    pub value: String,
    pub currency: Option<String>,
    pub confidence: Confidence,
    pub attributes: BTreeMap<String, String>,
}

impl GrammarMatch {
    /// Build a match over `text[start..end]`.
    pub fn new(entity_type: EntityType, text: &str, start: usize, end: usize, value: impl Into<String>) -> Self {
        Self {
            entity_type,
            span: RawSpan {
                start,
                end,
                text: text[start..end].to_string(),
            },
            value: value.into(),
            currency: None,
            confidence: Confidence::new(1.0),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Confidence::new(confidence);
        self
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn into_result(self, document_id: Uuid) -> ExtractionResult {
        ExtractionResult {
            document_id,
            entity_type: self.entity_type,
            value: self.value,
            currency: self.currency,
            confidence: self.confidence,
            raw_span: self.span,
            attributes: self.attributes,
        }
    }
}

/// A pure rule mapping raw text to zero-or-one match for one entity type.
///
/// Implementations hold no mutable state, so one instance is shared by
/// every worker without locking.
pub trait Grammar: Send + Sync {
    fn entity_type(&self) -> EntityType;

    /// First full match in `text`, if any. A mismatch is not an error.
    fn find(&self, text: &str) -> Option<GrammarMatch>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nothing;

    impl Grammar for Nothing {
        fn entity_type(&self) -> EntityType {
            EntityType::Certificate
        }
        fn find(&self, _text: &str) -> Option<GrammarMatch> {
            None
        }
    }

    #[test]
    fn grammar_is_object_safe() {
        let g: Box<dyn Grammar> = Box::new(Nothing);
        assert!(g.find("anything").is_none());
    }

    #[test]
    fn match_records_span_text() {
        let text = "VAT No P051234567X";
        let m = GrammarMatch::new(EntityType::TaxId, text, 7, 18, "P051234567X")
            .with_confidence(2.0)
            .with_attribute("scheme", "VAT");
        assert_eq!(m.span.text, "P051234567X");
        assert_eq!(m.confidence.value(), 1.0);

        let id = Uuid::new_v4();
        let result = m.into_result(id);
        assert_eq!(result.document_id, id);
        assert_eq!(result.attribute("scheme"), Some("VAT"));
    }
}
