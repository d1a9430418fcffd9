use serde::{Deserialize, Serialize};

use super::ModelError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The string form is also the serde representation.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ModelError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(DocumentStatus {
    Queued => "queued",
    Processing => "processing",
    Extracted => "extracted",
    Failed => "failed",
});

impl DocumentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Extracted | Self::Failed)
    }
}

str_enum!(DocumentFormat {
    Invoice => "invoice",
    Tender => "tender",
    Certificate => "certificate",
    FinancialMessage => "financial_message",
    Unknown => "unknown",
});

// Declaration order is the conflict precedence (see `extraction::engine::PRECEDENCE`).
str_enum!(EntityType {
    TaxId => "taxId",
    GovRef => "govRef",
    Certificate => "certificate",
    Amount => "amount",
    SmsTransaction => "smsTransaction",
});

str_enum!(Direction {
    In => "in",
    Out => "out",
    Unclassified => "unclassified",
});

str_enum!(Provider {
    MPesa => "mpesa",
    AirtelMoney => "airtel_money",
    Bank => "bank",
    Unknown => "unknown",
});

// Ordered by severity so `max()` gives the worst level.
str_enum!(AlertLevel {
    Normal => "normal",
    Warning => "warning",
    Critical => "critical",
});

str_enum!(Resource {
    Cpu => "cpu",
    Memory => "memory",
    Disk => "disk",
});

str_enum!(LivenessStatus {
    Healthy => "healthy",
    Unreachable => "unreachable",
});

str_enum!(RestartOutcome {
    Success => "success",
    Failed => "failed",
});

str_enum!(SupervisorState {
    Healthy => "healthy",
    Degraded => "degraded",
    Critical => "critical",
    Recovering => "recovering",
    Halted => "halted",
});

str_enum!(DrainOutcome {
    Stopped => "stopped",
    Forced => "forced",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn document_status_round_trip() {
        for (variant, s) in [
            (DocumentStatus::Queued, "queued"),
            (DocumentStatus::Processing, "processing"),
            (DocumentStatus::Extracted, "extracted"),
            (DocumentStatus::Failed, "failed"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(DocumentStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn entity_type_uses_wire_names() {
        assert_eq!(EntityType::TaxId.as_str(), "taxId");
        assert_eq!(
            serde_json::to_string(&EntityType::SmsTransaction).unwrap(),
            "\"smsTransaction\""
        );
        let parsed: EntityType = serde_json::from_str("\"govRef\"").unwrap();
        assert_eq!(parsed, EntityType::GovRef);
    }

    #[test]
    fn alert_levels_order_by_severity() {
        assert!(AlertLevel::Critical > AlertLevel::Warning);
        assert!(AlertLevel::Warning > AlertLevel::Normal);
        let worst = [AlertLevel::Warning, AlertLevel::Normal, AlertLevel::Critical]
            .into_iter()
            .max();
        assert_eq!(worst, Some(AlertLevel::Critical));
    }

    #[test]
    fn terminal_statuses() {
        assert!(DocumentStatus::Extracted.is_terminal());
        assert!(DocumentStatus::Failed.is_terminal());
        assert!(!DocumentStatus::Queued.is_terminal());
        assert!(!DocumentStatus::Processing.is_terminal());
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(DocumentStatus::from_str("done").is_err());
        assert!(Direction::from_str("sideways").is_err());
        assert!(SupervisorState::from_str("").is_err());
    }
}
