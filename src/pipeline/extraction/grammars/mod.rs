//! One module per entity grammar. Each is a pure `text -> Option<GrammarMatch>` rule.

pub mod amount;
pub mod certificate;
pub mod gov_ref;
pub mod message;
pub mod tax_id;

pub use amount::{AmountGrammar, AmountHit};
pub use certificate::CertificateGrammar;
pub use gov_ref::GovRefGrammar;
pub use message::{MessageGrammar, ParsedMessage};
pub use tax_id::TaxIdGrammar;
