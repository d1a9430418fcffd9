pub mod import; // Text sources from upstream OCR
pub mod extraction; // Grammar-based field extraction
pub mod coordinator; // Bounded queue + worker pool
