/// Confidence bands shared by the grammars and the engine's output filter.
pub mod thresholds {
    /// Below this: treated as noise and dropped by the engine.
    pub const VERY_LOW: f32 = 0.30;

    /// Below this: significant uncertainty.
    pub const LOW: f32 = 0.50;

    /// Partial template or loosely-marked match.
    pub const MODERATE: f32 = 0.70;

    /// Explicit marker plus well-formed body.
    pub const HIGH: f32 = 0.85;

    /// Matches a known canonical shape exactly.
    pub const VERY_HIGH: f32 = 0.95;
}

/// Score a message template by how many of its optional parts were found.
/// `base` applies when nothing optional matched; each hit adds an equal share
/// of the remaining headroom up to 1.0.
pub fn template_confidence(base: f32, hits: usize, optional_parts: usize) -> f32 {
    if optional_parts == 0 {
        return base.clamp(0.0, 1.0);
    }
    let share = (1.0 - base) / optional_parts as f32;
    (base + share * hits.min(optional_parts) as f32).clamp(0.0, 1.0)
}
