/// Sanitize upstream text before the grammars see it.
/// Strips control characters, folds exotic spaces, trims lines and drops blank ones.
/// Currency symbols and identifier punctuation pass through untouched.
pub fn sanitize_text(raw: &str) -> String {
    raw.replace("\r\n", "\n")
        .chars()
        .filter_map(|c| match c {
            '\n' => Some('\n'),
            '\t' => Some(' '),
            // NBSP, narrow NBSP, figure space, thin space (common in OCR'd amounts)
            '\u{00A0}' | '\u{202F}' | '\u{2007}' | '\u{2009}' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect::<String>()
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Share of characters that are control characters other than line breaks and tabs.
pub fn control_char_ratio(raw: &str) -> f32 {
    let total = raw.chars().count();
    if total == 0 {
        return 0.0;
    }
    let control = raw
        .chars()
        .filter(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
        .count();
    control as f32 / total as f32
}
