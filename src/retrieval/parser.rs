//! Relevance score parsing
//!
//! Models asked for "a number from 0 to 10" answer with things like
//! `8`, `9.5`, `相关性分数：8分`, `Score: 7/10` or a whole sentence.
//! The first decimal number in the text is taken as the score.

/// Extract the first decimal number from free-form model output.
///
/// Full-width digits (`８`) and the full-width dot are accepted. A minus
/// sign directly in front of the number is kept, so callers can clamp it.
/// Returns `None` when no digit appears at all.
pub fn parse_score(text: &str) -> Option<f64> {
    let normalized: String = text.chars().map(normalize_char).collect();

    let bytes = normalized.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let starts_number = bytes[i].is_ascii_digit()
            || (bytes[i] == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit));

        if starts_number {
            let start = if i > 0 && bytes[i - 1] == b'-' { i - 1 } else { i };
            let mut seen_dot = false;
            while i < bytes.len() {
                match bytes[i] {
                    b'0'..=b'9' => i += 1,
                    b'.' if !seen_dot && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => {
                        seen_dot = true;
                        i += 1;
                    }
                    _ => break,
                }
            }
            return normalized[start..i].parse::<f64>().ok();
        }
        i += 1;
    }

    None
}

fn normalize_char(c: char) -> char {
    match c {
        '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
        '．' => '.',
        '－' => '-',
        _ => c,
    }
}
