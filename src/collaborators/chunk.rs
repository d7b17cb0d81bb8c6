//! Fixed-window text chunking with overlap.

use crate::errors::StepError;

/// Splits `text` into windows of at most `max_chars` characters, each
/// overlapping the previous by `overlap` characters.
///
/// Character-based, so multi-byte text never splits inside a code point.
/// `max_chars` must be nonzero and `overlap` strictly smaller than it.
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Result<Vec<String>, StepError> {
    if max_chars == 0 {
        return Err(StepError::Validation("chunk size must be nonzero".into()));
    }
    if overlap >= max_chars {
        return Err(StepError::Validation(format!(
            "overlap {overlap} must be smaller than chunk size {max_chars}"
        )));
    }
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Ok(Vec::new());
    }
    let step = max_chars - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + max_chars).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    Ok(chunks)
}
