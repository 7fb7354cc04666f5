//! Text normalization applied before every match and mask.
//!
//! - Zero-width characters and BOM are removed
//! - Unicode dash/hyphen variants become ASCII `-`
//! - Whitespace runs collapse to a single space, ends trimmed

/// Check if character is an invisible joiner/separator that should be removed
fn is_zero_width(c: char) -> bool {
    matches!(
        c,
        '\u{200B}'   // Zero-width space
        | '\u{200C}' // Zero-width non-joiner
        | '\u{200D}' // Zero-width joiner
        | '\u{FEFF}' // BOM
        | '\u{2060}' // Word joiner
    )
}

/// Map dash variants (U+2010..=U+2014) to ASCII hyphen
fn normalize_dash(c: char) -> char {
    match c {
        '\u{2010}'..='\u{2014}' => '-',
        _ => c,
    }
}

/// Normalize a raw value.
///
/// # Example
///
/// ```
/// use piimask::normalize::normalize;
///
/// assert_eq!(normalize(" 010\u{2013}1234\u{200B}-5678 \n"), "010-1234-5678");
/// ```
pub fn normalize(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut pending_space = false;

    for c in input.chars() {
        if is_zero_width(c) {
            continue;
        }

        if c.is_whitespace() {
            pending_space = !result.is_empty();
            continue;
        }

        if pending_space {
            result.push(' ');
            pending_space = false;
        }
        result.push(normalize_dash(c));
    }

    result
}
