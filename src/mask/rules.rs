//! Per-category masking rules.
//!
//! Every rule is total: input that does not fit the expected shape falls back
//! to a digit-oriented mask instead of failing. Rules work on the trimmed
//! value, except phone masking which keeps the original layout untouched.

use crate::model::PiiType;
use regex::Regex;
use std::sync::LazyLock;

const MASK_CHAR: char = '*';

static RE_DL_FULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{2})-([0-9]{2})-([0-9]{6})-([0-9]{2})$").unwrap());

static RE_RRN_FULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{6})-?([0-9])([0-9]{6})$").unwrap());

static RE_CARD_16_FULL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]{4})[-\s]?([0-9]{4})[-\s]?([0-9]{4})[-\s]?([0-9]{4})$").unwrap()
});

static RE_CARD_4_6_5_FULL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{4})[-\s]?([0-9]{6})[-\s]?([0-9]{5})$").unwrap());

/// Address segment separators, kept verbatim in the output.
const ADDRESS_SEPARATORS: &[char] = &[',', ';', '/'];

/// Suffixes of city, county and district tokens.
const ADMIN_SUFFIXES: &[char] = &['시', '군', '구'];

/// Masks a value of the given category.
pub fn mask(pii_type: PiiType, text: &str) -> String {
    match pii_type {
        PiiType::Name => mask_name(text),
        PiiType::Passport => mask_passport(text),
        PiiType::DriverLicense => mask_driver_license(text),
        PiiType::Rrn => mask_rrn(text),
        PiiType::Address => mask_address(text),
        PiiType::Email => mask_email(text),
        PiiType::Phone => mask_phone(text),
        PiiType::Card => mask_card(text),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn is_digit(c: char) -> bool {
    c.is_numeric()
}

fn is_hangul_syllable(c: char) -> bool {
    ('가'..='힣').contains(&c)
}

fn stars(n: usize) -> String {
    MASK_CHAR.to_string().repeat(n)
}

/// Keeps the first `keep` characters and stars the rest.
fn keep_prefix(s: &str, keep: usize) -> String {
    let len = s.chars().count();
    if len <= keep {
        return s.to_string();
    }
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(&stars(len - keep));
    out
}

/// Stars every digit except the last `keep`; other characters untouched.
fn mask_digits_keep_last(s: &str, keep: usize) -> String {
    let total = s.chars().filter(|&c| is_digit(c)).count();
    let hide = total.saturating_sub(keep);
    let mut seen = 0;
    s.chars()
        .map(|c| {
            if !is_digit(c) {
                return c;
            }
            seen += 1;
            if seen <= hide {
                MASK_CHAR
            } else {
                c
            }
        })
        .collect()
}

/// Keeps the first `keep` digits and stars the remaining ones.
fn mask_digits_keep_first(s: &str, keep: usize) -> String {
    let mut kept = 0;
    s.chars()
        .map(|c| {
            if !is_digit(c) {
                return c;
            }
            if kept < keep {
                kept += 1;
                c
            } else {
                MASK_CHAR
            }
        })
        .collect()
}

// ============================================================================
// Rules
// ============================================================================

/// `홍길동` → `홍*동`, `이몽` → `이*`.
pub fn mask_name(text: &str) -> String {
    let t: Vec<char> = text.trim().chars().collect();
    match t.len() {
        0 | 1 => t.iter().collect(),
        2 => format!("{}{}", t[0], MASK_CHAR),
        n => format!("{}{}{}", t[0], stars(n - 2), t[n - 1]),
    }
}

/// Keeps the first five characters.
pub fn mask_passport(text: &str) -> String {
    keep_prefix(text.trim(), 5)
}

/// `12-34-567890-12` → `12-34-5*****-**`.
pub fn mask_driver_license(text: &str) -> String {
    let t = text.trim();
    if let Some(caps) = RE_DL_FULL.captures(t) {
        let g3_head = &caps[3][..1];
        return format!("{}-{}-{}{}-{}", &caps[1], &caps[2], g3_head, stars(5), stars(2));
    }
    mask_digits_keep_last(t, 3)
}

/// `900101-1234567` → `900101-1******`.
pub fn mask_rrn(text: &str) -> String {
    let t = text.trim();
    if let Some(caps) = RE_RRN_FULL.captures(t) {
        return format!("{}-{}{}", &caps[1], &caps[2], stars(6));
    }
    mask_digits_keep_first(t, 7)
}

/// Keeps everything up to the district; stars digits and Hangul after it.
///
/// The value is split on `,` `;` `/`; separators and the whitespace around
/// them are kept verbatim and each segment is masked on its own.
pub fn mask_address(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(ADDRESS_SEPARATORS) {
        out.push_str(&mask_address_segment(&rest[..pos]));
        let sep_len = rest[pos..].chars().next().map_or(1, char::len_utf8);
        out.push_str(&rest[pos..pos + sep_len]);
        rest = &rest[pos + sep_len..];
    }
    out.push_str(&mask_address_segment(rest));
    out
}

fn mask_address_segment(segment: &str) -> String {
    let core = segment.trim();
    if core.is_empty() {
        return segment.to_string();
    }
    let lead = &segment[..segment.len() - segment.trim_start().len()];
    let trail = &segment[segment.trim_end().len()..];

    let tokens: Vec<&str> = core.split_whitespace().collect();
    let mut admin = tokens
        .iter()
        .enumerate()
        .filter(|(_, tok)| tok.ends_with(ADMIN_SUFFIXES))
        .map(|(i, _)| i);
    let first = admin.next();
    let second = admin.next();

    let start = match (first, second) {
        (_, Some(i)) | (Some(i), None) => i + 1,
        (None, None) => return segment.to_string(),
    };

    let masked: Vec<String> = tokens
        .iter()
        .enumerate()
        .map(|(i, tok)| {
            if i < start {
                return tok.to_string();
            }
            tok.chars()
                .map(|c| if is_digit(c) || is_hangul_syllable(c) { MASK_CHAR } else { c })
                .collect()
        })
        .collect();

    format!("{}{}{}", lead, masked.join(" "), trail)
}

/// Keeps the first two characters of the local part and the whole domain.
pub fn mask_email(text: &str) -> String {
    let t = text.trim();
    match t.split_once('@') {
        Some((local, domain)) => format!("{}@{}", keep_prefix(local, 2), domain),
        None => t.to_string(),
    }
}

/// Keeps the first three and last four digits; separators stay in place.
pub fn mask_phone(text: &str) -> String {
    let total = text.chars().filter(|&c| is_digit(c)).count();
    if total <= 7 {
        return text.to_string();
    }
    let mut index = 0;
    text.chars()
        .map(|c| {
            if !is_digit(c) {
                return c;
            }
            index += 1;
            if index <= 3 || index > total - 4 {
                c
            } else {
                MASK_CHAR
            }
        })
        .collect()
}

/// `4111-1111-1111-1111` → `4111-11**-****-*111`.
pub fn mask_card(text: &str) -> String {
    let t = text.trim();
    if let Some(caps) = RE_CARD_16_FULL.captures(t) {
        return format!(
            "{}-{}**-****-*{}",
            &caps[1],
            &caps[2][..2],
            &caps[4][1..]
        );
    }
    if let Some(caps) = RE_CARD_4_6_5_FULL.captures(t) {
        return format!("{}-{}****-**{}", &caps[1], &caps[2][..2], &caps[3][2..]);
    }
    mask_digits_keep_last(t, 3)
}
