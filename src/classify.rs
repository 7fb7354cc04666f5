//! # PII Classifier
//!
//! Maps a value and its context to one of eight PII categories using an
//! ordered cascade of pattern rules and header-label hints.
//!
//! ## Cascade
//!
//! 1. **Email** - address pattern, or email header + `@`
//! 2. **Phone** - domestic/international mobile, or phone header + 8-15 digits
//! 3. **RRN** - `NNNNNN-?NNNNNNN`
//! 4. **Card** - 4-4-4-4 or 4-6-5 groups, or card header + 12-19 digits
//! 5. **Passport** - 1-2 uppercase letters + 7-8 digits, or passport header
//! 6. **Driver license** - `NN-NN-NNNNNN-NN`, or license header + 12 digits
//! 7. **Address** - address header, or region + district + street tokens
//! 8. **Name** - name header + 2-4 Hangul syllables outside the blacklist
//!
//! The first satisfied rule wins. Overlapping shapes (a digit run that could
//! be both a phone fragment and a card fragment) resolve by this order, so it
//! must not change.

use crate::model::{Context, PiiType};
use crate::normalize::normalize;
use regex::Regex;
use std::sync::LazyLock;

// ============================================================================
// Patterns
// ============================================================================

// Digit-boundary guards are written as consuming `(?:^|[^0-9])` / `(?:[^0-9]|$)`
// groups; only existence is tested, so this is equivalent to lookaround.

static RE_EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b[A-Z0-9._%+-]+@[A-Z0-9.-]+\.[A-Z]{2,}\b").unwrap());

static RE_KR_PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9])01[016789][-\s]?[0-9]{3,4}[-\s]?[0-9]{4}(?:[^0-9]|$)").unwrap()
});

static RE_INTL_PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:^|[^0-9])(?:\+82|00\s?82)[-\s]?1[016789][-\s]?[0-9]{3,4}[-\s]?[0-9]{4}(?:[^0-9]|$)",
    )
    .unwrap()
});

static RE_E164_PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^0-9])\+?[0-9]{8,15}(?:[^0-9]|$)").unwrap());

static RE_RRN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^0-9])[0-9]{6}-?[0-9]{7}(?:[^0-9]|$)").unwrap());

static RE_CARD_16: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9])[0-9]{4}[-\s]?[0-9]{4}[-\s]?[0-9]{4}[-\s]?[0-9]{4}(?:[^0-9]|$)")
        .unwrap()
});

static RE_CARD_4_6_5: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9])[0-9]{4}[-\s]?[0-9]{6}[-\s]?[0-9]{5}(?:[^0-9]|$)").unwrap()
});

static RE_PASSPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{1,2}[0-9]{7,8}\b").unwrap());

static RE_PASSPORT_LOOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z].*[0-9]").unwrap());

static RE_DL_HYPHEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[^0-9])[0-9]{2}-[0-9]{2}-[0-9]{6}-[0-9]{2}(?:[^0-9]|$)").unwrap()
});

static RE_DL_12_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[^0-9])[0-9]{12}(?:[^0-9]|$)").unwrap());

static RE_ADDR_REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"대한민국|서울|부산|대구|인천|광주|대전|울산|세종|경기|강원|충북|충남|전북|전남|경북|경남|제주",
    )
    .unwrap()
});

static RE_HANGUL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[가-힣]{2,4}$").unwrap());

/// Administrative units (city / county / district)
const ADDR_ADMIN_UNITS: &[&str] = &["시", "군", "구"];

/// Finer-grained units (neighbourhood, town, road, street)
const ADDR_LOCAL_UNITS: &[&str] = &["동", "읍", "면", "리", "로", "길", "번길"];

// ============================================================================
// Header labels
// ============================================================================

/// Header labels (case-insensitive substring match)
pub mod labels {
    pub const NAME: &[&str] = &["이름", "성명", "성 명", "name", "full name"];
    pub const EMAIL: &[&str] = &["이메일", "email", "e-mail"];
    pub const PHONE: &[&str] = &["연락처", "전화", "휴대폰", "phone", "tel"];
    pub const ADDRESS: &[&str] = &["주소", "address"];
    pub const PASSPORT: &[&str] = &["여권", "passport"];
    pub const DRIVER_LICENSE: &[&str] = &["운전면허", "driver", "dl"];
    pub const CARD: &[&str] = &["카드", "신용카드", "card", "pan"];
}

/// Payroll/insurance vocabulary that disqualifies a name candidate
pub const NON_NAME_HINTS: &[&str] = &[
    "급여", "항목", "세", "보험", "수당", "지원", "금", "연금", "합계", "공제", "지급", "식대", "직위",
    "소속",
];

fn has_label(ctx: &Context<'_>, labels: &[&str]) -> bool {
    let header = ctx.header.to_lowercase();
    labels.iter().any(|label| header.contains(&label.to_lowercase()))
}

fn digit_count(s: &str) -> usize {
    s.chars().filter(|c| c.is_ascii_digit()).count()
}

// ============================================================================
// Rules
// ============================================================================

/// A cascade step: returns its category when the value satisfies it.
pub type Rule = fn(&str, &Context<'_>) -> Option<PiiType>;

fn rule_email(s: &str, ctx: &Context<'_>) -> Option<PiiType> {
    (RE_EMAIL.is_match(s) || (has_label(ctx, labels::EMAIL) && s.contains('@')))
        .then_some(PiiType::Email)
}

fn rule_phone(s: &str, ctx: &Context<'_>) -> Option<PiiType> {
    if RE_KR_PHONE.is_match(s) || RE_INTL_PHONE.is_match(s) {
        return Some(PiiType::Phone);
    }
    (has_label(ctx, labels::PHONE) && RE_E164_PHONE.is_match(s)).then_some(PiiType::Phone)
}

fn rule_rrn(s: &str, _ctx: &Context<'_>) -> Option<PiiType> {
    RE_RRN.is_match(s).then_some(PiiType::Rrn)
}

fn rule_card(s: &str, ctx: &Context<'_>) -> Option<PiiType> {
    if RE_CARD_16.is_match(s) || RE_CARD_4_6_5.is_match(s) {
        return Some(PiiType::Card);
    }
    let loose = has_label(ctx, labels::CARD) && (12..=19).contains(&digit_count(s));
    loose.then_some(PiiType::Card)
}

fn rule_passport(s: &str, ctx: &Context<'_>) -> Option<PiiType> {
    if RE_PASSPORT.is_match(s) {
        return Some(PiiType::Passport);
    }
    (has_label(ctx, labels::PASSPORT) && RE_PASSPORT_LOOSE.is_match(s)).then_some(PiiType::Passport)
}

fn rule_driver_license(s: &str, ctx: &Context<'_>) -> Option<PiiType> {
    if RE_DL_HYPHEN.is_match(s) {
        return Some(PiiType::DriverLicense);
    }
    (has_label(ctx, labels::DRIVER_LICENSE) && RE_DL_12_DIGITS.is_match(s))
        .then_some(PiiType::DriverLicense)
}

fn rule_address(s: &str, ctx: &Context<'_>) -> Option<PiiType> {
    if has_label(ctx, labels::ADDRESS) {
        return Some(PiiType::Address);
    }
    let has_admin = ADDR_ADMIN_UNITS.iter().any(|u| s.contains(u));
    let has_local = ADDR_LOCAL_UNITS.iter().any(|u| s.contains(u));
    (RE_ADDR_REGION.is_match(s) && has_admin && has_local).then_some(PiiType::Address)
}

fn rule_name(s: &str, ctx: &Context<'_>) -> Option<PiiType> {
    if !has_label(ctx, labels::NAME) {
        return None;
    }
    if NON_NAME_HINTS.iter().any(|hint| s.contains(hint)) {
        return None;
    }
    RE_HANGUL_NAME.is_match(s).then_some(PiiType::Name)
}

/// The cascade, highest priority first.
pub const CASCADE: &[Rule] = &[
    rule_email,
    rule_phone,
    rule_rrn,
    rule_card,
    rule_passport,
    rule_driver_license,
    rule_address,
    rule_name,
];

/// Classify a value.
///
/// The text is normalized first; an empty value never matches.
///
/// # Example
///
/// ```
/// use piimask::classify::classify;
/// use piimask::model::{Context, PiiType, SourceType};
///
/// let ctx = Context::with_header("연락처", SourceType::Xlsx);
/// assert_eq!(classify("010-1234-5678", &ctx), Some(PiiType::Phone));
/// ```
pub fn classify(text: &str, ctx: &Context<'_>) -> Option<PiiType> {
    let s = normalize(text);
    if s.is_empty() {
        return None;
    }
    CASCADE.iter().find_map(|rule| rule(&s, ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceType;

    fn ctx(header: &str) -> Context<'_> {
        Context::with_header(header, SourceType::PdfText)
    }

    #[test]
    fn test_email() {
        assert_eq!(classify("user@test.co.kr", &ctx("이메일")), Some(PiiType::Email));
        assert_eq!(classify("USER@TEST.COM", &ctx("")), Some(PiiType::Email));
        assert_eq!(classify("someone@intranet", &ctx("E-Mail")), Some(PiiType::Email));
        assert_eq!(classify("someone@intranet", &ctx("")), None);
    }

    #[test]
    fn test_email_beats_phone() {
        let value = "01012345678@carrier.co.kr";
        assert_eq!(classify(value, &ctx("연락처")), Some(PiiType::Email));
    }

    #[test]
    fn test_phone_domestic_and_international() {
        assert_eq!(classify("010-1234-5678", &ctx("")), Some(PiiType::Phone));
        assert_eq!(classify("01012345678", &ctx("")), Some(PiiType::Phone));
        assert_eq!(classify("011 234 5678", &ctx("")), Some(PiiType::Phone));
        assert_eq!(classify("+82 10 1234 5678", &ctx("")), Some(PiiType::Phone));
        assert_eq!(classify("0082-10-1234-5678", &ctx("")), Some(PiiType::Phone));
    }

    #[test]
    fn test_phone_digit_boundary() {
        // Embedded in a longer digit run: not a phone by pattern
        assert_ne!(classify("9010123456789", &ctx("")), Some(PiiType::Phone));
    }

    #[test]
    fn test_phone_loose_requires_header() {
        assert_eq!(classify("+4420712345", &ctx("Tel")), Some(PiiType::Phone));
        assert_eq!(classify("+4420712345", &ctx("")), None);
    }

    #[test]
    fn test_rrn() {
        assert_eq!(classify("900101-1234567", &ctx("")), Some(PiiType::Rrn));
        assert_eq!(classify("9001011234567", &ctx("")), Some(PiiType::Rrn));
        assert_ne!(classify("1900101-1234567", &ctx("")), Some(PiiType::Rrn));
    }

    #[test]
    fn test_card() {
        assert_eq!(classify("4111-1111-1111-1111", &ctx("")), Some(PiiType::Card));
        assert_eq!(classify("4111 1111 1111 1111", &ctx("")), Some(PiiType::Card));
        assert_eq!(classify("3782-822463-10005", &ctx("")), Some(PiiType::Card));
        assert_eq!(classify("1234.5678.9012.34", &ctx("신용카드")), Some(PiiType::Card));
        assert_eq!(classify("카드번호", &ctx("신용카드")), None);
    }

    #[test]
    fn test_passport() {
        assert_eq!(classify("M1234567", &ctx("")), Some(PiiType::Passport));
        assert_eq!(classify("AB12345678", &ctx("")), Some(PiiType::Passport));
        assert_eq!(classify("M12-34", &ctx("여권번호")), Some(PiiType::Passport));
        assert_eq!(classify("m1234567", &ctx("")), None);
    }

    #[test]
    fn test_driver_license() {
        assert_eq!(classify("12-34-567890-12", &ctx("")), Some(PiiType::DriverLicense));
        assert_eq!(classify("123456789012", &ctx("운전면허")), Some(PiiType::DriverLicense));
        // Without a label a bare 12-digit run is not a license
        assert_eq!(classify("123456789012", &ctx("")), None);
    }

    #[test]
    fn test_address() {
        assert_eq!(
            classify("서울특별시 강남구 테헤란로 123", &ctx("주소")),
            Some(PiiType::Address)
        );
        assert_eq!(
            classify("대한민국 서울시 강남구 역삼동 123-45", &ctx("")),
            Some(PiiType::Address)
        );
        // Region token alone is not enough
        assert_eq!(classify("서울 출장", &ctx("")), None);
        // Header always wins for address, even for odd text
        assert_eq!(classify("비고", &ctx("Address")), Some(PiiType::Address));
    }

    #[test]
    fn test_name_requires_header() {
        assert_eq!(classify("홍길동", &Context::with_header("성명", SourceType::Xlsx)), Some(PiiType::Name));
        assert_eq!(classify("홍길동", &ctx("")), None);
        assert_eq!(classify("홍길동", &ctx("Full Name")), Some(PiiType::Name));
    }

    #[test]
    fn test_name_guard_payroll_vocabulary() {
        let payroll = Context::with_header("지급항목", SourceType::PdfTable);
        assert_eq!(classify("기본급여", &payroll), None);
        assert_eq!(classify("건강보험", &Context::with_header("공제항목", SourceType::PdfTable)), None);
        // Blacklisted even under a name header
        assert_eq!(classify("기본급여", &ctx("이름")), None);
    }

    #[test]
    fn test_name_shape() {
        assert_eq!(classify("홍", &ctx("이름")), None);
        assert_eq!(classify("남궁민수철", &ctx("이름")), None);
        assert_eq!(classify("Hong", &ctx("이름")), None);
    }

    #[test]
    fn test_normalizes_before_matching() {
        assert_eq!(classify("010\u{2013}1234\u{200B}\u{2013}5678", &ctx("")), Some(PiiType::Phone));
        assert_eq!(classify(" \u{200B} ", &ctx("이름")), None);
    }

    #[test]
    fn test_cascade_order_phone_before_card() {
        // 16 digits starting with a mobile prefix still reads as a card only
        // when the phone pattern fails its digit boundary
        assert_eq!(classify("0101-2345-6789-0123", &ctx("")), Some(PiiType::Card));
        assert_eq!(classify("010-1234-5678", &ctx("카드")), Some(PiiType::Phone));
    }
}
