//! Masking stage.
//!
//! Turns PII-tagged records into masked records. The stage never adds or
//! removes records: one record out for every record in, whichever categories
//! are enabled. Records whose category is not enabled (or unclassified) pass
//! through with their original text as the masked value.

mod rules;

pub use rules::*;

use crate::error::{Error, Result};
use crate::model::{PiiType, Record};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Shape of the masked output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OutputMode {
    /// Original text plus `masked_text`
    #[default]
    Both,
    /// `masked_text` only; the original text is dropped
    MaskedOnly,
    /// `text` overwritten with the mask; no `masked_text`
    Replace,
}

impl OutputMode {
    /// Returns the option name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Both => "both",
            OutputMode::MaskedOnly => "masked_only",
            OutputMode::Replace => "replace",
        }
    }

    /// Returns the tag used in output file names.
    pub fn file_tag(&self) -> &'static str {
        match self {
            OutputMode::Both => "masked",
            OutputMode::MaskedOnly => "masked_only",
            OutputMode::Replace => "masked_replace",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "both" => Ok(OutputMode::Both),
            "masked_only" => Ok(OutputMode::MaskedOnly),
            "replace" => Ok(OutputMode::Replace),
            other => Err(format!("unknown output mode '{}'", other)),
        }
    }
}

/// Options for the masking stage.
#[derive(Debug, Clone)]
pub struct MaskOptions {
    /// Categories to mask.
    pub enabled: BTreeSet<PiiType>,

    /// Output shape.
    pub output: OutputMode,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self {
            enabled: PiiType::ALL.into_iter().collect(),
            output: OutputMode::Both,
        }
    }
}

impl MaskOptions {
    /// Creates new options masking every category.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts masking to the given categories.
    pub fn with_types(mut self, types: impl IntoIterator<Item = PiiType>) -> Self {
        self.enabled = types.into_iter().collect();
        self
    }

    /// Parses a type selector (`all`, `*` or a comma list) into the enabled set.
    pub fn with_type_selector(mut self, selector: &str) -> Result<Self> {
        self.enabled = parse_types(selector)?;
        Ok(self)
    }

    /// Sets the output shape.
    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// Returns true if the category is masked.
    pub fn is_enabled(&self, pii_type: PiiType) -> bool {
        self.enabled.contains(&pii_type)
    }
}

/// Parses a category selector.
///
/// `all` and `*` select every category; otherwise a comma-separated list of
/// names, unknown names ignored. An empty selection is a configuration error.
pub fn parse_types(selector: &str) -> Result<BTreeSet<PiiType>> {
    let s = selector.trim().to_lowercase();
    let enabled: BTreeSet<PiiType> = if s == "all" || s == "*" {
        PiiType::ALL.into_iter().collect()
    } else {
        s.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .filter_map(|item| item.parse::<PiiType>().ok())
            .collect()
    };

    if enabled.is_empty() {
        return Err(Error::InvalidConfig(format!(
            "no valid PII types in '{}' (expected all or a list of: {})",
            selector,
            PiiType::ALL.map(|t| t.as_str()).join(",")
        )));
    }
    Ok(enabled)
}

/// Masks every record, preserving record count and order.
pub fn mask_records(records: &[Record], options: &MaskOptions) -> Result<Vec<Record>> {
    let mut out = Vec::with_capacity(records.len());
    let mut masked_count = 0usize;

    for record in records {
        let masked = match record.pii_type {
            Some(t) if options.is_enabled(t) => {
                masked_count += 1;
                mask(t, &record.text)
            }
            _ => record.text.clone(),
        };

        let mut o = record.clone();
        match options.output {
            OutputMode::Both => o.masked_text = Some(masked),
            OutputMode::MaskedOnly => {
                o.text = String::new();
                o.masked_text = Some(masked);
            }
            OutputMode::Replace => {
                o.text = masked;
                o.masked_text = None;
            }
        }
        out.push(o);
    }

    if out.len() != records.len() {
        return Err(Error::RowCountMismatch {
            input: records.len(),
            output: out.len(),
        });
    }

    debug!(
        records = out.len(),
        masked = masked_count,
        output = %options.output,
        "masking finished"
    );
    Ok(out)
}

// ============================================================================
// Identity integrity
// ============================================================================

/// Comparison of record identities before and after masking.
#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub input_ids: Vec<String>,
    pub output_ids: Vec<String>,
    /// Input identities absent from the output
    pub missing: Vec<String>,
    /// Output identities absent from the input
    pub extra: Vec<String>,
}

impl IntegrityReport {
    /// Returns true if both sides carry the same identities.
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }
}

/// Compares the identity lists of the masking input and output.
pub fn check_identity(input: &[Record], output: &[Record]) -> IntegrityReport {
    let input_ids: Vec<String> = input.iter().map(Record::identity).collect();
    let output_ids: Vec<String> = output.iter().map(Record::identity).collect();

    let in_set: HashSet<&str> = input_ids.iter().map(String::as_str).collect();
    let out_set: HashSet<&str> = output_ids.iter().map(String::as_str).collect();

    let missing = input_ids
        .iter()
        .filter(|id| !out_set.contains(id.as_str()))
        .cloned()
        .collect();
    let extra = output_ids
        .iter()
        .filter(|id| !in_set.contains(id.as_str()))
        .cloned()
        .collect();

    IntegrityReport {
        input_ids,
        output_ids,
        missing,
        extra,
    }
}

/// Persists identity diagnostics next to `prefix`; returns the written paths.
///
/// Nothing is written when the report is consistent.
pub fn write_identity_debug(prefix: &str, report: &IntegrityReport) -> Result<Vec<PathBuf>> {
    if report.is_consistent() {
        return Ok(Vec::new());
    }

    warn!(
        missing = report.missing.len(),
        extra = report.extra.len(),
        "record identity mismatch after masking"
    );

    let [in_path, out_path, diff_path] = identity_debug_paths(Path::new(prefix));

    fs::write(&in_path, report.input_ids.join("\n"))?;
    fs::write(&out_path, report.output_ids.join("\n"))?;
    fs::write(
        &diff_path,
        format!(
            "[missing_in_out]\n{}\n\n[extra_in_out]\n{}\n",
            report.missing.join("\n"),
            report.extra.join("\n")
        ),
    )?;

    Ok(vec![in_path, out_path, diff_path])
}

/// Debug file paths for `prefix`: input ids, output ids, diff.
pub fn identity_debug_paths(prefix: &Path) -> [PathBuf; 3] {
    let base = prefix.to_string_lossy();
    [
        PathBuf::from(format!("{}.mask_debug_in_ids.txt", base)),
        PathBuf::from(format!("{}.mask_debug_out_ids.txt", base)),
        PathBuf::from(format!("{}.mask_debug_diff.txt", base)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceType;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn rec(id: &str, pii_type: Option<PiiType>, text: &str) -> Record {
        let mut r = Record::new(SourceType::Xlsx, text)
            .with_source_path("/a.xlsx")
            .with_container("Sheet1")
            .with_position(2, 1)
            .with_id(id);
        r.pii_type = pii_type;
        r
    }

    #[test]
    fn test_parse_types() {
        assert_eq!(parse_types("all").unwrap().len(), 8);
        assert_eq!(parse_types(" * ").unwrap().len(), 8);

        let some = parse_types("Name, email,bogus,").unwrap();
        assert_eq!(
            some.into_iter().collect::<Vec<_>>(),
            vec![PiiType::Name, PiiType::Email]
        );

        assert!(matches!(parse_types("bogus"), Err(Error::InvalidConfig(_))));
        assert!(parse_types("").is_err());
    }

    #[test]
    fn test_output_modes() {
        let input = vec![rec("1", Some(PiiType::Phone), "010-1234-5678")];

        let both = mask_records(&input, &MaskOptions::new()).unwrap();
        assert_eq!(both[0].text, "010-1234-5678");
        assert_eq!(both[0].masked_text.as_deref(), Some("010-****-5678"));

        let only = mask_records(&input, &MaskOptions::new().with_output(OutputMode::MaskedOnly))
            .unwrap();
        assert_eq!(only[0].text, "");
        assert_eq!(only[0].masked_text.as_deref(), Some("010-****-5678"));

        let replace =
            mask_records(&input, &MaskOptions::new().with_output(OutputMode::Replace)).unwrap();
        assert_eq!(replace[0].text, "010-****-5678");
        assert!(replace[0].masked_text.is_none());
    }

    #[test]
    fn test_disabled_and_unclassified_pass_through() {
        let input = vec![
            rec("1", Some(PiiType::Name), "홍길동"),
            rec("2", Some(PiiType::Email), "hong@example.com"),
            rec("3", None, "memo"),
        ];
        let opts = MaskOptions::new().with_types([PiiType::Email]);
        let out = mask_records(&input, &opts).unwrap();
        assert_eq!(out[0].masked_text.as_deref(), Some("홍길동"));
        assert_eq!(out[1].masked_text.as_deref(), Some("ho**@example.com"));
        assert_eq!(out[2].masked_text.as_deref(), Some("memo"));
    }

    #[test]
    fn test_row_preservation_random_subsets() {
        let mut rng = StdRng::seed_from_u64(7);
        let samples = [
            (PiiType::Name, "홍길동"),
            (PiiType::Phone, "010-1234-5678"),
            (PiiType::Rrn, "900101-1234567"),
            (PiiType::Card, "4111-1111-1111-1111"),
            (PiiType::Address, "서울특별시 강남구 테헤란로 123"),
            (PiiType::Email, "someone@example.com"),
            (PiiType::Passport, "M12345678"),
            (PiiType::DriverLicense, "12-34-567890-12"),
        ];

        for round in 0..20 {
            let n = rng.gen_range(0..60);
            let input: Vec<Record> = (0..n)
                .map(|i| {
                    let (t, text) = samples[rng.gen_range(0..samples.len())];
                    rec(&format!("{}-{}", round, i), Some(t), text)
                })
                .collect();
            let enabled: Vec<PiiType> = PiiType::ALL
                .into_iter()
                .filter(|_| rng.gen_bool(0.5))
                .collect();
            let opts = MaskOptions::new().with_types(enabled);

            let out = mask_records(&input, &opts).unwrap();
            assert_eq!(out.len(), input.len());
            assert!(check_identity(&input, &out).is_consistent());
        }
    }

    #[test]
    fn test_identity_mismatch_writes_debug_files() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("report").to_string_lossy().to_string();

        let input = vec![rec("a", None, "x"), rec("b", None, "y")];
        let output = vec![rec("a", None, "x"), rec("c", None, "y")];
        let report = check_identity(&input, &output);
        assert_eq!(report.missing, vec!["b".to_string()]);
        assert_eq!(report.extra, vec!["c".to_string()]);

        let written = write_identity_debug(&prefix, &report).unwrap();
        assert_eq!(written.len(), 3);
        assert_eq!(written.as_slice(), identity_debug_paths(Path::new(&prefix)).as_slice());

        let diff = fs::read_to_string(&written[2]).unwrap();
        assert_eq!(diff, "[missing_in_out]\nb\n\n[extra_in_out]\nc\n");
        assert_eq!(fs::read_to_string(&written[0]).unwrap(), "a\nb");
    }

    #[test]
    fn test_consistent_report_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("ok").to_string_lossy().to_string();
        let input = vec![rec("a", None, "x")];
        let report = check_identity(&input, &input);
        assert!(write_identity_debug(&prefix, &report).unwrap().is_empty());
        assert!(!dir.path().join("ok.mask_debug_diff.txt").exists());
    }
}
