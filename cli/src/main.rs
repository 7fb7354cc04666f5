//! piimask CLI - Korean PII detection and masking tool
//!
//! A command-line tool for filtering, masking and writing back PII found in
//! extracted document records.

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use piimask::{
    apply_file, classify, filter_file, mask, mask_file, normalize, run_batch, ApplyOptions,
    BatchOptions, Context, DedupeMode, DocumentStatus, FilterOptions, MaskOptions, OutputMode,
    PiiType, SourceType, VerifyMode,
};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Korean PII detection and masking for extracted document records
#[derive(Parser)]
#[command(
    name = "piimask",
    author = "iyulab",
    version,
    about = "Detect and mask Korean PII in extracted document records",
    long_about = "piimask - Korean PII detection and masking tool.\n\n\
                  Filters extracted records down to personal information, masks them,\n\
                  and writes the masks back onto the source workbook.\n\n\
                  Usage:\n  \
                  piimask filter <file.intermediate.jsonl>   Keep PII records\n  \
                  piimask mask <file.pii.jsonl>              Mask PII records\n  \
                  piimask apply <book.xlsx> <masked.jsonl>   Write masks into a workbook\n  \
                  piimask run <dir>...                       Whole pipeline over many files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep only records classified as PII
    Filter {
        /// Extracted record file (.jsonl or .csv)
        input: PathBuf,

        /// Output prefix (default: input without extension and .intermediate)
        #[arg(long)]
        out_prefix: Option<String>,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Mask PII records
    Mask {
        /// PII record file (.jsonl or .csv)
        input: PathBuf,

        /// Output prefix (default: input without extension and .pii)
        #[arg(long)]
        out_prefix: Option<String>,

        #[command(flatten)]
        mask: MaskArgs,
    },

    /// Write masked values back onto an XLSX workbook
    Apply {
        /// Source workbook
        xlsx: PathBuf,

        /// Masked record file (.jsonl or .csv)
        masked: PathBuf,

        /// Output workbook (default: <stem>_masked.xlsx)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Always check the current cell value before overwriting
        #[arg(long, conflicts_with = "no_verify")]
        verify: bool,

        /// Never check the current cell value
        #[arg(long)]
        no_verify: bool,

        /// Overwrite without verification
        #[arg(long)]
        force: bool,

        /// Count changes without writing a workbook
        #[arg(long)]
        dry_run: bool,
    },

    /// Run filter, mask and optional write-back over files and directories
    Run {
        /// Record files or directories containing *.intermediate.{jsonl,csv}
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Worker threads (0 = one per CPU)
        #[arg(short, long, default_value = "0")]
        jobs: usize,

        /// Stop at the first failing document
        #[arg(long)]
        stop_on_error: bool,

        /// Apply masks to the source workbooks named in the records
        #[arg(long)]
        write_back: bool,

        /// Directory for all outputs (default: beside each input)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        mask: MaskArgs,
    },

    /// Classify and mask a single value
    Classify {
        /// Value to classify
        text: String,

        /// Column or field label
        #[arg(long, default_value = "")]
        header: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

/// Filter stage options
#[derive(Args)]
struct FilterArgs {
    /// Join PDF text tokens into lines before filtering
    #[arg(long)]
    aggregate_lines: bool,

    /// Vertical tolerance for line joining
    #[arg(long, default_value = "2.0")]
    line_y_tol: f64,

    /// Deduplication policy
    #[arg(long, default_value = "by_location")]
    dedupe: DedupeArg,

    /// Disable the exact-header fallback
    #[arg(long)]
    no_header_fallback: bool,

    /// Write dropped records to <prefix>.pii_dropped.jsonl
    #[arg(long)]
    debug_drops: bool,
}

impl From<&FilterArgs> for FilterOptions {
    fn from(args: &FilterArgs) -> Self {
        let mut options = FilterOptions::new().with_dedupe(args.dedupe.into());
        if args.aggregate_lines {
            options = options.with_line_aggregation(args.line_y_tol);
        }
        if args.no_header_fallback {
            options = options.without_header_fallback();
        }
        if args.debug_drops {
            options = options.with_debug_drops();
        }
        options
    }
}

/// Mask stage options
#[derive(Args)]
struct MaskArgs {
    /// Categories to mask: "all" or a comma-separated list
    #[arg(long, default_value = "all")]
    types: String,

    /// Masked output shape
    #[arg(long, default_value = "both")]
    output: OutputArg,
}

impl MaskArgs {
    fn to_options(&self) -> piimask::Result<MaskOptions> {
        Ok(MaskOptions::new()
            .with_type_selector(&self.types)?
            .with_output(self.output.into()))
    }
}

/// Deduplication policy
#[derive(Clone, Copy, ValueEnum)]
#[value(rename_all = "snake_case")]
enum DedupeArg {
    /// Keep every record
    None,
    /// One record per id
    ById,
    /// One record per cell and category
    ByLocation,
    /// One record per normalized text
    ByText,
}

impl From<DedupeArg> for DedupeMode {
    fn from(arg: DedupeArg) -> Self {
        match arg {
            DedupeArg::None => DedupeMode::None,
            DedupeArg::ById => DedupeMode::ById,
            DedupeArg::ByLocation => DedupeMode::ByLocation,
            DedupeArg::ByText => DedupeMode::ByText,
        }
    }
}

/// Masked output shape
#[derive(Clone, Copy, ValueEnum)]
#[value(rename_all = "snake_case")]
enum OutputArg {
    /// Original text plus masked_text
    Both,
    /// masked_text only
    MaskedOnly,
    /// text replaced by the mask
    Replace,
}

impl From<OutputArg> for OutputMode {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Both => OutputMode::Both,
            OutputArg::MaskedOnly => OutputMode::MaskedOnly,
            OutputArg::Replace => OutputMode::Replace,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins; otherwise `-v` raises the default warn level.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Filter {
            input,
            out_prefix,
            filter,
        } => {
            let options = FilterOptions::from(&filter);
            debug!(?options, input = %input.display(), "filter");
            let pb = create_spinner("Filtering records...");
            let outcome = filter_file(&input, out_prefix.as_deref(), &options)?;
            pb.finish_and_clear();

            println!(
                "{} {} PII records from {}",
                "✓".green().bold(),
                outcome.records.len(),
                input.display()
            );
            if !outcome.dropped.is_empty() {
                println!("  {} {} dropped", "!".yellow(), outcome.dropped.len());
            }
        }

        Commands::Mask {
            input,
            out_prefix,
            mask,
        } => {
            let options = mask.to_options()?;
            debug!(?options, input = %input.display(), "mask");
            let pb = create_spinner("Masking records...");
            let masked = mask_file(&input, out_prefix.as_deref(), &options)?;
            pb.finish_and_clear();

            println!(
                "{} Masked {} records ({})",
                "✓".green().bold(),
                masked.len(),
                options.output
            );
        }

        Commands::Apply {
            xlsx,
            masked,
            out,
            verify,
            no_verify,
            force,
            dry_run,
        } => {
            let options = apply_options(verify, no_verify, force, dry_run, out);
            debug!(?options, xlsx = %xlsx.display(), "apply");
            let pb = create_spinner("Applying masks...");
            let report = apply_file(&xlsx, &masked, &options)?;
            pb.finish_and_clear();

            println!("{}", "Write-back".cyan().bold());
            println!("{}", "─".repeat(40));
            println!("{}: {}", "Total".bold(), report.total);
            println!("{}: {}", "Applied".bold(), report.applied);
            println!("{}: {}", "Skipped".bold(), report.skipped);
            match &report.output {
                Some(path) => println!("{} {}", "✓".green().bold(), path.display()),
                None => println!("{} Dry run, nothing written", "!".yellow().bold()),
            }
        }

        Commands::Run {
            inputs,
            jobs,
            stop_on_error,
            write_back,
            out_dir,
            filter,
            mask,
        } => {
            let mut options = BatchOptions::new()
                .with_filter(FilterOptions::from(&filter))
                .with_mask(mask.to_options()?)
                .with_jobs(jobs);
            if stop_on_error {
                options = options.stop_on_error();
            }
            if write_back {
                options = options.with_write_back(ApplyOptions::new());
            }
            if let Some(dir) = out_dir {
                options = options.with_out_dir(dir);
            }

            debug!(?options, inputs = inputs.len(), "run");
            let pb = create_spinner("Processing documents...");
            let report = run_batch(&inputs, &options)?;
            pb.finish_and_clear();

            for outcome in &report.outcomes {
                print_outcome(&outcome.path, &outcome.status);
            }

            println!("\n{}", "Summary".cyan().bold());
            println!("{}", "─".repeat(40));
            println!("{}: {}", "Completed".bold(), report.completed());
            println!("{}: {}", "Failed".bold(), report.failed());
            if report.skipped() > 0 {
                println!("{}: {}", "Skipped".bold(), report.skipped());
            }

            if report.failed() > 0 {
                let report = report.into_result()?;
                return Err(format!("{} document(s) failed", report.failed()).into());
            }
        }

        Commands::Classify { text, header, json } => {
            let (normalized, pii_type, masked) = classify_value(&text, &header);

            if json {
                let value = serde_json::json!({
                    "text": text,
                    "normalized": normalized,
                    "header": header,
                    "pii_type": pii_type,
                    "masked": masked,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                match (pii_type, masked) {
                    (Some(t), Some(m)) => {
                        println!("{}: {}", "Type".bold(), t.as_str().green());
                        println!("{}: {}", "Masked".bold(), m);
                    }
                    _ => println!("{} Not PII", "-".dimmed()),
                }
            }
        }

        Commands::Version => {
            print_version();
        }
    }

    Ok(())
}

/// Classifies a value and masks its normalized form, as the pipeline does.
fn classify_value(text: &str, header: &str) -> (String, Option<PiiType>, Option<String>) {
    let ctx = Context::with_header(header, SourceType::Xlsx);
    let normalized = normalize(text);
    let pii_type = classify(&normalized, &ctx);
    let masked = pii_type.map(|t| mask(t, &normalized));
    (normalized, pii_type, masked)
}

fn apply_options(
    verify: bool,
    no_verify: bool,
    force: bool,
    dry_run: bool,
    out: Option<PathBuf>,
) -> ApplyOptions {
    let mode = match (verify, no_verify) {
        (true, _) => VerifyMode::On,
        (_, true) => VerifyMode::Off,
        _ => VerifyMode::Auto,
    };
    let mut options = ApplyOptions::new().with_verify(mode);
    if force {
        options = options.force();
    }
    if dry_run {
        options = options.dry_run();
    }
    if let Some(path) = out {
        options = options.with_out_path(path);
    }
    options
}

fn print_outcome(path: &Path, status: &DocumentStatus) {
    match status {
        DocumentStatus::Completed(report) => {
            println!(
                "  {} {} ({} PII, {} dropped)",
                "✓".green(),
                path.display(),
                report.pii,
                report.dropped
            );
            if report.identity_mismatch {
                println!("    {} record ids changed during masking", "!".yellow());
            }
            for (workbook, applied) in &report.write_back {
                println!(
                    "    {} {}: {}/{} cells",
                    "→".blue(),
                    workbook.display(),
                    applied.applied,
                    applied.total
                );
            }
        }
        DocumentStatus::Failed { trace, .. } => {
            println!("  {} {}", "✗".red(), path.display());
            for line in trace {
                println!("    {}", line.dimmed());
            }
        }
        DocumentStatus::Skipped => {
            println!("  {} {} (skipped)", "-".dimmed(), path.display());
        }
    }
}

fn print_version() {
    println!("{} {}", "piimask".green().bold(), env!("CARGO_PKG_VERSION"));
    println!("Korean PII detection and masking for extracted document records");
    println!();
    println!("Categories: name, rrn, phone, email, address, card, passport, driver_license");
    println!("Repository: https://github.com/iyulab/piimask");
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.blue} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_args_map_to_options() {
        let cli = Cli::try_parse_from([
            "piimask",
            "run",
            "data",
            "--jobs",
            "4",
            "--dedupe",
            "by_text",
            "--aggregate-lines",
            "--output",
            "masked_only",
            "--types",
            "phone,email",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                inputs,
                jobs,
                filter,
                mask,
                ..
            } => {
                assert_eq!(inputs, vec![PathBuf::from("data")]);
                assert_eq!(jobs, 4);
                let filter = FilterOptions::from(&filter);
                assert_eq!(filter.dedupe, DedupeMode::ByText);
                assert!(filter.aggregate_lines);
                let mask = mask.to_options().unwrap();
                assert_eq!(mask.output, OutputMode::MaskedOnly);
                assert_eq!(mask.enabled.len(), 2);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_selectors_use_snake_case() {
        let cli = Cli::try_parse_from(["piimask", "filter", "a.intermediate.jsonl", "--dedupe", "by_location"]);
        assert!(cli.is_ok());
        let cli = Cli::try_parse_from(["piimask", "filter", "a.intermediate.jsonl", "--dedupe", "by_id"]);
        assert!(cli.is_ok());
        let cli = Cli::try_parse_from(["piimask", "mask", "a.pii.jsonl", "--output", "masked_only"]);
        assert!(cli.is_ok());
        assert!(Cli::try_parse_from(["piimask", "mask", "a.pii.jsonl", "--output", "masked-only"]).is_err());

        match Cli::try_parse_from(["piimask", "filter", "a.intermediate.jsonl"]).unwrap().command {
            Commands::Filter { filter, .. } => {
                assert_eq!(FilterOptions::from(&filter).dedupe, DedupeMode::ByLocation)
            }
            _ => panic!("expected filter"),
        }
    }

    #[test]
    fn test_classify_masks_normalized_value() {
        let (normalized, pii_type, masked) = classify_value("010\u{2013}1234\u{200B}-5678", "연락처");
        assert_eq!(normalized, "010-1234-5678");
        assert_eq!(pii_type, Some(PiiType::Phone));
        assert_eq!(masked.as_deref(), Some("010-****-5678"));

        let (_, pii_type, masked) = classify_value("영업팀", "부서");
        assert!(pii_type.is_none());
        assert!(masked.is_none());
    }

    #[test]
    fn test_verify_flags_conflict() {
        assert!(Cli::try_parse_from(["piimask", "apply", "a.xlsx", "b.jsonl", "--verify", "--no-verify"]).is_err());

        let options = apply_options(false, true, false, true, None);
        assert_eq!(options.verify, VerifyMode::Off);
        assert!(options.dry_run);
    }
}
