use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sqlembed::mode::Mode;
use sqlembed::region::DocumentKind;
use sqlembed::report::{FileStatus, Report};

/// sqlembed - An opinionated formatter for BigQuery SQL embedded in
/// Python sources and notebooks.
#[derive(Parser, Debug)]
#[command(name = "sqlembed", version, about)]
struct Cli {
    /// Files or directories to format. Use "-" to read from stdin.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Check formatting without writing changes.
    #[arg(long)]
    check: bool,

    /// Show formatting diff.
    #[arg(long)]
    diff: bool,

    /// Glob patterns to exclude.
    #[arg(long)]
    exclude: Vec<String>,

    /// Path to config file (pyproject.toml or sqlembed.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQL dialect.
    #[arg(short = 'd', long)]
    dialect: Option<String>,

    /// Keyword casing: upper, lower or preserve.
    #[arg(long)]
    keyword_case: Option<String>,

    /// Width of one indentation step.
    #[arg(long)]
    tab_width: Option<usize>,

    /// Blank lines between statements.
    #[arg(long)]
    lines_between_queries: Option<usize>,

    /// How to read stdin: sql, python or notebook.
    #[arg(long, default_value = "sql")]
    stdin_kind: String,

    /// Treat stdin as an editor selection; non-SQL text is echoed unchanged.
    #[arg(long)]
    selection: bool,

    /// Verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only).
    #[arg(short, long)]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long)]
    no_progressbar: bool,

    /// Force color output.
    #[arg(long)]
    force_color: bool,

    /// Disable color output.
    #[arg(long)]
    no_color: bool,

    /// Number of threads for parallel processing (0 = all cores).
    #[arg(short = 't', long, default_value_t = 0)]
    threads: usize,

    /// Disable multi-threaded processing.
    #[arg(long)]
    single_process: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match try_main(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "sqlembed=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("SQLEMBED_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn try_main(cli: Cli) -> anyhow::Result<ExitCode> {
    let is_stdin = cli.files.len() == 1 && cli.files[0].to_string_lossy() == "-";
    let mode = build_mode(&cli)?;

    if is_stdin {
        let mut source = String::new();
        io::stdin()
            .read_to_string(&mut source)
            .context("reading stdin")?;
        return format_stdin(&source, &cli, &mode);
    }

    let report = sqlembed::run(&cli.files, &mode);

    if !mode.quiet {
        print_verbose_results(&report, &mode);
        eprintln!("{}", report.summary());
    }

    report.print_errors();

    Ok(if report.has_errors() {
        ExitCode::from(2)
    } else if mode.check && report.has_changes() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

/// Config file values, overridden by whatever was given on the command line.
fn build_mode(cli: &Cli) -> anyhow::Result<Mode> {
    let base = sqlembed::load_config(&cli.files, cli.config.as_deref())
        .context("loading configuration")?;

    let mut format = base.format;
    if let Some(dialect) = &cli.dialect {
        format.dialect_name = dialect.clone();
        format.dialect()?;
    }
    if let Some(case) = &cli.keyword_case {
        format.keyword_case = case.parse()?;
    }
    if let Some(width) = cli.tab_width {
        anyhow::ensure!(width > 0, "--tab-width must be positive");
        format.tab_width = width;
    }
    if let Some(lines) = cli.lines_between_queries {
        format.lines_between_queries = lines;
    }

    Ok(Mode {
        format,
        check: cli.check,
        diff: cli.diff,
        exclude: if cli.exclude.is_empty() {
            base.exclude
        } else {
            cli.exclude.clone()
        },
        verbose: cli.verbose,
        quiet: cli.quiet,
        no_progressbar: cli.no_progressbar,
        no_color: cli.no_color,
        force_color: cli.force_color,
        threads: cli.threads,
        single_process: cli.single_process,
    })
}

fn format_stdin(source: &str, cli: &Cli, mode: &Mode) -> anyhow::Result<ExitCode> {
    if cli.selection {
        let formatted = sqlembed::format_selection(source, mode)?;
        print!("{}", formatted.as_deref().unwrap_or(source));
        return Ok(ExitCode::SUCCESS);
    }

    let kind: DocumentKind = cli.stdin_kind.parse().map_err(anyhow::Error::msg)?;
    let outcome = sqlembed::format_document(source, kind, mode)?;
    print!("{}", outcome.text);

    for failure in &outcome.failures {
        eprintln!("error: <stdin>: {}", failure);
    }
    Ok(if !outcome.failures.is_empty() {
        ExitCode::from(2)
    } else if mode.check && outcome.text != source {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

fn print_verbose_results(report: &Report, mode: &Mode) {
    if !mode.verbose {
        return;
    }
    for result in &report.results {
        match result.status {
            FileStatus::Changed => {
                eprintln!(
                    "reformatted {} ({} SQL block(s))",
                    result.path.display(),
                    result.spans
                );
            }
            FileStatus::Error => {
                eprintln!(
                    "error: {}: {}",
                    result.path.display(),
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }
            FileStatus::Unchanged => {}
        }
    }
    eprintln!("{} SQL block(s) found", report.spans());
}
