use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::*;
use heurist::analysis::StructuralValidator;
use heurist::emit::{
    Emitter, EmitterConfig, JsonFormatter, ReportEmitter, SourceEmitter, TokenDumpEmitter,
    VerbosityLevel,
};
use heurist::{AnalysisConfig, AnalysisReport, FileInfo, HeuristicAnalyser};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "heurist")]
#[command(about = "Heurist - heuristic scanner and deobfuscator for PHP sources")]
#[command(version = "0.1.0")]
#[command(author = "Gianluca Brigandi <gbrigand@gmail.com>")]
struct Cli {
    /// Log more; repeat for trace output.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse files or directories and report their status.
    Scan {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// JSON analysis configuration.
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        json: bool,

        /// Only print one status line per file.
        #[arg(short, long, conflicts_with = "source")]
        quiet: bool,

        /// Also print token composition and the deobfuscated source.
        #[arg(long)]
        source: bool,

        #[arg(long, value_delimiter = ',', default_value = "php")]
        extensions: Vec<String>,
    },

    /// Print a file after simplification, folding and substitution.
    Deobfuscate {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(long)]
        line_numbers: bool,
    },

    /// Run the structural checks on a file.
    Validate { input: PathBuf },

    /// Dump the token stream of a file.
    Tokens {
        input: PathBuf,

        /// Dump the stream with comments and whitespace stripped.
        #[arg(long)]
        simplified: bool,

        #[arg(long)]
        skip_whitespace: bool,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let colors = !cli.no_color && io::stdout().is_terminal();
    colored::control::set_override(colors);

    match cli.command {
        Commands::Scan {
            paths,
            config,
            json,
            quiet,
            source,
            extensions,
        } => {
            let verbosity = if quiet {
                VerbosityLevel::Quiet
            } else if source {
                VerbosityLevel::Verbose
            } else {
                VerbosityLevel::Normal
            };
            cmd_scan(&paths, config.as_deref(), json, verbosity, colors, &extensions)
        }
        Commands::Deobfuscate {
            input,
            output,
            config,
            line_numbers,
        } => cmd_deobfuscate(&input, output.as_deref(), config.as_deref(), line_numbers),
        Commands::Validate { input } => cmd_validate(&input),
        Commands::Tokens {
            input,
            simplified,
            skip_whitespace,
        } => cmd_tokens(&input, simplified, skip_whitespace),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AnalysisConfig> {
    let Some(path) = path else {
        return Ok(AnalysisConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    AnalysisConfig::from_json(&json).with_context(|| format!("parsing config {}", path.display()))
}

/// Files named directly are always scanned; directories contribute files with a listed extension.
fn collect_files(paths: &[PathBuf], extensions: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let matches = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)));
            if entry.file_type().is_file() && matches {
                files.push(entry.into_path());
            }
        }
    }
    files
}

fn cmd_scan(
    paths: &[PathBuf],
    config: Option<&Path>,
    json: bool,
    verbosity: VerbosityLevel,
    colors: bool,
    extensions: &[String],
) -> Result<ExitCode> {
    let analyser = HeuristicAnalyser::new(load_config(config)?)?;
    let files = collect_files(paths, extensions);
    debug!(count = files.len(), "files to scan");

    let emitter = ReportEmitter::new(EmitterConfig {
        use_colors: colors,
        verbosity,
        ..EmitterConfig::default()
    });
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut reports: Vec<AnalysisReport> = Vec::with_capacity(files.len());
    let mut failed = 0usize;
    for path in &files {
        let report = FileInfo::from_path(path)
            .with_context(|| format!("reading {}", path.display()))
            .and_then(|file| Ok(analyser.analyse(&file)?));
        match report {
            Ok(report) => {
                if !json {
                    let mut context = emitter.context();
                    emitter.emit(&report, &mut out, &mut context)?;
                }
                reports.push(report);
            }
            Err(e) => {
                failed += 1;
                eprintln!("{} {}: {:#}", "error:".bright_red().bold(), path.display(), e);
            }
        }
    }

    let infected = reports.iter().filter(|r| r.is_infected()).count();
    if json {
        JsonFormatter::write(&mut out, &reports)?;
    } else if verbosity.should_print_findings() {
        let summary = format!(
            "Scanned {} file(s): {} infected, {} failed",
            reports.len(),
            infected,
            failed
        );
        if infected > 0 {
            writeln!(out, "\n{}", summary.bright_red().bold())?;
        } else {
            writeln!(out, "\n{}", summary.bright_green())?;
        }
    }

    Ok(if infected > 0 || failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn cmd_deobfuscate(
    input: &Path,
    output: Option<&Path>,
    config: Option<&Path>,
    line_numbers: bool,
) -> Result<ExitCode> {
    let analyser = HeuristicAnalyser::new(load_config(config)?)?;
    let file = FileInfo::from_path(input).with_context(|| format!("reading {}", input.display()))?;

    let Some(stream) = analyser.deobfuscate_stream(&file.text())? else {
        eprintln!("{}", "  No PHP code found in input".yellow());
        return Ok(ExitCode::SUCCESS);
    };

    let emitter = SourceEmitter { line_numbers };
    let source = emitter.emit_to_string(&stream)?;
    match output {
        Some(path) => {
            std::fs::write(path, &source)
                .with_context(|| format!("writing {}", path.display()))?;
            println!(" Deobfuscated source written to {}", path.display());
        }
        None => {
            print!("{}", source);
            if !source.ends_with('\n') {
                println!();
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_validate(input: &Path) -> Result<ExitCode> {
    let file = FileInfo::from_path(input).with_context(|| format!("reading {}", input.display()))?;
    let stream = heurist::tokenize(&file.text())?;

    let mut validator = StructuralValidator::new(&stream);
    let valid = validator.is_valid_code();
    let status = validator.open_tag_status();

    if valid {
        println!("{}", " VALID".bright_green().bold());
        return Ok(ExitCode::SUCCESS);
    }

    println!("{}", " INVALID".bright_red().bold());
    println!("   open tags: {:?}", status);
    for failure in validator.failures() {
        println!("   - {} ({})", failure, failure.name());
    }
    Ok(ExitCode::FAILURE)
}

fn cmd_tokens(input: &Path, simplified: bool, skip_whitespace: bool) -> Result<ExitCode> {
    let file = FileInfo::from_path(input).with_context(|| format!("reading {}", input.display()))?;
    let mut stream = heurist::tokenize(&file.text())?;
    if simplified {
        heurist::analysis::Simplifier::simplify(&mut stream);
    }

    let emitter = TokenDumpEmitter { skip_whitespace };
    print!("{}", emitter.emit_to_string(&stream)?);
    Ok(ExitCode::SUCCESS)
}
