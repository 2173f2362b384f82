//! viperview - Terminal UI analyzer for installed Python package sizes
//!
//! Exit codes:
//!   0 - Success
//!   1 - Environment unavailable, export failure, or bad configuration

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use viperview::aggregate::{
    build_snapshot, filter, rank, top_n, PackageRecord, Snapshot, SortKey, Summary,
};
use viperview::config::{Config, DEFAULT_CONFIG_FILE};
use viperview::export::{export_to_path, ExportFormat};
use viperview::scan::ScanWorker;
use viperview::ui::{run_app, App};

#[derive(Parser, Debug)]
#[command(name = "viperview")]
#[command(version)]
#[command(about = "Terminal UI analyzer for installed Python package sizes", long_about = None)]
struct Cli {
    /// Config file (defaults to ./.viperview.toml when present)
    #[arg(short, long, global = true, env = "VIPERVIEW_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Site-packages directory to scan instead of asking the interpreter (repeatable)
    #[arg(long = "site-packages", global = true, value_name = "DIR")]
    site_packages: Vec<PathBuf>,

    /// Python interpreter used to locate site-packages
    #[arg(long, global = true, value_name = "EXE")]
    python: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Write logs to this file (the TUI otherwise discards them)
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Browse packages interactively (default)
    Tui,
    /// Print every package with a summary line
    List {
        /// Only show packages whose name contains this text
        #[arg(short, long)]
        filter: Option<String>,

        /// Row order: discovery, size or name
        #[arg(short, long, default_value_t = SortKey::Discovery)]
        sort: SortKey,
    },
    /// Print the largest packages
    Top {
        /// How many packages to show (defaults to display.top_n)
        #[arg(short = 'n', long = "count")]
        count: Option<usize>,

        /// Only rank packages whose name contains this text
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Write packages to a file
    Export {
        /// Output path
        #[arg(short, long)]
        output: PathBuf,

        /// Output format: csv, json or markdown (inferred from the extension when omitted)
        #[arg(long)]
        format: Option<ExportFormat>,

        /// Only export packages whose name contains this text
        #[arg(short, long)]
        filter: Option<String>,
    },
    /// Write a default .viperview.toml to the current directory
    InitConfig,
    /// Show version information
    Version,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let command = cli.command.unwrap_or(Commands::Tui);
    let interactive = matches!(command, Commands::Tui);
    init_logging(cli.verbose, cli.log_file.as_deref(), interactive)?;

    match command {
        Commands::Version => {
            println!("viperview v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Commands::InitConfig => return handle_init_config(),
        _ => {}
    }

    let mut config = load_config(cli.config.as_deref())?;
    if !cli.site_packages.is_empty() {
        config.environment.site_packages = cli.site_packages;
    }
    if cli.python.is_some() {
        config.environment.python = cli.python;
    }
    debug!("Effective configuration: {:?}", config);

    match command {
        Commands::Tui => run_tui(&config),
        Commands::List { filter: query, sort } => {
            let snapshot = scan(&config)?;
            let mut records = select(&snapshot, query.as_deref());
            sort.apply(&mut records);
            print_records(&records);
            Ok(())
        }
        Commands::Top {
            count,
            filter: query,
        } => {
            let snapshot = scan(&config)?;
            let n = count.unwrap_or(config.display.top_n);
            let ranked = match query.as_deref() {
                Some(q) => rank(&filter(&snapshot, q), n),
                None => top_n(&snapshot, n),
            };
            for (i, record) in ranked.iter().enumerate() {
                println!("{:>3}. {}", i + 1, record);
            }
            Ok(())
        }
        Commands::Export {
            output,
            format,
            filter: query,
        } => {
            let snapshot = scan(&config)?;
            let records = select(&snapshot, query.as_deref());
            let format = format
                .or_else(|| ExportFormat::from_path(&output))
                .unwrap_or_default();
            export_to_path(format, &records, &output)?;
            println!(
                "Exported {} packages to {} ({})",
                records.len(),
                output.display(),
                format
            );
            Ok(())
        }
        Commands::Version | Commands::InitConfig => Ok(()),
    }
}

/// Initialize logging based on verbosity settings.
///
/// `RUST_LOG` takes precedence over `-v`. The TUI owns the terminal, so its
/// logs go to `log_file` or nowhere.
fn init_logging(verbose: u8, log_file: Option<&Path>, interactive: bool) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact();

    let result = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file: {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).try_init()
        }
        None if interactive => builder.with_writer(io::sink).try_init(),
        None => builder.with_writer(io::stderr).try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}

/// Handle `init-config`: generate a default .viperview.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);
    if path.exists() {
        anyhow::bail!(
            "{} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
    }

    std::fs::write(path, Config::default_toml())
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;
    println!("Created {} with default settings.", DEFAULT_CONFIG_FILE);
    Ok(())
}

/// Load configuration from `--config` or the default location.
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            info!("Loading config from {}", path.display());
            Config::load(path)
        }
        None => Ok(Config::load_default()?.unwrap_or_default()),
    }
}

/// Run one aggregation pass against the configured environment.
fn scan(config: &Config) -> Result<Snapshot> {
    let snapshot = build_snapshot(config.registry().as_ref())?;

    if !snapshot.failures().is_empty() {
        for failure in snapshot.failures() {
            debug!("Unreadable: {}", failure);
        }
        eprintln!(
            "Note: {} entries could not be read and were counted as 0 bytes (-v for details)",
            snapshot.failures().len()
        );
    }
    Ok(snapshot)
}

/// Records matching `query`, or all of them.
fn select(snapshot: &Snapshot, query: Option<&str>) -> Vec<PackageRecord> {
    match query {
        Some(q) => filter(snapshot, q),
        None => snapshot.records().to_vec(),
    }
}

fn print_records(records: &[PackageRecord]) {
    let name_width = records
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Package".len());
    let version_width = records
        .iter()
        .map(|r| r.version.chars().count())
        .max()
        .unwrap_or(0)
        .max("Version".len());

    println!(
        "{:<nw$}  {:<vw$}  {:>10}  Location",
        "Package",
        "Version",
        "Size",
        nw = name_width,
        vw = version_width
    );
    for record in records {
        println!(
            "{:<nw$}  {:<vw$}  {:>10}  {}",
            record.name,
            record.version,
            record.pretty_size(),
            record.location.display(),
            nw = name_width,
            vw = version_width
        );
    }
    println!();
    println!("{}", Summary::of(records));
}

/// Run the interactive TUI until the user quits.
fn run_tui(config: &Config) -> Result<()> {
    let mut worker = ScanWorker::new(Arc::from(config.registry()));
    let mut app = App::new(config.display.top_n, config.export.path.clone());

    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    if let Err(e) = execute!(stdout, EnterAlternateScreen) {
        let _ = disable_raw_mode();
        return Err(e).context("Failed to enter alternate screen");
    }

    let outcome = Terminal::new(CrosstermBackend::new(stdout))
        .and_then(|mut terminal| {
            let result = run_app(&mut terminal, &mut app, &mut worker);
            terminal.show_cursor()?;
            result
        });

    // Restore the terminal even when the UI failed
    let _ = disable_raw_mode();
    let _ = execute!(io::stdout(), LeaveAlternateScreen);

    outcome.context("Terminal UI failed")
}
