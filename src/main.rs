//! Rollcall - take class attendance from a photo and export it.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use rollcall as app;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use app::client::{AuthSession, BackendClient};
use app::config::{AppConfig, ConfigLoadResult};
use app::export::{self, CsvStyle, ExportFormat};
use app::models::StudentAttendanceRecord;
use app::roster::{CsvRoster, RosterSource};
use app::service::AttendanceService;
use app::simulator::AttendanceSimulator;

/// Take class attendance from a photo and export it.
#[derive(Parser)]
#[command(name = "rollcall", version)]
struct Cli {
    /// Use config.toml from current directory (dev mode)
    #[arg(long, global = true)]
    dev: bool,

    /// Explicit config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Take attendance for a class
    Take(TakeArgs),
    /// List classes
    Classes(Credentials),
    /// List past attendance sessions
    History(Credentials),
    /// Show dashboard counts
    Stats(Credentials),
    /// Write a default config file if none exists
    Init,
    /// Print the rows of an exported CSV file
    Inspect {
        /// CSV file produced by `take --export csv`
        file: PathBuf,
    },
}

#[derive(Args)]
struct Credentials {
    #[arg(long, env = "ROLLCALL_EMAIL")]
    email: Option<String>,
    #[arg(long, env = "ROLLCALL_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[derive(Args)]
struct TakeArgs {
    /// Class id
    #[arg(long)]
    class: String,

    /// Read the roster from a local CSV file instead of the backend
    #[arg(long)]
    roster: Option<PathBuf>,

    /// Export format (defaults to the configured one)
    #[arg(long, value_enum)]
    export: Option<ExportChoice>,

    /// Escape embedded quotes in CSV fields
    #[arg(long)]
    escape: bool,

    /// Directory for exported files
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Seed the simulator for reproducible results
    #[arg(long)]
    seed: Option<u64>,

    /// Skip the processing pause
    #[arg(long)]
    no_delay: bool,

    #[command(flatten)]
    credentials: Credentials,
}

/// Sessions listed under the dashboard counts.
const RECENT_SESSIONS: usize = 5;

#[derive(Clone, Copy, ValueEnum)]
enum ExportChoice {
    Csv,
    Xlsx,
    None,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Determine config path based on mode
    let config_path = match (&cli.config, cli.dev) {
        (Some(path), _) => path.clone(),
        (None, true) => PathBuf::from("config.toml"),
        (None, false) => AppConfig::default_path(),
    };

    let (config, config_note) = match AppConfig::try_load(&config_path) {
        ConfigLoadResult::Loaded(config) => (config, "loaded"),
        ConfigLoadResult::Missing => (AppConfig::default(), "missing, using defaults"),
        ConfigLoadResult::Invalid(e) => bail!("Invalid config {}: {e}", config_path.display()),
    };

    let _guard = init_logging(&config)?;
    tracing::info!("Config {:?}: {config_note}", config_path);

    match cli.command {
        Command::Take(args) => take(&config, args).await,
        Command::Classes(creds) => classes(&config, &creds).await,
        Command::History(creds) => history(&config, &creds).await,
        Command::Stats(creds) => stats(&config, &creds).await,
        Command::Init => init(&config_path, &config),
        Command::Inspect { file } => inspect(&file),
    }
}

/// Console logging plus an optional daily rolling file.
fn init_logging(config: &AppConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.logging.level.to_lowercase()));
    let console = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    match &config.logging.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "rollcall.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file = tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer);

            tracing_subscriber::registry().with(filter).with(console).with(file).init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry().with(filter).with(console).init();
            Ok(None)
        }
    }
}

async fn sign_in(config: &AppConfig, creds: &Credentials) -> anyhow::Result<(BackendClient, AuthSession)> {
    let client = BackendClient::new(&config.backend).context("Backend is not configured")?;
    let (Some(email), Some(password)) = (&creds.email, &creds.password) else {
        bail!("Sign-in required: pass --email/--password or set ROLLCALL_EMAIL/ROLLCALL_PASSWORD");
    };
    let session = client.sign_in(email, password).await?;
    Ok((client, session))
}

async fn take(config: &AppConfig, args: TakeArgs) -> anyhow::Result<()> {
    let records = match &args.roster {
        Some(path) => run_session(config, &args, CsvRoster::new(path)).await?,
        None => {
            let (client, session) = sign_in(config, &args.credentials).await?;
            let records = run_session(config, &args, client.roster(&session)).await;
            client.sign_out_after(session, records).await?
        }
    };

    let format = match args.export {
        Some(ExportChoice::None) => return Ok(()),
        Some(ExportChoice::Csv) => ExportFormat::Csv,
        Some(ExportChoice::Xlsx) => ExportFormat::Xlsx,
        None => config.export.format,
    };
    let style = if args.escape {
        CsvStyle::Escaped
    } else {
        config.export.csv_style()
    };
    let dir = args.output_dir.clone().unwrap_or_else(|| config.export.output_dir());

    let saved = match format {
        ExportFormat::Csv => export::save_csv_export(&records, &dir, style),
        ExportFormat::Xlsx => export::save_excel_export(&records, &dir),
    };
    match saved {
        Ok(path) => println!("Attendance data saved to {}", path.display()),
        Err(e) if e.is_no_data() => eprintln!("No data to export: the class roster is empty."),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn run_session<S: RosterSource>(
    config: &AppConfig,
    args: &TakeArgs,
    source: S,
) -> anyhow::Result<Vec<StudentAttendanceRecord>> {
    let detector = match args.seed {
        Some(seed) => AttendanceSimulator::seeded(seed),
        None => AttendanceSimulator::new(),
    };
    let delay = if args.no_delay {
        std::time::Duration::ZERO
    } else {
        config.simulation.processing_delay()
    };

    let mut service = AttendanceService::new(source, detector, delay);
    let run = service
        .take_attendance_with_progress(&args.class, |p, msg| {
            tracing::info!("[{:>3.0}%] {msg}", p * 100.0);
        })
        .await?;

    print_records(&run.records);
    println!("{} ({:.0}% of {})", run.summary.message(), run.summary.present_rate(), run.summary.total);
    Ok(run.records)
}

fn print_records(records: &[StudentAttendanceRecord]) {
    if records.is_empty() {
        println!("No students in this class.");
        return;
    }
    println!("{:<12} {:<30} {:<8} {:>10}", "Roll No.", "Student Name", "Status", "Confidence");
    for r in records {
        println!(
            "{:<12} {:<30} {:<8} {:>10}",
            r.roll_number,
            r.name,
            r.status.label(),
            r.confidence_label()
        );
    }
}

async fn classes(config: &AppConfig, creds: &Credentials) -> anyhow::Result<()> {
    let (client, session) = sign_in(config, creds).await?;
    let classes = client.list_classes(&session).await;
    let classes = client.sign_out_after(session, classes).await?;
    if classes.is_empty() {
        println!("No classes yet. Create a class and add students first.");
    }
    for class in classes {
        println!("{:<38} {}", class.id, class.label());
    }
    Ok(())
}

async fn history(config: &AppConfig, creds: &Credentials) -> anyhow::Result<()> {
    let (client, session) = sign_in(config, creds).await?;
    let sessions = client.list_sessions(&session).await;
    let sessions = client.sign_out_after(session, sessions).await?;
    if sessions.is_empty() {
        println!("No history yet.");
    }
    for s in sessions {
        println!("{}  {:<30} {}", s.date, s.class_label(), s.status);
    }
    Ok(())
}

async fn stats(config: &AppConfig, creds: &Credentials) -> anyhow::Result<()> {
    let (client, session) = sign_in(config, creds).await?;
    let greeting = session.greeting_name().to_string();
    let overview = async {
        let stats = client.dashboard_stats(&session, Utc::now().date_naive()).await?;
        let recent = client.recent_sessions(&session, RECENT_SESSIONS).await?;
        Ok::<_, app::AppError>((stats, recent))
    }
    .await;
    let (stats, recent) = client.sign_out_after(session, overview).await?;

    println!("Welcome back, {greeting}!");
    println!("Total classes:    {}", stats.total_classes);
    println!("Total students:   {}", stats.total_students);
    println!("Sessions today:   {}", stats.today_sessions);

    println!();
    println!("Recent sessions:");
    if recent.is_empty() {
        println!("  No sessions yet.");
    }
    for s in recent {
        println!("  {}  {:<30} {}", s.date, s.class_label(), s.status);
    }
    Ok(())
}

fn init(path: &Path, config: &AppConfig) -> anyhow::Result<()> {
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }
    config
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn inspect(file: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let rows = export::parse_csv_export(&text)?;
    for row in &rows {
        println!("{:<12} {:<30} {:<8} {:>10}", row.roll_number, row.name, row.status, row.confidence);
    }
    println!("{} rows", rows.len());
    Ok(())
}
