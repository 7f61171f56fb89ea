use super::*;

#[derive(Parser)]
#[command(name = "worklog-sync", author, version, about = "Sync worklogs into ERP timesheets")]
pub(super) struct Cli {
    #[arg(long, global = true, help = "Path to the JSON config file")]
    pub(super) config: Option<PathBuf>,
    #[arg(long, global = true, help = "Load environment variables from this file instead of .env")]
    pub(super) env_file: Option<PathBuf>,
    #[arg(long, global = true, help = "Also append log output to this file")]
    pub(super) log_file: Option<PathBuf>,
    #[arg(short, long, global = true, help = "Log at debug level when RUST_LOG is unset")]
    pub(super) verbose: bool,
    #[command(subcommand)]
    pub(super) command: Commands,
}

#[derive(clap::Subcommand)]
pub(super) enum Commands {
    #[command(about = "Run one sync over a time window")]
    Sync(SyncArgs),
    #[command(about = "Check connectivity and credentials of every service")]
    Health(HealthArgs),
    #[command(about = "Run syncs on a fixed interval")]
    Daemon(DaemonArgs),
    #[command(about = "Manage config")]
    Config(ConfigArgs),
    #[command(about = "Summarize recent runs")]
    History(HistoryArgs),
}

#[derive(Parser)]
pub(super) struct SyncArgs {
    #[arg(long, value_parser = parse_date_arg, help = "First day of the window (YYYY-MM-DD)")]
    pub(super) from: Option<Date>,
    #[arg(long, value_parser = parse_date_arg, requires = "from", help = "Last day of the window (YYYY-MM-DD)")]
    pub(super) to: Option<Date>,
    #[arg(long, conflicts_with = "from", help = "Look back this many hours instead of the configured value")]
    pub(super) lookback_hours: Option<u32>,
    #[arg(long, help = "Show live progress")]
    pub(super) status: bool,
    #[arg(long, help = "Print the run summary as JSON")]
    pub(super) json: bool,
    #[arg(long, help = "Do not send a report for this run")]
    pub(super) no_notify: bool,
    #[command(flatten)]
    pub(super) paths: StatePaths,
}

#[derive(Parser)]
pub(super) struct HealthArgs {
    #[arg(long, help = "Print results as JSON")]
    pub(super) json: bool,
}

#[derive(Parser)]
pub(super) struct DaemonArgs {
    #[arg(long, help = "Minutes between runs (defaults to sync.interval_minutes)")]
    pub(super) interval_minutes: Option<u64>,
    #[arg(long, help = "Run a single locked sync and exit")]
    pub(super) run_once: bool,
    #[command(flatten)]
    pub(super) paths: StatePaths,
}

#[derive(clap::Args, Clone, Default)]
pub(super) struct StatePaths {
    #[arg(long, help = "Lock file guarding against overlapping runs")]
    pub(super) lock: Option<PathBuf>,
    #[arg(long, help = "Notification state file")]
    pub(super) state: Option<PathBuf>,
    #[arg(long, help = "Run history directory")]
    pub(super) history_dir: Option<PathBuf>,
}

#[derive(Parser)]
pub(super) struct ConfigArgs {
    #[command(subcommand)]
    pub(super) command: ConfigCommands,
}

#[derive(clap::Subcommand)]
pub(super) enum ConfigCommands {
    #[command(about = "Write a config file from defaults and the environment")]
    Init(InitArgs),
    #[command(about = "Print the effective config with secrets masked")]
    Show,
    #[command(about = "Report missing or invalid settings")]
    Validate,
    #[command(about = "Print the config file location")]
    Path,
}

#[derive(Parser)]
pub(super) struct InitArgs {
    #[arg(long, help = "Overwrite an existing config file")]
    pub(super) force: bool,
}

#[derive(Parser)]
pub(super) struct HistoryArgs {
    #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..=366))]
    pub(super) days: u32,
    #[arg(long, help = "Mail the summary through the configured notifier")]
    pub(super) send: bool,
    #[arg(long, help = "Print the summary as JSON")]
    pub(super) json: bool,
    #[arg(long, help = "Run history directory")]
    pub(super) history_dir: Option<PathBuf>,
}

pub(super) fn parse_date_arg(value: &str) -> Result<Date, String> {
    parse_date(value).map_err(|err| err.to_string())
}

pub(super) fn command_label(command: &Commands) -> &'static str {
    match command {
        Commands::Sync(_) => "sync",
        Commands::Health(_) => "health",
        Commands::Daemon(_) => "daemon",
        Commands::Config(_) => "config",
        Commands::History(_) => "history",
    }
}
