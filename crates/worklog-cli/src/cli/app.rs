use super::*;

pub(super) async fn run() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(err) = logging::init(cli.log_file.as_deref(), cli.verbose) {
        eprintln!("Error: {err:#}");
        return ExitCode::from(EXIT_USAGE);
    }
    info!(command = command_label(&cli.command), "running command");

    match dispatch(cli).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<Outcome> {
    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let env_file = cli.env_file.as_deref();
    match cli.command {
        Commands::Sync(args) => handle_sync(args, &config_path, env_file).await,
        Commands::Health(args) => handle_health(args, &config_path, env_file).await,
        Commands::Daemon(args) => handle_daemon(args, &config_path, env_file).await,
        Commands::Config(args) => handle_config(args, &config_path, env_file),
        Commands::History(args) => handle_history(args, &config_path, env_file).await,
    }
}
