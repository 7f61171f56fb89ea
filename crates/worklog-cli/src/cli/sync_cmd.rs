use super::*;

pub(super) async fn handle_sync(
    args: SyncArgs,
    config_path: &Path,
    env_file: Option<&Path>,
) -> anyhow::Result<Outcome> {
    let config = load_config(config_path, env_file)?;
    let window = resolve_window(&args, &config.sync, OffsetDateTime::now_utc())?;
    let lock_path = resolve_path(args.paths.lock.as_deref(), default_lock_path)?;
    let ctx = RunContext {
        config: &config,
        paths: &args.paths,
        window,
        status: args.status,
        json: args.json,
        notify: !args.no_notify,
    };
    match run_once_with_lock(&lock_path, || execute_run(ctx)).await? {
        LockedRun::Ran(outcome) => outcome,
        LockedRun::Skipped => {
            let holder = lock_holder(&lock_path)
                .map(|pid| format!(" (pid {pid})"))
                .unwrap_or_default();
            println!("Another sync is running{holder}; nothing to do.");
            Ok(Outcome::Completed)
        }
    }
}
