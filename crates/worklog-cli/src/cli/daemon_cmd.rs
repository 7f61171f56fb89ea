use super::*;

pub(super) async fn handle_daemon(
    args: DaemonArgs,
    config_path: &Path,
    env_file: Option<&Path>,
) -> anyhow::Result<Outcome> {
    let config = load_config(config_path, env_file)?;
    config.validate()?;
    let minutes = args.interval_minutes.unwrap_or(config.sync.interval_minutes);
    if minutes == 0 {
        anyhow::bail!("daemon interval must be at least one minute");
    }
    let lock_path = resolve_path(args.paths.lock.as_deref(), default_lock_path)?;

    let config = &config;
    let paths = &args.paths;
    let job = move || async move {
        let window = TimeWindow::lookback(OffsetDateTime::now_utc(), config.sync.lookback_hours);
        execute_run(RunContext {
            config,
            paths,
            window,
            status: false,
            json: false,
            notify: true,
        })
        .await
    };

    if args.run_once {
        return match run_once_with_lock(&lock_path, job).await? {
            LockedRun::Ran(outcome) => outcome,
            LockedRun::Skipped => {
                info!(lock = %lock_path.display(), "another run holds the lock; skipping");
                Ok(Outcome::Completed)
            }
        };
    }

    let mut schedule = DaemonSchedule::new(Duration::from_secs(minutes.saturating_mul(60)));
    info!(interval_minutes = minutes, "daemon started");
    loop {
        let delay = match run_once_with_lock(&lock_path, job).await {
            Ok(LockedRun::Ran(Ok(Outcome::Completed))) => {
                info!("run completed");
                schedule.record_success()
            }
            Ok(LockedRun::Ran(Ok(Outcome::RunFatal))) => {
                let delay = schedule.record_failure();
                warn!(failures = schedule.failures(), "run aborted");
                delay
            }
            Ok(LockedRun::Ran(Err(err))) | Err(err) => {
                let delay = schedule.record_failure();
                warn!(error = %err, failures = schedule.failures(), "run failed");
                delay
            }
            Ok(LockedRun::Skipped) => {
                info!("another run holds the lock; skipping");
                schedule.record_success()
            }
        };
        info!(next_in_secs = delay.as_secs(), "waiting for next run");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested; daemon stopping");
                return Ok(Outcome::Completed);
            }
        }
    }
}
