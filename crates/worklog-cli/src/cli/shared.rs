use super::*;

/// Loads the config file and overlays the environment. An explicit env file
/// must exist; the implicit `.env` is optional.
pub(super) fn load_config(config_path: &Path, env_file: Option<&Path>) -> anyhow::Result<AppConfig> {
    match env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("load env file {}", path.display()))?;
        }
        None => {
            if let Ok(path) = dotenvy::dotenv() {
                info!(path = %path.display(), "loaded .env");
            }
        }
    }
    let mut config = AppConfig::load(config_path)?;
    config.apply_env(|name| std::env::var(name).ok())?;
    Ok(config)
}

pub(super) fn resolve_window(
    args: &SyncArgs,
    sync: &SyncConfig,
    now: OffsetDateTime,
) -> anyhow::Result<TimeWindow> {
    if let Some(from) = args.from {
        let to = args.to.unwrap_or(now.date());
        return TimeWindow::new(from, to);
    }
    let hours = args.lookback_hours.unwrap_or(sync.lookback_hours);
    Ok(TimeWindow::lookback(now, hours))
}

pub(super) fn resolve_path(
    explicit: Option<&Path>,
    default: fn() -> anyhow::Result<PathBuf>,
) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default(),
    }
}

pub(super) struct RunContext<'a> {
    pub(super) config: &'a AppConfig,
    pub(super) paths: &'a StatePaths,
    pub(super) window: TimeWindow,
    pub(super) status: bool,
    pub(super) json: bool,
    pub(super) notify: bool,
}

/// One full run: reconcile, report, print and record history.
/// Only a run that could not fetch its batch yields [`Outcome::RunFatal`].
pub(super) async fn execute_run(ctx: RunContext<'_>) -> anyhow::Result<Outcome> {
    let collaborators = Collaborators::from_config(ctx.config)?;
    let engine = collaborators.engine(ctx.config)?;
    let state_path = resolve_path(ctx.paths.state.as_deref(), default_state_path)?;
    let history_dir = resolve_path(ctx.paths.history_dir.as_deref(), default_history_dir)?;

    let last_len = Cell::new(0usize);
    let progress_fn = |progress: SyncProgress| render_sync_progress(&last_len, &progress);
    let result = if ctx.status {
        engine.run_sync_with_progress(&ctx.window, &progress_fn).await
    } else {
        engine.run_sync(&ctx.window).await
    };

    let disabled = DisabledNotifier;
    let notifier: &dyn Notifier = if ctx.notify {
        collaborators.notifier.as_ref()
    } else {
        &disabled
    };
    let reporter = Reporter::new(&ctx.config.notify, notifier).with_state_path(&state_path);

    match result {
        Ok(run) => {
            let decision = reporter.finish_run(&run).await;
            if ctx.json {
                println!("{}", serde_json::to_string_pretty(&run_json(&run, &decision))?);
            } else {
                println!("Run {} ({})", run.run_id, run.window);
                print!("{}", render_summary(&run));
                if decision.suppressed {
                    println!("Report suppressed: same critical errors already reported.");
                } else if decision.sent {
                    println!("Report sent.");
                }
            }
            record_history(&history_dir, HistoryEntry::from_run(&run));
            Ok(Outcome::Completed)
        }
        Err(err) => {
            eprintln!("Sync aborted: {err}");
            reporter.report_fatal(&err).await;
            let entry = HistoryEntry::aborted(
                &new_run_id(),
                &format_date(ctx.window.from),
                &format_date(ctx.window.to),
                &err,
            );
            record_history(&history_dir, entry);
            Ok(Outcome::RunFatal)
        }
    }
}

fn record_history(dir: &Path, entry: anyhow::Result<HistoryEntry>) {
    let result = entry.and_then(|entry| RunHistory::new(dir.to_path_buf())?.append(&entry));
    if let Err(err) = result {
        warn!(error = %err, "could not record run history");
    }
}

pub(super) fn run_json(run: &SyncRun, decision: &ReportDecision) -> serde_json::Value {
    let failures: Vec<_> = decision
        .classification
        .critical
        .iter()
        .chain(decision.classification.normal.iter())
        .map(|failure| {
            serde_json::json!({
                "external_id": failure.external_id,
                "issue": failure.issue,
                "stage": failure.stage.as_str(),
                "severity": failure.severity.as_str(),
                "error": failure.error.to_string(),
            })
        })
        .collect();
    serde_json::json!({
        "run_id": run.run_id,
        "window": { "from": format_date(run.window.from), "to": format_date(run.window.to) },
        "fetched": run.fetched,
        "dropped": run.dropped,
        "summary": run.summary,
        "duration_secs": run.duration_secs(),
        "failures": failures,
        "report": {
            "reason": decision.reason.map(|reason| reason.as_str()),
            "sent": decision.sent,
            "suppressed": decision.suppressed,
        },
    })
}

pub(super) fn render_progress_bar(step: usize, total: usize, width: usize) -> String {
    if total == 0 || width == 0 {
        return "[]".to_string();
    }
    let filled = ((step as f32 / total as f32) * width as f32).round() as usize;
    let filled = filled.min(width);
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(empty))
}

pub(super) fn progress_line(progress: &SyncProgress) -> String {
    let total = progress.total;
    let processed = progress.processed.min(total);
    format!(
        "{}/{} {} action={} worklog={} issue={}",
        processed,
        total,
        render_progress_bar(processed, total, 20),
        progress.action.as_str(),
        progress.external_id.as_deref().unwrap_or("-"),
        progress.issue.as_deref().unwrap_or("-"),
    )
}

pub(super) fn render_sync_progress(last_len: &Cell<usize>, progress: &SyncProgress) {
    let line = progress_line(progress);
    let prev_len = last_len.get();
    if line.len() < prev_len {
        print!("\r{line}{}", " ".repeat(prev_len - line.len()));
    } else {
        print!("\r{line}");
    }
    let _ = io::stdout().flush();
    last_len.set(line.len());
    if matches!(progress.action, SyncAction::Done) {
        println!();
        last_len.set(0);
    }
}
