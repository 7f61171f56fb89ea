use super::*;

pub(super) async fn handle_history(
    args: HistoryArgs,
    config_path: &Path,
    env_file: Option<&Path>,
) -> anyhow::Result<Outcome> {
    let dir = resolve_path(args.history_dir.as_deref(), default_history_dir)?;
    let history = RunHistory::new(dir)?;
    let summary = history.summarize_days(args.days, OffsetDateTime::now_utc())?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", summary.render());
    }

    if args.send {
        let config = load_config(config_path, env_file)?;
        let notifier = notifier_for(&config.notify);
        if !notifier.is_configured() {
            anyhow::bail!("no notifier configured; set notify.smtp or the EMAIL_* variables");
        }
        notifier
            .send_report(&summary.to_report(&config.notify.subject_prefix))
            .await
            .context("send history summary")?;
        println!("Summary sent.");
    }
    Ok(Outcome::Completed)
}
