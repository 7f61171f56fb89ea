use super::*;

pub(super) async fn handle_health(
    args: HealthArgs,
    config_path: &Path,
    env_file: Option<&Path>,
) -> anyhow::Result<Outcome> {
    let config = load_config(config_path, env_file)?;
    let collaborators = Collaborators::from_config(&config)?;
    let engine = collaborators.engine(&config)?;
    let report = engine.test_connections().await;

    if args.json {
        let services: Vec<_> = report
            .services
            .iter()
            .map(|health| {
                serde_json::json!({
                    "service": health.service.as_str(),
                    "ok": health.ok,
                    "error": health.error,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "ok": report.all_ok(),
                "services": services,
            }))?
        );
    } else {
        for line in health_lines(&report) {
            println!("{line}");
        }
    }
    Ok(health_outcome(&report))
}

pub(super) fn health_lines(report: &ConnectionReport) -> Vec<String> {
    report
        .services
        .iter()
        .map(|health| match &health.error {
            None => format!("{:<10} ok", health.service.as_str()),
            Some(error) => format!("{:<10} FAILED: {error}", health.service.as_str()),
        })
        .collect()
}

pub(super) fn health_outcome(report: &ConnectionReport) -> Outcome {
    if report.all_ok() {
        Outcome::Completed
    } else {
        Outcome::RunFatal
    }
}
