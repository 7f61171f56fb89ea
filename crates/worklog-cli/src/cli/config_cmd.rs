use super::*;

const SECRET_KEYS: [&str; 2] = ["api_token", "password"];
const MASK: &str = "********";

pub(super) fn handle_config(
    args: ConfigArgs,
    config_path: &Path,
    env_file: Option<&Path>,
) -> anyhow::Result<Outcome> {
    match args.command {
        ConfigCommands::Init(args) => handle_init(args, config_path, env_file),
        ConfigCommands::Show => {
            let config = load_config(config_path, env_file)?;
            println!("{}", serde_json::to_string_pretty(&redacted(&config)?)?);
            Ok(Outcome::Completed)
        }
        ConfigCommands::Validate => {
            let config = load_config(config_path, env_file)?;
            config.validate()?;
            println!("Config OK ({})", config_path.display());
            Ok(Outcome::Completed)
        }
        ConfigCommands::Path => {
            println!("{}", config_path.display());
            Ok(Outcome::Completed)
        }
    }
}

fn handle_init(args: InitArgs, config_path: &Path, env_file: Option<&Path>) -> anyhow::Result<Outcome> {
    if config_path.exists() && !args.force {
        anyhow::bail!(
            "config already exists at {}; pass --force to overwrite",
            config_path.display()
        );
    }
    let config = load_config(config_path, env_file)?;
    config.save(config_path)?;
    println!("Config saved to {}", config_path.display());
    let missing = config.missing_required();
    if !missing.is_empty() {
        println!("Still missing: {}", missing.join(", "));
    }
    Ok(Outcome::Completed)
}

/// The config as JSON with every credential replaced by a mask.
pub(super) fn redacted(config: &AppConfig) -> anyhow::Result<serde_json::Value> {
    let mut value = serde_json::to_value(config).context("serialize config")?;
    mask_secrets(&mut value);
    Ok(value)
}

fn mask_secrets(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if SECRET_KEYS.contains(&key.as_str()) && !entry.is_null() {
                    *entry = serde_json::Value::String(MASK.to_string());
                } else {
                    mask_secrets(entry);
                }
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(mask_secrets),
        _ => {}
    }
}
