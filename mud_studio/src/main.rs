use anyhow::{anyhow, bail, Result};
use mud_engine::cli::CliOverrides;
use mud_engine::config::EditorConfig;
use mud_studio::preferences::{PreferenceStore, PREFERENCES_PATH};
use mud_studio::Studio;
use serde_json::Value;
use std::env;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = env::args().collect();
    let result = if args.get(1).map(String::as_str) == Some("prefs") {
        run_prefs(&args[2..])
    } else {
        run_studio(&args)
    };
    if let Err(err) = result {
        error!(target: "studio", "{err:?}");
        std::process::exit(2);
    }
}

fn run_studio(args: &[String]) -> Result<()> {
    let cli = CliOverrides::parse(args)?;
    let config_path = cli.config_path();
    let project_path = cli.project().cloned();
    let overrides = cli.into_config_overrides();

    let mut config = EditorConfig::load_or_default(&config_path);
    if !overrides.is_empty() {
        info!(target: "studio", fields = ?overrides.applied_fields(), "applying command-line overrides");
        config.apply_overrides(&overrides);
    }

    let mut studio = Studio::new(config);
    let project_path = project_path.or_else(|| studio.recent().most_recent().map(|p| p.to_path_buf()));
    match project_path {
        Some(path) => {
            let report = pollster::block_on(studio.open_project(&path))?;
            if !report.fallbacks.is_empty() {
                info!(target: "studio", count = report.fallbacks.len(), "entities restored with default props");
            }
            if !report.characters_without_skeleton.is_empty() {
                info!(
                    target: "studio",
                    count = report.characters_without_skeleton.len(),
                    "characters without a usable skeleton"
                );
            }
            println!("{}", studio.summary());
            info!(target: "studio", restored = report.restored, path = %path.display(), "project opened");
        }
        None => {
            println!(
                "No project supplied; new scenes save as {}",
                studio.default_project_path().display()
            );
        }
    }
    Ok(())
}

fn run_prefs(args: &[String]) -> Result<()> {
    let mut prefs = PreferenceStore::open(PREFERENCES_PATH);
    match args {
        [command, key] if command == "get" => {
            match prefs.get(key) {
                Some(value) => println!("{value}"),
                None => println!("{key} is not set"),
            }
            Ok(())
        }
        [command, key, raw] if command == "set" => {
            // Bare words are stored as strings.
            let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.clone()));
            prefs.set(key, value)?;
            println!("{key} saved to {}", prefs.path().display());
            Ok(())
        }
        [command] if command == "reset" => {
            prefs.reset_all()?;
            println!("All preferences reset");
            Ok(())
        }
        [command, key] if command == "reset" => {
            if prefs.reset(key)? {
                println!("{key} reset to default");
            } else {
                println!("{key} was not set");
            }
            Ok(())
        }
        [] => Err(anyhow!("Usage: mud_studio prefs get <key> | set <key> <value> | reset [key]")),
        [command, ..] => bail!("Unknown prefs command '{command}'. Use get, set, or reset."),
    }
}
