use crate::config::{EditorConfigOverrides, DEFAULT_CONFIG_PATH};
use crate::gizmo::GizmoMode;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    config: Option<PathBuf>,
    project: Option<PathBuf>,
    history_limit: Option<usize>,
    gizmo_mode: Option<GizmoMode>,
    show_bones: Option<bool>,
    model_dir: Option<PathBuf>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            let Some(key) = flag.strip_prefix("--") else {
                bail!("Unexpected argument '{flag}'. Flags take the form --name value.");
            };
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => overrides.config = Some(PathBuf::from(value)),
                "project" => overrides.project = Some(PathBuf::from(value)),
                "history-limit" => {
                    let limit =
                        value.parse::<usize>().with_context(|| format!("Invalid history limit '{value}'"))?;
                    if limit == 0 {
                        bail!("History limit must be at least 1.");
                    }
                    overrides.history_limit = Some(limit);
                }
                "gizmo-mode" => {
                    overrides.gizmo_mode = Some(value.parse::<GizmoMode>().map_err(|err| anyhow!(err))?);
                }
                "show-bones" => {
                    overrides.show_bones = Some(parse_bool_flag("show-bones", &value)?);
                }
                "model-dir" => overrides.model_dir = Some(PathBuf::from(value)),
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --config, --project, --history-limit, \
                     --gizmo-mode, --show-bones, --model-dir."
                ),
            }
        }
        Ok(overrides)
    }

    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn project(&self) -> Option<&PathBuf> {
        self.project.as_ref()
    }

    pub fn into_config_overrides(self) -> EditorConfigOverrides {
        EditorConfigOverrides {
            history_limit: self.history_limit,
            gizmo_mode: self.gizmo_mode,
            show_bones: self.show_bones,
            model_dir: self.model_dir,
        }
    }
}

fn parse_bool_flag(flag: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => bail!("Invalid {flag} value '{other}'. Use on/off or true/false."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_editor_flags() {
        let args = ["studio", "--history-limit", "25", "--gizmo-mode", "rotate", "--show-bones", "off"];
        let overrides = CliOverrides::parse(args).expect("parse overrides");
        let config = overrides.into_config_overrides();
        assert_eq!(config.history_limit, Some(25));
        assert_eq!(config.gizmo_mode, Some(GizmoMode::Rotation));
        assert_eq!(config.show_bones, Some(false));
        assert!(config.model_dir.is_none());
    }

    #[test]
    fn latest_flag_wins() {
        let args = ["studio", "--project", "a.mud", "--project", "b.mud"];
        let overrides = CliOverrides::parse(args).expect("parse overrides");
        assert_eq!(overrides.project(), Some(&PathBuf::from("b.mud")));
        assert_eq!(overrides.config_path(), PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn missing_value_errors() {
        let err = CliOverrides::parse(["studio", "--history-limit"]).unwrap_err();
        assert!(err.to_string().contains("Expected a value"), "error should mention missing value");
    }

    #[test]
    fn rejects_unknown_flags_and_zero_limits() {
        let err = CliOverrides::parse(["studio", "--width", "800"]).unwrap_err();
        assert!(err.to_string().contains("Unknown flag"), "unknown flags should error");
        let err = CliOverrides::parse(["studio", "--history-limit", "0"]).unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }
}
