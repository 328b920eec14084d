use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use specmint_generate::{ArraySeeding, OutputFormat};

pub const DEFAULT_SETTINGS_FILE: &str = "specmint.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub count: u64,
    pub seed: i64,
    pub workers: usize,
    /// `now` or an RFC 3339 instant; unset means 2024-01-01T00:00:00Z.
    pub epoch: Option<String>,
    pub array_seeding: ArraySeeding,
    pub domain: Option<String>,
    pub revalidate_after_patch: bool,
    pub timeout_secs: Option<f64>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            count: 100,
            seed: 42,
            workers: 4,
            epoch: None,
            array_seeding: ArraySeeding::PerRecord,
            domain: None,
            revalidate_after_patch: true,
            timeout_secs: None,
        }
    }
}

impl GenerationSettings {
    /// `timeout_secs` as a duration; values a `Duration` cannot hold are
    /// rejected.
    pub fn timeout(&self) -> Result<Option<Duration>, SettingsError> {
        self.timeout_secs
            .map(|secs| {
                Duration::try_from_secs_f64(secs).map_err(|err| {
                    SettingsError::Invalid(format!("timeout_secs {secs} is out of range: {err}"))
                })
            })
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub directory: PathBuf,
    pub format: OutputFormat,
    pub manifest: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("output"),
            format: OutputFormat::Jsonl,
            manifest: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directives; `RUST_LOG` wins when set.
    pub level: String,
    pub format: LogFormat,
    /// Append JSON logs here in addition to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub generation: GenerationSettings,
    pub output: OutputSettings,
    pub logging: LoggingSettings,
}

/// Load `explicit`, or `specmint.toml` in the working directory when present,
/// then apply `SPECMINT_*` environment overrides.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings, SettingsError> {
    let default_path = Path::new(DEFAULT_SETTINGS_FILE);
    let mut settings = match explicit {
        Some(path) => read_settings(path)?,
        None if default_path.exists() => read_settings(default_path)?,
        None => Settings::default(),
    };
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

fn read_settings(path: &Path) -> Result<Settings, SettingsError> {
    let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_settings(&content, path)
}

pub fn parse_settings(content: &str, path: &Path) -> Result<Settings, SettingsError> {
    toml::from_str(content).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn apply_env_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), SettingsError> {
    if let Some(dir) = lookup("SPECMINT_OUT").filter(|value| !value.is_empty()) {
        settings.output.directory = PathBuf::from(dir);
    }
    if let Some(seed) = lookup("SPECMINT_SEED").filter(|value| !value.is_empty()) {
        settings.generation.seed = seed
            .parse()
            .map_err(|_| SettingsError::Invalid(format!("SPECMINT_SEED '{seed}' is not an integer")))?;
    }
    if let Some(level) = lookup("SPECMINT_LOG_LEVEL").filter(|value| !value.is_empty()) {
        settings.logging.level = level;
    }
    Ok(())
}

impl Settings {
    /// Reject settings a run cannot start with. Zero workers fall back to 4.
    pub fn validate(&mut self) -> Result<(), SettingsError> {
        if self.generation.count == 0 {
            return Err(SettingsError::Invalid("generation count must be positive".into()));
        }
        if self.generation.workers == 0 {
            self.generation.workers = GenerationSettings::default().workers;
        }
        if self.output.directory.as_os_str().is_empty() {
            return Err(SettingsError::Invalid("output directory is required".into()));
        }
        if let Some(timeout) = self.generation.timeout_secs
            && !(timeout.is_finite() && timeout >= 0.0)
        {
            return Err(SettingsError::Invalid(format!(
                "timeout_secs must be a non-negative number, got {timeout}"
            )));
        }
        self.generation.timeout()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.generation.count, 100);
        assert_eq!(settings.generation.seed, 42);
        assert_eq!(settings.generation.workers, 4);
        assert_eq!(settings.output.format, OutputFormat::Jsonl);
        assert_eq!(settings.output.directory, PathBuf::from("output"));
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let content = r#"
            [generation]
            count = 250
            array_seeding = "stable"
            epoch = "now"

            [output]
            format = "json"

            [logging]
            format = "json"
        "#;

        let settings = parse_settings(content, Path::new("specmint.toml")).expect("parse");
        assert_eq!(settings.generation.count, 250);
        assert_eq!(settings.generation.seed, 42);
        assert_eq!(settings.generation.array_seeding, ArraySeeding::Stable);
        assert_eq!(settings.generation.epoch.as_deref(), Some("now"));
        assert_eq!(settings.output.format, OutputFormat::Json);
        assert!(settings.output.manifest);
        assert_eq!(settings.logging.format, LogFormat::Json);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn malformed_file_reports_its_path() {
        let err = parse_settings("[generation]\ncount = \"many\"", Path::new("bad.toml"))
            .expect_err("must fail");
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn environment_overrides_apply() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SPECMINT_OUT", "/tmp/data"),
            ("SPECMINT_SEED", "-7"),
            ("SPECMINT_LOG_LEVEL", "debug"),
        ]);
        let mut settings = Settings::default();

        apply_env_overrides(&mut settings, |key| env.get(key).map(|v| v.to_string()))
            .expect("overrides");

        assert_eq!(settings.output.directory, PathBuf::from("/tmp/data"));
        assert_eq!(settings.generation.seed, -7);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn invalid_seed_override_is_rejected() {
        let mut settings = Settings::default();
        let result = apply_env_overrides(&mut settings, |key| {
            (key == "SPECMINT_SEED").then(|| "abc".to_string())
        });
        assert!(matches!(result, Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_zero_count_and_repairs_workers() {
        let mut settings = Settings::default();
        settings.generation.workers = 0;
        settings.validate().expect("valid");
        assert_eq!(settings.generation.workers, 4);

        settings.generation.count = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn timeout_beyond_duration_range_is_rejected() {
        let mut settings = Settings::default();
        settings.generation.timeout_secs = Some(1.5);
        settings.validate().expect("valid");
        assert_eq!(
            settings.generation.timeout().expect("timeout"),
            Some(Duration::from_millis(1500))
        );

        settings.generation.timeout_secs = Some(1e300);
        assert!(matches!(
            settings.generation.timeout(),
            Err(SettingsError::Invalid(_))
        ));
        assert!(matches!(settings.validate(), Err(SettingsError::Invalid(_))));
    }
}
