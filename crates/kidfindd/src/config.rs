use std::path::PathBuf;
use std::fmt::Display;
use std::str::FromStr;

use kidfind_core::DEFAULT_MATCH_THRESHOLD;

const DEFAULT_QUEUE_DEPTH: usize = 16;

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing det_10g.onnx and w600k_r50.onnx.
    pub model_dir: PathBuf,
    /// Root of the per-collection training image directories.
    pub training_dir: PathBuf,
    /// Directory holding one classifier artifact per collection.
    pub classifier_dir: PathBuf,
    /// TOML file mapping kids to collections and chats.
    pub routing_path: PathBuf,
    /// Positive-class probability needed to accept a probe.
    pub match_threshold: f32,
    /// Pending requests the engine queue holds before callers wait.
    pub queue_depth: usize,
    /// Serve on the system bus instead of the session bus.
    pub system_bus: bool,
}

impl Config {
    /// Load configuration from `KIDFIND_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());

        let data_dir = var("KIDFIND_DATA_DIR").map(PathBuf::from).unwrap_or_else(|| {
            var("XDG_DATA_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(&home).join(".local/share"))
                .join("kidfind")
        });

        let config_dir = var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&home).join(".config"))
            .join("kidfind");

        Self {
            model_dir: var("KIDFIND_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("models")),
            training_dir: var("KIDFIND_TRAINING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("images/trainer")),
            classifier_dir: var("KIDFIND_CLASSIFIER_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("classifiers")),
            routing_path: var("KIDFIND_ROUTING_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| config_dir.join("routing.toml")),
            match_threshold: parsed_or(&var, "KIDFIND_MATCH_THRESHOLD", DEFAULT_MATCH_THRESHOLD, |t| {
                (0.0..=1.0).contains(t)
            }),
            queue_depth: parsed_or(&var, "KIDFIND_QUEUE_DEPTH", DEFAULT_QUEUE_DEPTH, |d| *d > 0),
            system_bus: var("KIDFIND_SYSTEM_BUS").is_some_and(|v| v != "0"),
        }
    }
}

/// Parse `key`, falling back to `default` with a warning when the value is
/// unparsable or rejected by `valid`.
fn parsed_or<T: FromStr + Display>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    valid: impl Fn(&T) -> bool,
) -> T {
    let Some(raw) = var(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => value,
        _ => {
            tracing::warn!(key, value = %raw, default = %default, "invalid config value; using default");
            default
        }
    }
}
