/// TOML configuration with sensible defaults.
/// No config file is required to run — defaults work out of the box.
///
/// The API key never lives here: `generation.api_key_env` names the
/// environment variable it is read from at startup.

use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of preference rounds before the session ends.
    pub max_rounds: usize,
    pub generation: GenerationConfig,
    pub device: DeviceConfig,
}

/// Chat-completions endpoint used to generate candidate pairs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    /// Whole-request timeout, seconds.
    pub timeout_s: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Log each actuation instead of vibrating.
    Log,
    /// Rumble a DualSense / DualShock 4 (needs the `dualsense` feature).
    DualSense,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub backend: Backend,
    /// Motor strength 0-255 for rumble backends.
    pub intensity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_rounds: 10,
            generation: GenerationConfig::default(),
            device: DeviceConfig::default(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://openrouter.ai/api/v1/chat/completions".into(),
            model: "openrouter/quasar-alpha".into(),
            api_key_env: "OPENROUTER_API_KEY".into(),
            timeout_s: 60,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Log,
            intensity: 255,
        }
    }
}

impl Config {
    /// Load config from the default config file path, or return defaults if not found.
    pub fn load() -> Self {
        let config_path = config_file_path();
        let config = match std::fs::read_to_string(&config_path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    log::info!("Loaded config from {config_path}");
                    config
                }
                Err(e) => {
                    log::warn!("Failed to parse config file {config_path}: {e}. Using defaults.");
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No config file found at {config_path}. Using defaults.");
                Self::default()
            }
        };
        config.sanitized()
    }

    fn sanitized(mut self) -> Self {
        if self.max_rounds == 0 {
            log::warn!("max_rounds = 0 is not usable, running a single round");
            self.max_rounds = 1;
        }
        self
    }
}

fn config_file_path() -> String {
    config_file_path_from(|key| std::env::var(key).ok())
}

/// $HAPTIC_TUNER_CONFIG, then the XDG config dir, then ~/.config, then the
/// working directory.
fn config_file_path_from(env: impl Fn(&str) -> Option<String>) -> String {
    if let Some(path) = env("HAPTIC_TUNER_CONFIG") {
        return path;
    }
    if let Some(xdg) = env("XDG_CONFIG_HOME") {
        return format!("{xdg}/haptic-tuner/config.toml");
    }
    if let Some(home) = env("HOME") {
        return format!("{home}/.config/haptic-tuner/config.toml");
    }
    "haptic-tuner.toml".into()
}
