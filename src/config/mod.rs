// Configuration management module
// TOML settings with environment overrides, plus the interactive setup command

pub mod interactive;
pub mod settings;

pub use interactive::{mask_secret, run_interactive_config, show_config};
pub use settings::{Config, ConfigError, Metric, OpenAiConfig, PineconeConfig};

