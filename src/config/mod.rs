pub mod toml_config;

use crate::core::service::ServiceSettings;
use crate::utils::error::Result;
use crate::utils::validation::{self, Validate};
use std::path::PathBuf;
use toml_config::TomlConfig;

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "lending-service")]
#[command(about = "Book lending service listening on a named pipe")]
pub struct CliConfig {
    /// Inbound FIFO, created if absent and removed on exit
    #[arg(short, long)]
    pub pipe: Option<String>,

    /// Inventory file loaded at startup
    #[arg(short, long)]
    pub file: Option<String>,

    /// Where to write the inventory when the service stops
    #[arg(short, long)]
    pub save: Option<String>,

    #[arg(short, long, help = "Log every received operation")]
    pub verbose: bool,

    /// Optional TOML tuning file
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long, help = "Emit JSON log lines")]
    pub log_json: bool,
}

/// Fully resolved receiver configuration. Command-line flags win over the
/// TOML file, which wins over built-in defaults.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub pipe: PathBuf,
    pub inventory_file: PathBuf,
    pub save: Option<PathBuf>,
    pub reply_dir: PathBuf,
    pub settings: ServiceSettings,
}

impl RuntimeConfig {
    pub fn resolve(
        pipe: Option<String>,
        file: Option<String>,
        save: Option<String>,
        toml: Option<&TomlConfig>,
    ) -> Result<Self> {
        let pipe = pipe.or_else(|| toml.and_then(|t| t.paths.pipe.clone()));
        let file = file.or_else(|| toml.and_then(|t| t.paths.file.clone()));
        let save = save.or_else(|| toml.and_then(|t| t.paths.save.clone()));

        let config = Self {
            pipe: validation::validate_required_field("pipe", &pipe)?.into(),
            inventory_file: validation::validate_required_field("file", &file)?.into(),
            save: save.map(PathBuf::from),
            reply_dir: toml
                .and_then(|t| t.reply_dir())
                .unwrap_or(".")
                .into(),
            settings: toml.map(|t| t.service_settings()).unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "cli")]
    pub fn from_cli(cli: &CliConfig) -> Result<Self> {
        let toml = match &cli.config {
            Some(path) => {
                let toml = TomlConfig::from_file(path)?;
                toml.validate()?;
                Some(toml)
            }
            None => None,
        };
        Self::resolve(
            cli.pipe.clone(),
            cli.file.clone(),
            cli.save.clone(),
            toml.as_ref(),
        )
    }
}

impl Validate for RuntimeConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("pipe", &self.pipe.to_string_lossy())?;
        validation::validate_path("file", &self.inventory_file.to_string_lossy())?;
        if let Some(save) = &self.save {
            validation::validate_path("save", &save.to_string_lossy())?;
        }
        self.settings.validate()
    }
}
