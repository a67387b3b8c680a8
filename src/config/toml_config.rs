use crate::core::reply::ReplySettings;
use crate::core::service::ServiceSettings;
use crate::utils::error::{Result, ServiceError};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Optional tuning file for the receiver.
///
/// ```toml
/// [paths]
/// pipe = "/tmp/lending"
/// file = "${LIBRARY_DIR}/books.txt"
///
/// [service]
/// queue_capacity = 10
/// reply_attempts = 5
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub service: ServiceTable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    pub pipe: Option<String>,
    pub file: Option<String>,
    pub save: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceTable {
    pub queue_capacity: Option<usize>,
    pub reply_attempts: Option<u32>,
    pub reply_retry_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub reply_prefix: Option<String>,
    pub reply_dir: Option<String>,
    pub max_titles: Option<usize>,
    pub max_copies: Option<usize>,
    pub max_name_len: Option<usize>,
    pub max_frame_len: Option<usize>,
}

impl TomlConfig {
    /// Loads a config file, expanding `${VAR}` references first.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ServiceError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ServiceError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Unset variables are left as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| {
            ServiceError::ConfigValidationError {
                field: "environment".to_string(),
                message: e.to_string(),
            }
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn reply_dir(&self) -> Option<&str> {
        self.service.reply_dir.as_deref()
    }

    /// Fills every unset key with the built-in default.
    pub fn service_settings(&self) -> ServiceSettings {
        let defaults = ServiceSettings::default();
        let s = &self.service;
        ServiceSettings {
            queue_capacity: s.queue_capacity.unwrap_or(defaults.queue_capacity),
            poll_interval: s
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            max_frame_len: s.max_frame_len.unwrap_or(defaults.max_frame_len),
            max_name_len: s.max_name_len.unwrap_or(defaults.max_name_len),
            max_titles: s.max_titles.unwrap_or(defaults.max_titles),
            max_copies: s.max_copies.unwrap_or(defaults.max_copies),
            reply: ReplySettings {
                attempts: s.reply_attempts.unwrap_or(defaults.reply.attempts),
                retry_delay: s
                    .reply_retry_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.reply.retry_delay),
                prefix: s.reply_prefix.clone().unwrap_or(defaults.reply.prefix),
            },
        }
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("paths.pipe", &self.paths.pipe),
            ("paths.file", &self.paths.file),
            ("paths.save", &self.paths.save),
            ("service.reply_dir", &self.service.reply_dir),
        ] {
            if let Some(path) = value {
                validation::validate_path(field, path)?;
            }
        }
        if let Some(prefix) = &self.service.reply_prefix {
            validation::validate_non_empty_string("service.reply_prefix", prefix)?;
        }
        self.service_settings().validate()
    }
}

impl Validate for ServiceSettings {
    fn validate(&self) -> Result<()> {
        validation::validate_positive_number("service.queue_capacity", self.queue_capacity, 1)?;
        validation::validate_positive_number(
            "service.reply_attempts",
            self.reply.attempts as usize,
            1,
        )?;
        validation::validate_positive_number("service.max_titles", self.max_titles, 1)?;
        validation::validate_positive_number("service.max_copies", self.max_copies, 1)?;
        validation::validate_positive_number("service.max_name_len", self.max_name_len, 1)?;
        // a frame must at least hold `k,<name>,0,0`
        validation::validate_range(
            "service.max_frame_len",
            self.max_frame_len,
            self.max_name_len + 6,
            64 * 1024,
        )?;
        validation::validate_range(
            "service.poll_interval_ms",
            self.poll_interval.as_millis() as u64,
            1,
            60_000,
        )?;
        Ok(())
    }
}
