//! Engine configuration.
//!
//! Loaded with a precedence system (later sources override earlier):
//! 1. Bundled defaults (include_str! from fabulist.toml)
//! 2. User config in home directory (~/.config/fabulist/fabulist.toml)
//! 3. User config in current directory (./fabulist.toml)
//! 4. Environment variables such as `FABULIST__GENERATION__IMAGE_CONCURRENCY`

use config::{Config, Environment, File, FileFormat};
use fabulist_core::TelemetrySettings;
use fabulist_error::{ConfigError, FabulistError, FabulistResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Settings for prompt assembly and provider calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Ancestor boards fed into a continuation prompt
    pub ancestor_depth: usize,
    /// Scene images generated at once per board
    pub image_concurrency: usize,
    /// Provider deadline applied when the caller passes none
    pub provider_timeout_secs: Option<u64>,
    /// Negative prompt for image generation
    pub negative_prompt: Option<String>,
    /// Output language named in prompts
    pub language: Option<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            ancestor_depth: 5,
            image_concurrency: 4,
            provider_timeout_secs: None,
            negative_prompt: None,
            language: None,
        }
    }
}

impl GenerationSettings {
    /// Default provider deadline.
    pub fn provider_timeout(&self) -> Option<Duration> {
        self.provider_timeout_secs.map(Duration::from_secs)
    }
}

/// Paging limits for storyboard listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingSettings {
    /// Page size when the caller passes none
    pub default_page_size: u32,
    /// Largest page size accepted
    pub max_page_size: u32,
}

impl Default for ListingSettings {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// Limits applied by [`ThrottledProvider`](crate::ThrottledProvider).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderLimits {
    /// Requests per minute; unset means unlimited
    pub requests_per_minute: Option<u32>,
    /// Calls in flight at once; unset means unlimited
    pub max_concurrent: Option<u32>,
}

/// Top-level Fabulist configuration.
///
/// # Example
///
/// ```no_run
/// use fabulist_engine::FabulistConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = FabulistConfig::load()?;
/// println!("image concurrency: {}", config.generation.image_concurrency);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FabulistConfig {
    /// Prompt and provider call settings
    #[serde(default)]
    pub generation: GenerationSettings,
    /// Listing limits
    #[serde(default)]
    pub listing: ListingSettings,
    /// Provider throttling
    #[serde(default)]
    pub provider: ProviderLimits,
    /// Logging
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl FabulistConfig {
    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> FabulistResult<Self> {
        debug!("Loading configuration from file");

        let config: Self = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .map_err(|e| {
                FabulistError::from(ConfigError::new(format!(
                    "Failed to read configuration from {}: {}",
                    path.as_ref().display(),
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                FabulistError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with precedence: env > current dir > home dir > bundled defaults.
    ///
    /// User config files are optional and silently skipped if not found.
    #[instrument]
    pub fn load() -> FabulistResult<Self> {
        debug!("Loading configuration with precedence: env > current dir > home dir > bundled defaults");

        const DEFAULT_CONFIG: &str = include_str!("../../../fabulist.toml");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/fabulist/fabulist.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder
            .add_source(File::with_name("fabulist").required(false))
            .add_source(
                Environment::with_prefix("FABULIST")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder
            .build()
            .map_err(|e| {
                FabulistError::from(ConfigError::new(format!(
                    "Failed to build configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                FabulistError::from(ConfigError::new(format!(
                    "Failed to parse configuration: {}",
                    e
                )))
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with.
    #[track_caller]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.ancestor_depth == 0 {
            return Err(ConfigError::new("generation.ancestor_depth must be at least 1"));
        }
        if self.generation.image_concurrency == 0 {
            return Err(ConfigError::new(
                "generation.image_concurrency must be at least 1",
            ));
        }
        if self.generation.provider_timeout_secs == Some(0) {
            return Err(ConfigError::new(
                "generation.provider_timeout_secs must be at least 1",
            ));
        }
        if self.listing.max_page_size == 0 {
            return Err(ConfigError::new("listing.max_page_size must be at least 1"));
        }
        if self.listing.default_page_size == 0
            || self.listing.default_page_size > self.listing.max_page_size
        {
            return Err(ConfigError::new(format!(
                "listing.default_page_size must be between 1 and {}",
                self.listing.max_page_size
            )));
        }
        if self.provider.requests_per_minute == Some(0) || self.provider.max_concurrent == Some(0) {
            return Err(ConfigError::new(
                "provider limits must be at least 1 when set",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = FabulistConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.generation.ancestor_depth, 5);
        assert_eq!(config.listing.default_page_size, 20);
    }

    #[test]
    fn test_bundled_defaults_parse() {
        let config: FabulistConfig = Config::builder()
            .add_source(File::from_str(
                include_str!("../../../fabulist.toml"),
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.generation.image_concurrency, 4);
        assert_eq!(config.provider.requests_per_minute, Some(60));
        assert!(config.generation.negative_prompt.is_some());
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = FabulistConfig::default();
        config.generation.image_concurrency = 0;
        let err = config.validate().unwrap_err();
        assert!(err.message.contains("image_concurrency"));
    }

    #[test]
    fn test_page_size_bounds_rejected() {
        let mut config = FabulistConfig::default();
        config.listing.default_page_size = 500;
        assert!(config.validate().is_err());
    }
}
