//! Config handling

use std::path::PathBuf;
use std::time::Duration;

use tracing::log::LevelFilter;

use crate::cli::CliOptions;
use crate::constants::ORIGINAL_SUBDIR;
use crate::models::ImageKind;

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("reqwest", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Boot-time configuration problems. These are fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No image generation credential was supplied
    MissingImageApiKey,
    /// Enhancement is on, the shared key flag is off and there's no text credential
    MissingTextApiKey,
    /// A pixel size or limit was zero
    InvalidValue(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingImageApiKey => write!(
                f,
                "IMAGE_API_KEY is required; set it in the environment or a .env file"
            ),
            Self::MissingTextApiKey => write!(
                f,
                "TEXT_API_KEY is required when ENABLE_PROMPT_ENHANCEMENT is on and USE_SHARED_API_KEY is off"
            ),
            Self::InvalidValue(name) => write!(f, "{name} must be greater than zero"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Where and how the server listens.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Bind address
    pub listen_address: String,
    /// Bind port
    pub port: u16,
    /// Debug logging enabled
    pub debug: bool,
}

/// Image generation endpoint settings.
#[derive(Clone, Debug)]
pub struct ImageApiConfig {
    /// Bearer credential
    pub api_key: String,
    /// Full URL of the generations endpoint
    pub url: String,
    /// Model id sent upstream
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
}

/// Prompt enhancement endpoint settings.
#[derive(Clone, Debug)]
pub struct EnhancementConfig {
    /// Master switch
    pub enabled: bool,
    /// Bearer credential, `None` means enhancement can't run
    pub api_key: Option<String>,
    /// Full URL of the completions endpoint
    pub url: String,
    /// Model id sent upstream
    pub model: String,
    /// Request timeout
    pub timeout: Duration,
}

impl EnhancementConfig {
    /// True when enhancement is switched on and has a credential to use.
    pub fn is_available(&self) -> bool {
        self.enabled && self.api_key.is_some()
    }
}

/// Output sizes and download limits.
#[derive(Clone, Debug)]
pub struct OutputConfig {
    /// Edge of the square icon output
    pub icon_size: u32,
    /// Edge of the logo bounding box
    pub logo_size: u32,
    /// Download cap in bytes
    pub max_download_bytes: u64,
    /// Download timeout
    pub download_timeout: Duration,
}

impl OutputConfig {
    /// Target edge length for a kind.
    pub fn target_size(&self, kind: ImageKind) -> u32 {
        match kind {
            ImageKind::Icon => self.icon_size,
            ImageKind::Logo => self.logo_size,
        }
    }
}

/// Local filesystem layout.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Processed artifacts
    pub output_dir: PathBuf,
    /// Raw downloaded artifacts
    pub original_dir: PathBuf,
    /// Scratch space
    pub temp_dir: PathBuf,
    /// Record store root
    pub data_dir: PathBuf,
    /// Record cache capacity
    pub cache_size: usize,
}

/// Persistence logging switches, each sub-toggle falls back to the master switch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoggingToggles {
    /// Master switch
    pub enabled: bool,
    /// Generation transactions and session aggregates
    pub transactions: bool,
    /// Per-request API logs
    pub api_requests: bool,
    /// System events
    pub system_events: bool,
}

impl LoggingToggles {
    /// True if anything at all should be written to the record store.
    pub fn any(&self) -> bool {
        self.enabled && (self.transactions || self.api_requests || self.system_events)
    }
}

/// Immutable, validated application configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Listener
    pub server: ServerConfig,
    /// Image generation
    pub image_api: ImageApiConfig,
    /// Prompt enhancement
    pub enhancement: EnhancementConfig,
    /// Sizes and limits
    pub output: OutputConfig,
    /// Filesystem layout
    pub storage: StorageConfig,
    /// Persistence logging
    pub logging: LoggingToggles,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl AppConfig {
    /// Validates the raw options and builds the typed config.
    pub fn from_cli(cli: CliOptions) -> Result<Self, ConfigError> {
        let image_api_key = non_blank(cli.image_api_key).ok_or(ConfigError::MissingImageApiKey)?;

        let text_api_key = if cli.use_shared_api_key {
            Some(image_api_key.clone())
        } else {
            non_blank(cli.text_api_key)
        };
        if cli.enable_prompt_enhancement && text_api_key.is_none() {
            return Err(ConfigError::MissingTextApiKey);
        }

        if cli.icon_size == 0 {
            return Err(ConfigError::InvalidValue("ICON_SIZE"));
        }
        if cli.logo_size == 0 {
            return Err(ConfigError::InvalidValue("LOGO_SIZE"));
        }
        if cli.max_download_bytes == 0 {
            return Err(ConfigError::InvalidValue("MAX_DOWNLOAD_BYTES"));
        }
        if cli.db_cache_size == 0 {
            return Err(ConfigError::InvalidValue("DB_CACHE_SIZE"));
        }

        let master = cli.enable_db_logging;
        let logging = LoggingToggles {
            enabled: master,
            transactions: master && cli.log_transactions.unwrap_or(master),
            api_requests: master && cli.log_api_requests.unwrap_or(master),
            system_events: master && cli.log_system_events.unwrap_or(master),
        };

        Ok(Self {
            server: ServerConfig {
                listen_address: cli.listen_address,
                port: cli.port.get(),
                debug: cli.debug,
            },
            image_api: ImageApiConfig {
                api_key: image_api_key,
                url: cli.image_api_url,
                model: cli.image_model,
                timeout: Duration::from_secs(cli.image_timeout_secs),
            },
            enhancement: EnhancementConfig {
                enabled: cli.enable_prompt_enhancement,
                api_key: text_api_key,
                url: cli.text_api_url,
                model: cli.text_model,
                timeout: Duration::from_secs(cli.text_timeout_secs),
            },
            output: OutputConfig {
                icon_size: cli.icon_size,
                logo_size: cli.logo_size,
                max_download_bytes: cli.max_download_bytes,
                download_timeout: Duration::from_secs(cli.download_timeout_secs),
            },
            storage: StorageConfig {
                original_dir: cli.output_dir.join(ORIGINAL_SUBDIR),
                output_dir: cli.output_dir,
                temp_dir: cli.temp_dir,
                data_dir: cli.data_dir,
                cache_size: cli.db_cache_size,
            },
            logging,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> CliOptions {
        let mut full = vec!["icongen"];
        full.extend_from_slice(args);
        CliOptions::try_parse_from(full).expect("parse cli")
    }

    #[test]
    fn missing_image_key_is_fatal() {
        let cli = parse(&["--enable-prompt-enhancement", "false"]);
        assert_eq!(
            AppConfig::from_cli(cli).unwrap_err(),
            ConfigError::MissingImageApiKey
        );
    }

    #[test]
    fn blank_image_key_is_fatal() {
        let cli = parse(&["--image-api-key", "   ", "--enable-prompt-enhancement", "false"]);
        assert_eq!(
            AppConfig::from_cli(cli).unwrap_err(),
            ConfigError::MissingImageApiKey
        );
    }

    #[test]
    fn enhancement_needs_text_key_unless_shared() {
        let cli = parse(&["--image-api-key", "img"]);
        assert_eq!(
            AppConfig::from_cli(cli).unwrap_err(),
            ConfigError::MissingTextApiKey
        );

        let cli = parse(&["--image-api-key", "img", "--use-shared-api-key"]);
        let config = AppConfig::from_cli(cli).expect("shared key config");
        assert_eq!(config.enhancement.api_key.as_deref(), Some("img"));
        assert!(config.enhancement.is_available());
    }

    #[test]
    fn disabled_enhancement_does_not_need_text_key() {
        let cli = parse(&["--image-api-key", "img", "--enable-prompt-enhancement", "false"]);
        let config = AppConfig::from_cli(cli).expect("config");
        assert!(!config.enhancement.is_available());
        assert_eq!(config.output.icon_size, 64);
        assert_eq!(config.output.logo_size, 512);
        assert_eq!(
            config.storage.original_dir,
            PathBuf::from("./generated").join("original")
        );
    }

    #[test]
    fn logging_subtoggles_default_to_master() {
        let cli = parse(&[
            "--image-api-key",
            "img",
            "--enable-prompt-enhancement",
            "false",
            "--enable-db-logging",
            "--log-api-requests",
            "false",
        ]);
        let config = AppConfig::from_cli(cli).expect("config");
        assert!(config.logging.enabled);
        assert!(config.logging.transactions);
        assert!(!config.logging.api_requests);
        assert!(config.logging.system_events);

        let cli = parse(&[
            "--image-api-key",
            "img",
            "--enable-prompt-enhancement",
            "false",
            "--log-transactions",
            "true",
        ]);
        let config = AppConfig::from_cli(cli).expect("config");
        assert!(!config.logging.transactions);
        assert!(!config.logging.any());
    }

    #[test]
    fn zero_icon_size_is_rejected() {
        let cli = parse(&[
            "--image-api-key",
            "img",
            "--enable-prompt-enhancement",
            "false",
            "--icon-size",
            "0",
        ]);
        assert_eq!(
            AppConfig::from_cli(cli).unwrap_err(),
            ConfigError::InvalidValue("ICON_SIZE")
        );
    }
}
