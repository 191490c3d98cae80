//! CLI parser
use clap::Parser;
use clap::builder::BoolishValueParser;
use std::num::NonZeroU16;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
/// CLI Options, every one of them can also be set through the environment.
pub struct CliOptions {
    #[clap(
        long,
        help = "Enable debug logging",
        value_parser = BoolishValueParser::new(),
        env = "ICONGEN_DEBUG"
    )]
    /// Enable debug logging. Env: ICONGEN_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "3000", env = "ICONGEN_PORT")]
    /// http listener, defaults to `3000`.
    /// Env: ICONGEN_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "ICONGEN_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: ICONGEN_LISTEN_ADDRESS
    pub listen_address: String,

    #[clap(long, env = "IMAGE_API_KEY", hide_env_values = true)]
    /// Credential for the image generation API. Required.
    pub image_api_key: Option<String>,
    #[clap(
        long,
        default_value = "https://api.openai.com/v1/images/generations",
        env = "IMAGE_API_URL"
    )]
    /// Image generation endpoint.
    pub image_api_url: String,
    #[clap(long, default_value = "dall-e-3", env = "IMAGE_MODEL")]
    /// Image generation model.
    pub image_model: String,
    #[clap(long, default_value = "60", env = "IMAGE_TIMEOUT_SECS")]
    /// Timeout for the image generation call, in seconds.
    pub image_timeout_secs: u64,

    #[clap(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        env = "ENABLE_PROMPT_ENHANCEMENT"
    )]
    /// Rewrite prompts through the text completion API before generating.
    pub enable_prompt_enhancement: bool,
    #[clap(long, value_parser = BoolishValueParser::new(), env = "USE_SHARED_API_KEY")]
    /// Reuse the image API key for the text completion API.
    pub use_shared_api_key: bool,
    #[clap(long, env = "TEXT_API_KEY", hide_env_values = true)]
    /// Credential for the text completion API.
    pub text_api_key: Option<String>,
    #[clap(
        long,
        default_value = "https://api.openai.com/v1/completions",
        env = "TEXT_API_URL"
    )]
    /// Text completion endpoint.
    pub text_api_url: String,
    #[clap(long, default_value = "gpt-3.5-turbo-instruct", env = "TEXT_MODEL")]
    /// Text completion model.
    pub text_model: String,
    #[clap(long, default_value = "15", env = "TEXT_TIMEOUT_SECS")]
    /// Timeout for the enhancement call, in seconds.
    pub text_timeout_secs: u64,

    #[clap(long, default_value = "64", env = "ICON_SIZE")]
    /// Edge length of generated icons, in pixels.
    pub icon_size: u32,
    #[clap(long, default_value = "512", env = "LOGO_SIZE")]
    /// Bounding box edge of generated logos, in pixels.
    pub logo_size: u32,
    #[clap(long, default_value = "10485760", env = "MAX_DOWNLOAD_BYTES")]
    /// Largest upstream image we are willing to download.
    pub max_download_bytes: u64,
    #[clap(long, default_value = "30", env = "DOWNLOAD_TIMEOUT_SECS")]
    /// Timeout for downloading the generated image, in seconds.
    pub download_timeout_secs: u64,

    #[clap(long, default_value = "./generated", env = "OUTPUT_DIR")]
    /// Where processed images go, originals land in `<dir>/original`.
    pub output_dir: PathBuf,
    #[clap(long, default_value = "./temp", env = "TEMP_DIR")]
    /// Scratch directory.
    pub temp_dir: PathBuf,
    #[clap(long, default_value = "./data/database", env = "DATA_DIR")]
    /// Root of the JSON record store.
    pub data_dir: PathBuf,

    #[clap(long, value_parser = BoolishValueParser::new(), env = "ENABLE_DB_LOGGING")]
    /// Master switch for persistence logging.
    pub enable_db_logging: bool,
    #[clap(long, value_parser = BoolishValueParser::new(), env = "LOG_TRANSACTIONS")]
    /// Log generation transactions, defaults to the master switch.
    pub log_transactions: Option<bool>,
    #[clap(long, value_parser = BoolishValueParser::new(), env = "LOG_API_REQUESTS")]
    /// Log every API request, defaults to the master switch.
    pub log_api_requests: Option<bool>,
    #[clap(long, value_parser = BoolishValueParser::new(), env = "LOG_SYSTEM_EVENTS")]
    /// Log system events, defaults to the master switch.
    pub log_system_events: Option<bool>,
    #[clap(long, default_value = "100", env = "DB_CACHE_SIZE")]
    /// Number of records kept in the in-memory record cache.
    pub db_cache_size: usize,
}
