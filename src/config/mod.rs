use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Raster format produced by the rasterizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Command-line selector understood by pdftoppm (`-jpeg`, `-png`)
    pub fn flag(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "-jpeg",
            ImageFormat::Png => "-png",
        }
    }

    /// File extension of the images written for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            _ => None,
        }
    }
}

/// Conversion service configuration
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Root of the working directory holding scratch workspaces and archives (default: "./upload")
    pub work_dir: PathBuf,

    /// Directory served under /static (default: "./static")
    pub static_dir: PathBuf,

    /// Maximum request body size in bytes (default: 256 MB)
    pub max_file_size: usize,

    /// Image format of the rasterized pages (default: jpeg)
    pub image_format: ImageFormat,

    /// Rasterizer executable (default: "pdftoppm")
    pub rasterizer_bin: String,

    /// Archiver type: "tar" (external command) or "native" (default: "tar")
    pub archiver_type: String,

    /// Archiver executable when archiver_type is "tar" (default: "tar")
    pub archiver_bin: String,

    /// Timeout for each external tool run; None disables it (default: 300 s)
    pub tool_timeout: Option<Duration>,

    /// How long an undownloaded archive is kept (default: 1 hour)
    pub archive_retention: Duration,

    /// Interval between retention sweeps (default: 10 minutes)
    pub sweep_interval: Duration,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("./upload"),
            static_dir: PathBuf::from("./static"),
            max_file_size: 256 * 1024 * 1024, // 256 MB
            image_format: ImageFormat::Jpeg,
            rasterizer_bin: "pdftoppm".to_string(),
            archiver_type: "tar".to_string(),
            archiver_bin: "tar".to_string(),
            tool_timeout: Some(Duration::from_secs(300)),
            archive_retention: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(600),
        }
    }
}

impl ConverterConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            work_dir: env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.work_dir),

            static_dir: env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.static_dir),

            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            image_format: env::var("IMAGE_FORMAT")
                .ok()
                .and_then(|v| ImageFormat::parse(&v))
                .unwrap_or(default.image_format),

            rasterizer_bin: env::var("RASTERIZER_BIN").unwrap_or(default.rasterizer_bin),

            archiver_type: env::var("ARCHIVER").unwrap_or(default.archiver_type),

            archiver_bin: env::var("ARCHIVER_BIN").unwrap_or(default.archiver_bin),

            tool_timeout: match env::var("TOOL_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
            {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => default.tool_timeout,
            },

            archive_retention: env::var("ARCHIVE_RETENTION_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.archive_retention),

            sweep_interval: env::var("SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.sweep_interval),
        }
    }

    /// Create config for development (in-process archiver, short retention)
    pub fn development() -> Self {
        Self {
            archiver_type: "native".to_string(),
            tool_timeout: Some(Duration::from_secs(60)),
            archive_retention: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
            ..Self::default()
        }
    }
}

/// Logging configuration handed to the subscriber and to the handlers
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// EnvFilter directive used when RUST_LOG is unset
    pub filter: String,

    /// Log method, path and headers of every handled request at debug level
    pub verbose_requests: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "pdf2img_web=info,tower_http=info".to_string(),
            verbose_requests: false,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            filter: env::var("LOG_FILTER").unwrap_or(default.filter),
            verbose_requests: env::var("VERBOSE_REQUESTS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.verbose_requests),
        }
    }
}
