use std::env;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_INPUT_PATH: &str = "data/fuelPurchaseData.csv";
pub const DEFAULT_CLEANED_PATH: &str = "Data/cleanedData.csv";
pub const DEFAULT_ANOMALIES_PATH: &str = "Data/dataAnomalies.csv";
pub const DEFAULT_GEOCODING_BASE_URL: &str = "https://app.zipcodebase.com/api/v1";
pub const DEFAULT_ANCHOR_ZIP: &str = "45255";
pub const DEFAULT_LOOKUP_RADIUS: u32 = 50;
pub const DEFAULT_LOOKUP_BUDGET: usize = 5;
pub const DEFAULT_ANOMALY_MARKER: &str = "pepsi";

/// Distinguishes runtime behavior for different stages of the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for a cleaning run.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub paths: PathsConfig,
    pub geocoding: GeocodingConfig,
    pub cleaning: CleaningConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("FUEL_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let paths = PathsConfig {
            input: path_var("FUEL_INPUT_PATH", DEFAULT_INPUT_PATH),
            cleaned: path_var("FUEL_CLEANED_PATH", DEFAULT_CLEANED_PATH),
            anomalies: path_var("FUEL_ANOMALIES_PATH", DEFAULT_ANOMALIES_PATH),
        };

        let api_key = env::var("ZIPCODEBASE_API_KEY")
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        let base_url = env::var("ZIPCODEBASE_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_GEOCODING_BASE_URL.to_string());

        let anchor_zip =
            env::var("FUEL_ANCHOR_ZIP").unwrap_or_else(|_| DEFAULT_ANCHOR_ZIP.to_string());
        let anchor_zip = anchor_zip.trim().to_string();
        if anchor_zip.len() != 5 || !anchor_zip.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConfigError::InvalidAnchorZip(anchor_zip));
        }

        let radius = env::var("FUEL_LOOKUP_RADIUS")
            .unwrap_or_else(|_| DEFAULT_LOOKUP_RADIUS.to_string())
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidRadius)?;

        let lookup_budget = env::var("FUEL_LOOKUP_BUDGET")
            .unwrap_or_else(|_| DEFAULT_LOOKUP_BUDGET.to_string())
            .trim()
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidLookupBudget)?;

        let anomaly_marker = env::var("FUEL_ANOMALY_MARKER")
            .unwrap_or_else(|_| DEFAULT_ANOMALY_MARKER.to_string())
            .trim()
            .to_lowercase();
        if anomaly_marker.is_empty() {
            return Err(ConfigError::EmptyAnomalyMarker);
        }

        let log_level = env::var("FUEL_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let format = LogFormat::from_str(&env::var("FUEL_LOG_FORMAT").unwrap_or_default())?;

        Ok(Self {
            environment,
            paths,
            geocoding: GeocodingConfig {
                api_key,
                base_url,
                anchor_zip,
                radius,
            },
            cleaning: CleaningConfig {
                lookup_budget,
                anomaly_marker,
            },
            telemetry: TelemetryConfig { log_level, format },
        })
    }
}

fn path_var(name: &str, default: &str) -> PathBuf {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

/// Where the batch reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathsConfig {
    pub input: PathBuf,
    pub cleaned: PathBuf,
    pub anomalies: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT_PATH),
            cleaned: PathBuf::from(DEFAULT_CLEANED_PATH),
            anomalies: PathBuf::from(DEFAULT_ANOMALIES_PATH),
        }
    }
}

/// Zipcodebase credentials and the search area used to build the city map.
#[derive(Clone)]
pub struct GeocodingConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub anchor_zip: String,
    pub radius: u32,
}

impl fmt::Debug for GeocodingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeocodingConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("anchor_zip", &self.anchor_zip)
            .field("radius", &self.radius)
            .finish()
    }
}

/// Row pipeline policy knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleaningConfig {
    pub lookup_budget: usize,
    pub anomaly_marker: String,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            lookup_budget: DEFAULT_LOOKUP_BUDGET,
            anomaly_marker: DEFAULT_ANOMALY_MARKER.to_string(),
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub format: LogFormat,
}

/// Line format for log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidLogFormat(value.to_string())),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidAnchorZip(String),
    InvalidRadius,
    InvalidLookupBudget,
    EmptyAnomalyMarker,
    InvalidLogFormat(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidAnchorZip(value) => {
                write!(f, "FUEL_ANCHOR_ZIP must be five digits, got '{value}'")
            }
            ConfigError::InvalidRadius => write!(f, "FUEL_LOOKUP_RADIUS must be a valid u32"),
            ConfigError::InvalidLookupBudget => {
                write!(f, "FUEL_LOOKUP_BUDGET must be a non-negative integer")
            }
            ConfigError::EmptyAnomalyMarker => {
                write!(f, "FUEL_ANOMALY_MARKER must not be blank")
            }
            ConfigError::InvalidLogFormat(value) => {
                write!(f, "FUEL_LOG_FORMAT must be 'compact' or 'json', got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
