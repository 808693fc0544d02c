use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encoding::EncoderStrategy;
use crate::matching::{
    DEFAULT_FALLBACK_COUNT, DEFAULT_FALLBACK_MIN_RESULTS, DEFAULT_MIN_SCORE,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_TOP_N,
};
use crate::pricing::{PriceBoundPolicy, DEFAULT_BASE_MULTIPLE_LOWER, DEFAULT_BASE_MULTIPLE_UPPER};
use crate::reasons::DEFAULT_AFFORDABILITY_RATIO;
use crate::similarity::DEFAULT_MISMATCH_BAND;

pub const DEFAULT_CONFIG_FILE: &str = "covermatch.toml";
pub const NESTED_CONFIG_FILE: &str = "config/covermatch.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub encoder: EncoderConfig,
    pub matching: MatchingConfig,
    pub pricing: PricingConfig,
    pub catalog: CatalogConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct EncoderConfig {
    pub strategy: EncoderStrategy,
    /// Append the keyword encoder to the candidate chain.
    pub allow_fallback: bool,
    pub timeout_secs: u64,
    pub sentence: SentenceEncoderConfig,
    pub mean_pooling: MeanPoolingEncoderConfig,
}

#[derive(Clone, Debug)]
pub struct SentenceEncoderConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Clone, Debug)]
pub struct MeanPoolingEncoderConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
}

#[derive(Clone, Debug)]
pub struct MatchingConfig {
    pub min_score: f64,
    pub top_n: usize,
    pub diversity: bool,
    pub fallback_count: usize,
    pub fallback_min_results: usize,
    pub mismatch_band: (f64, f64),
    pub cache_product_embeddings: bool,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PricingConfig {
    pub bound_policy: BoundPolicyKind,
    pub base_multiple_lower: f64,
    pub base_multiple_upper: f64,
    pub affordability_ratio: f64,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub path: PathBuf,
    pub strict: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundPolicyKind {
    DeclaredRange,
    BaseMultiple,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub encoder_strategy: Option<EncoderStrategy>,
    pub allow_fallback: Option<bool>,
    pub catalog_path: Option<PathBuf>,
    pub top_n: Option<usize>,
    pub diversity: Option<bool>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderConfig {
                strategy: EncoderStrategy::Auto,
                allow_fallback: true,
                timeout_secs: 30,
                sentence: SentenceEncoderConfig {
                    base_url: "http://localhost:11434".to_string(),
                    model: "all-minilm".to_string(),
                },
                mean_pooling: MeanPoolingEncoderConfig {
                    base_url: "http://localhost:8080".to_string(),
                    model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
                    api_key: None,
                },
            },
            matching: MatchingConfig {
                min_score: DEFAULT_MIN_SCORE,
                top_n: DEFAULT_TOP_N,
                diversity: false,
                fallback_count: DEFAULT_FALLBACK_COUNT,
                fallback_min_results: DEFAULT_FALLBACK_MIN_RESULTS,
                mismatch_band: DEFAULT_MISMATCH_BAND,
                cache_product_embeddings: true,
                request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            },
            pricing: PricingConfig {
                bound_policy: BoundPolicyKind::DeclaredRange,
                base_multiple_lower: DEFAULT_BASE_MULTIPLE_LOWER,
                base_multiple_upper: DEFAULT_BASE_MULTIPLE_UPPER,
                affordability_ratio: DEFAULT_AFFORDABILITY_RATIO,
            },
            catalog: CatalogConfig { path: PathBuf::from("products_data.json"), strict: false },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl PricingConfig {
    pub fn policy(&self) -> PriceBoundPolicy {
        match self.bound_policy {
            BoundPolicyKind::DeclaredRange => PriceBoundPolicy::DeclaredRange,
            BoundPolicyKind::BaseMultiple => PriceBoundPolicy::BaseMultiple {
                lower: self.base_multiple_lower,
                upper: self.base_multiple_upper,
            },
        }
    }
}

impl BoundPolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeclaredRange => "declared_range",
            Self::BaseMultiple => "base_multiple",
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for BoundPolicyKind {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "declared_range" => Ok(Self::DeclaredRange),
            "base_multiple" => Ok(Self::BaseMultiple),
            other => Err(ConfigError::Validation(format!(
                "unsupported price bound policy `{other}` (expected declared_range|base_multiple)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(encoder) = patch.encoder {
            if let Some(strategy) = encoder.strategy {
                self.encoder.strategy = strategy;
            }
            if let Some(allow_fallback) = encoder.allow_fallback {
                self.encoder.allow_fallback = allow_fallback;
            }
            if let Some(timeout_secs) = encoder.timeout_secs {
                self.encoder.timeout_secs = timeout_secs;
            }
            if let Some(sentence) = encoder.sentence {
                if let Some(base_url) = sentence.base_url {
                    self.encoder.sentence.base_url = base_url;
                }
                if let Some(model) = sentence.model {
                    self.encoder.sentence.model = model;
                }
            }
            if let Some(mean_pooling) = encoder.mean_pooling {
                if let Some(base_url) = mean_pooling.base_url {
                    self.encoder.mean_pooling.base_url = base_url;
                }
                if let Some(model) = mean_pooling.model {
                    self.encoder.mean_pooling.model = model;
                }
                if let Some(api_key_value) = mean_pooling.api_key {
                    self.encoder.mean_pooling.api_key = Some(secret_value(api_key_value));
                }
            }
        }

        if let Some(matching) = patch.matching {
            if let Some(min_score) = matching.min_score {
                self.matching.min_score = min_score;
            }
            if let Some(top_n) = matching.top_n {
                self.matching.top_n = top_n;
            }
            if let Some(diversity) = matching.diversity {
                self.matching.diversity = diversity;
            }
            if let Some(fallback_count) = matching.fallback_count {
                self.matching.fallback_count = fallback_count;
            }
            if let Some(fallback_min_results) = matching.fallback_min_results {
                self.matching.fallback_min_results = fallback_min_results;
            }
            if let Some([low, high]) = matching.mismatch_band {
                self.matching.mismatch_band = (low, high);
            }
            if let Some(cache_product_embeddings) = matching.cache_product_embeddings {
                self.matching.cache_product_embeddings = cache_product_embeddings;
            }
            if let Some(request_timeout_secs) = matching.request_timeout_secs {
                self.matching.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(pricing) = patch.pricing {
            if let Some(bound_policy) = pricing.bound_policy {
                self.pricing.bound_policy = bound_policy;
            }
            if let Some(lower) = pricing.base_multiple_lower {
                self.pricing.base_multiple_lower = lower;
            }
            if let Some(upper) = pricing.base_multiple_upper {
                self.pricing.base_multiple_upper = upper;
            }
            if let Some(affordability_ratio) = pricing.affordability_ratio {
                self.pricing.affordability_ratio = affordability_ratio;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(path) = catalog.path {
                self.catalog.path = path;
            }
            if let Some(strict) = catalog.strict {
                self.catalog.strict = strict;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("COVERMATCH_ENCODER_STRATEGY") {
            self.encoder.strategy =
                value.parse::<EncoderStrategy>().map_err(ConfigError::Validation)?;
        }
        if let Some(value) = read_env("COVERMATCH_ENCODER_ALLOW_FALLBACK") {
            self.encoder.allow_fallback = parse_bool("COVERMATCH_ENCODER_ALLOW_FALLBACK", &value)?;
        }
        if let Some(value) = read_env("COVERMATCH_ENCODER_TIMEOUT_SECS") {
            self.encoder.timeout_secs = parse_u64("COVERMATCH_ENCODER_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("COVERMATCH_SENTENCE_BASE_URL") {
            self.encoder.sentence.base_url = value;
        }
        if let Some(value) = read_env("COVERMATCH_SENTENCE_MODEL") {
            self.encoder.sentence.model = value;
        }
        if let Some(value) = read_env("COVERMATCH_MEAN_POOLING_BASE_URL") {
            self.encoder.mean_pooling.base_url = value;
        }
        if let Some(value) = read_env("COVERMATCH_MEAN_POOLING_MODEL") {
            self.encoder.mean_pooling.model = value;
        }
        if let Some(value) = read_env("COVERMATCH_MEAN_POOLING_API_KEY") {
            self.encoder.mean_pooling.api_key = Some(secret_value(value));
        }

        if let Some(value) = read_env("COVERMATCH_MATCHING_MIN_SCORE") {
            self.matching.min_score = parse_f64("COVERMATCH_MATCHING_MIN_SCORE", &value)?;
        }
        if let Some(value) = read_env("COVERMATCH_MATCHING_TOP_N") {
            self.matching.top_n = parse_usize("COVERMATCH_MATCHING_TOP_N", &value)?;
        }
        if let Some(value) = read_env("COVERMATCH_MATCHING_DIVERSITY") {
            self.matching.diversity = parse_bool("COVERMATCH_MATCHING_DIVERSITY", &value)?;
        }
        if let Some(value) = read_env("COVERMATCH_MATCHING_FALLBACK_COUNT") {
            self.matching.fallback_count =
                parse_usize("COVERMATCH_MATCHING_FALLBACK_COUNT", &value)?;
        }
        if let Some(value) = read_env("COVERMATCH_MATCHING_CACHE_PRODUCT_EMBEDDINGS") {
            self.matching.cache_product_embeddings =
                parse_bool("COVERMATCH_MATCHING_CACHE_PRODUCT_EMBEDDINGS", &value)?;
        }
        if let Some(value) = read_env("COVERMATCH_MATCHING_REQUEST_TIMEOUT_SECS") {
            self.matching.request_timeout_secs =
                parse_u64("COVERMATCH_MATCHING_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("COVERMATCH_PRICING_BOUND_POLICY") {
            self.pricing.bound_policy = value.parse()?;
        }

        if let Some(value) = read_env("COVERMATCH_CATALOG_PATH") {
            self.catalog.path = PathBuf::from(value);
        }
        if let Some(value) = read_env("COVERMATCH_CATALOG_STRICT") {
            self.catalog.strict = parse_bool("COVERMATCH_CATALOG_STRICT", &value)?;
        }

        let log_level =
            read_env("COVERMATCH_LOGGING_LEVEL").or_else(|| read_env("COVERMATCH_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("COVERMATCH_LOGGING_FORMAT").or_else(|| read_env("COVERMATCH_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(strategy) = overrides.encoder_strategy {
            self.encoder.strategy = strategy;
        }
        if let Some(allow_fallback) = overrides.allow_fallback {
            self.encoder.allow_fallback = allow_fallback;
        }
        if let Some(catalog_path) = overrides.catalog_path {
            self.catalog.path = catalog_path;
        }
        if let Some(top_n) = overrides.top_n {
            self.matching.top_n = top_n;
        }
        if let Some(diversity) = overrides.diversity {
            self.matching.diversity = diversity;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_encoder(&self.encoder)?;
        validate_matching(&self.matching)?;
        validate_pricing(&self.pricing)?;
        validate_catalog(&self.catalog)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Config file that `AppConfig::load` would read, if any.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(ConfigError::Validation(format!("{key} must start with http:// or https://")));
    }
    Ok(())
}

fn validate_timeout(key: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 || value > 300 {
        return Err(ConfigError::Validation(format!("{key} must be in range 1..=300")));
    }
    Ok(())
}

fn validate_encoder(encoder: &EncoderConfig) -> Result<(), ConfigError> {
    validate_timeout("encoder.timeout_secs", encoder.timeout_secs)?;
    validate_http_url("encoder.sentence.base_url", &encoder.sentence.base_url)?;
    validate_http_url("encoder.mean_pooling.base_url", &encoder.mean_pooling.base_url)?;

    if encoder.sentence.model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "encoder.sentence.model must not be empty".to_string(),
        ));
    }
    if encoder.mean_pooling.model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "encoder.mean_pooling.model must not be empty".to_string(),
        ));
    }

    let blank_key = encoder
        .mean_pooling
        .api_key
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(false);
    if blank_key {
        return Err(ConfigError::Validation(
            "encoder.mean_pooling.api_key is set but empty; remove it or provide a token"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_matching(matching: &MatchingConfig) -> Result<(), ConfigError> {
    if !(0.0..1.0).contains(&matching.min_score) {
        return Err(ConfigError::Validation(
            "matching.min_score must be in range [0, 1)".to_string(),
        ));
    }
    if matching.top_n == 0 {
        return Err(ConfigError::Validation(
            "matching.top_n must be greater than zero".to_string(),
        ));
    }
    if matching.fallback_count == 0 {
        return Err(ConfigError::Validation(
            "matching.fallback_count must be greater than zero".to_string(),
        ));
    }

    let (low, high) = matching.mismatch_band;
    let in_unit = |value: f64| (0.0..=1.0).contains(&value);
    if !in_unit(low) || !in_unit(high) || low > high {
        return Err(ConfigError::Validation(
            "matching.mismatch_band must be an ordered pair inside [0, 1]".to_string(),
        ));
    }

    validate_timeout("matching.request_timeout_secs", matching.request_timeout_secs)
}

fn validate_pricing(pricing: &PricingConfig) -> Result<(), ConfigError> {
    let lower = pricing.base_multiple_lower;
    let upper = pricing.base_multiple_upper;
    if !lower.is_finite() || !upper.is_finite() || lower <= 0.0 || lower > upper {
        return Err(ConfigError::Validation(
            "pricing.base_multiple_lower/upper must satisfy 0 < lower <= upper".to_string(),
        ));
    }

    let ratio = pricing.affordability_ratio;
    if !(ratio > 0.0 && ratio <= 1.0) {
        return Err(ConfigError::Validation(
            "pricing.affordability_ratio must be in range (0, 1]".to_string(),
        ));
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if catalog.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("catalog.path must not be empty".to_string()));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    encoder: Option<EncoderPatch>,
    matching: Option<MatchingPatch>,
    pricing: Option<PricingPatch>,
    catalog: Option<CatalogPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct EncoderPatch {
    strategy: Option<EncoderStrategy>,
    allow_fallback: Option<bool>,
    timeout_secs: Option<u64>,
    sentence: Option<SentencePatch>,
    mean_pooling: Option<MeanPoolingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct SentencePatch {
    base_url: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MeanPoolingPatch {
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MatchingPatch {
    min_score: Option<f64>,
    top_n: Option<usize>,
    diversity: Option<bool>,
    fallback_count: Option<usize>,
    fallback_min_results: Option<usize>,
    mismatch_band: Option<[f64; 2]>,
    cache_product_embeddings: Option<bool>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PricingPatch {
    bound_policy: Option<BoundPolicyKind>,
    base_multiple_lower: Option<f64>,
    base_multiple_upper: Option<f64>,
    affordability_ratio: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    path: Option<PathBuf>,
    strict: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
