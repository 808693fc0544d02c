use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use covermatch_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run(options: LoadOptions) -> String {
    let config_file_path = resolve_config_path(options.config_path.as_deref());
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "encoder.strategy",
        config.encoder.strategy.as_str(),
        source("encoder.strategy", &["COVERMATCH_ENCODER_STRATEGY"]),
    ));
    lines.push(render_line(
        "encoder.allow_fallback",
        &config.encoder.allow_fallback.to_string(),
        source("encoder.allow_fallback", &["COVERMATCH_ENCODER_ALLOW_FALLBACK"]),
    ));
    lines.push(render_line(
        "encoder.timeout_secs",
        &config.encoder.timeout_secs.to_string(),
        source("encoder.timeout_secs", &["COVERMATCH_ENCODER_TIMEOUT_SECS"]),
    ));
    lines.push(render_line(
        "encoder.sentence.base_url",
        &config.encoder.sentence.base_url,
        source("encoder.sentence.base_url", &["COVERMATCH_SENTENCE_BASE_URL"]),
    ));
    lines.push(render_line(
        "encoder.sentence.model",
        &config.encoder.sentence.model,
        source("encoder.sentence.model", &["COVERMATCH_SENTENCE_MODEL"]),
    ));
    lines.push(render_line(
        "encoder.mean_pooling.base_url",
        &config.encoder.mean_pooling.base_url,
        source("encoder.mean_pooling.base_url", &["COVERMATCH_MEAN_POOLING_BASE_URL"]),
    ));
    lines.push(render_line(
        "encoder.mean_pooling.model",
        &config.encoder.mean_pooling.model,
        source("encoder.mean_pooling.model", &["COVERMATCH_MEAN_POOLING_MODEL"]),
    ));

    let api_key = config
        .encoder
        .mean_pooling
        .api_key
        .as_ref()
        .map(|key| redact_token(key.expose_secret()))
        .unwrap_or_else(|| "<unset>".to_string());
    lines.push(render_line(
        "encoder.mean_pooling.api_key",
        &api_key,
        source("encoder.mean_pooling.api_key", &["COVERMATCH_MEAN_POOLING_API_KEY"]),
    ));

    lines.push(render_line(
        "matching.min_score",
        &config.matching.min_score.to_string(),
        source("matching.min_score", &["COVERMATCH_MATCHING_MIN_SCORE"]),
    ));
    lines.push(render_line(
        "matching.top_n",
        &config.matching.top_n.to_string(),
        source("matching.top_n", &["COVERMATCH_MATCHING_TOP_N"]),
    ));
    lines.push(render_line(
        "matching.diversity",
        &config.matching.diversity.to_string(),
        source("matching.diversity", &["COVERMATCH_MATCHING_DIVERSITY"]),
    ));
    lines.push(render_line(
        "matching.fallback_count",
        &config.matching.fallback_count.to_string(),
        source("matching.fallback_count", &["COVERMATCH_MATCHING_FALLBACK_COUNT"]),
    ));
    lines.push(render_line(
        "matching.fallback_min_results",
        &config.matching.fallback_min_results.to_string(),
        source("matching.fallback_min_results", &[]),
    ));
    let (band_low, band_high) = config.matching.mismatch_band;
    lines.push(render_line(
        "matching.mismatch_band",
        &format!("[{band_low}, {band_high}]"),
        source("matching.mismatch_band", &[]),
    ));
    lines.push(render_line(
        "matching.cache_product_embeddings",
        &config.matching.cache_product_embeddings.to_string(),
        source(
            "matching.cache_product_embeddings",
            &["COVERMATCH_MATCHING_CACHE_PRODUCT_EMBEDDINGS"],
        ),
    ));
    lines.push(render_line(
        "matching.request_timeout_secs",
        &config.matching.request_timeout_secs.to_string(),
        source("matching.request_timeout_secs", &["COVERMATCH_MATCHING_REQUEST_TIMEOUT_SECS"]),
    ));

    lines.push(render_line(
        "pricing.bound_policy",
        config.pricing.bound_policy.as_str(),
        source("pricing.bound_policy", &["COVERMATCH_PRICING_BOUND_POLICY"]),
    ));
    lines.push(render_line(
        "pricing.base_multiple_lower",
        &config.pricing.base_multiple_lower.to_string(),
        source("pricing.base_multiple_lower", &[]),
    ));
    lines.push(render_line(
        "pricing.base_multiple_upper",
        &config.pricing.base_multiple_upper.to_string(),
        source("pricing.base_multiple_upper", &[]),
    ));
    lines.push(render_line(
        "pricing.affordability_ratio",
        &config.pricing.affordability_ratio.to_string(),
        source("pricing.affordability_ratio", &[]),
    ));

    lines.push(render_line(
        "catalog.path",
        &config.catalog.path.display().to_string(),
        source("catalog.path", &["COVERMATCH_CATALOG_PATH"]),
    ));
    lines.push(render_line(
        "catalog.strict",
        &config.catalog.strict.to_string(),
        source("catalog.strict", &["COVERMATCH_CATALOG_STRICT"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["COVERMATCH_LOGGING_LEVEL", "COVERMATCH_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["COVERMATCH_LOGGING_FORMAT", "COVERMATCH_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("config file"));
            return format!("file ({})", file_path.display());
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps a short recognizable prefix (`hf_`, `sk-`) and hides the rest.
fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some(index) = trimmed.find(['-', '_']) {
        if index <= 4 {
            return format!("{}***", &trimmed[..=index]);
        }
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_token};

    #[test]
    fn redaction_keeps_only_short_prefixes() {
        assert_eq!(redact_token("hf_abcdef"), "hf_***");
        assert_eq!(redact_token("sk-live-123"), "sk-***");
        assert_eq!(redact_token("plainsecretvalue"), "<redacted>");
        assert_eq!(redact_token("verylongprefix-secret"), "<redacted>");
        assert_eq!(redact_token("  "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_toml_documents() {
        let doc: toml::Value =
            "[encoder.sentence]\nmodel = \"all-minilm\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "encoder.sentence.model"));
        assert!(!contains_path(&doc, "encoder.mean_pooling.model"));
    }
}
