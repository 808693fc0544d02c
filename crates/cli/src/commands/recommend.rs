use std::fs;
use std::path::Path;

use anyhow::Context;

use crate::commands::{CommandResult, FailureClass};
use covermatch_core::config::{AppConfig, LoadOptions};
use covermatch_core::{
    EngineSettings, JsonFileCatalog, ProductCatalog, RecommendationEngine, SelectionOptions,
    UserProfile,
};
use covermatch_embedding::build_encoder;

const COMMAND: &str = "recommend";

pub fn run(options: LoadOptions, profile_path: &Path) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, FailureClass::ConfigValidation, error.to_string())
        }
    };

    let profile = match read_profile(profile_path) {
        Ok(profile) => profile,
        Err(error) => {
            return CommandResult::failure_at(
                COMMAND,
                FailureClass::InvalidProfile,
                profile_path,
                format!("{error:#}"),
            )
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                FailureClass::Runtime,
                format!("failed to initialize async runtime: {error}"),
            )
        }
    };

    runtime.block_on(recommend(&config, &profile))
}

fn read_profile(path: &Path) -> anyhow::Result<UserProfile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read profile `{}`", path.display()))?;
    let profile: UserProfile = serde_json::from_str(&raw)
        .with_context(|| format!("could not parse profile `{}`", path.display()))?;
    profile.validate()?;
    Ok(profile)
}

async fn recommend(config: &AppConfig, profile: &UserProfile) -> CommandResult {
    let snapshot = match JsonFileCatalog::new(&config.catalog.path)
        .strict(config.catalog.strict)
        .snapshot()
        .await
    {
        Ok(snapshot) => snapshot,
        Err(error) => {
            return CommandResult::failure_at(
                COMMAND,
                FailureClass::CatalogUnavailable,
                &config.catalog.path,
                error.to_string(),
            )
        }
    };

    let (encoder, _) = match build_encoder(&config.encoder).await {
        Ok(built) => built,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                FailureClass::EncoderUnavailable,
                error.to_string(),
            )
        }
    };

    let engine = RecommendationEngine::new(encoder, EngineSettings::from_config(config));
    let options = SelectionOptions::new()
        .with_top_n(config.matching.top_n)
        .with_diversity(config.matching.diversity);
    let report = engine.recommend_detailed(profile, &snapshot, &options).await;

    CommandResult::report(COMMAND, 0, &report)
}
