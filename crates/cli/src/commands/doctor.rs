use crate::commands::CommandResult;
use covermatch_core::config::{AppConfig, LoadOptions};
use covermatch_core::{JsonFileCatalog, ProductCatalog};
use covermatch_embedding::{build_encoder, EncoderSelection};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoder_selection: Option<EncoderSelection>,
}

pub fn run(options: LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    if json_output {
        return CommandResult::report("doctor", exit_code, &report);
    }

    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();
    let mut encoder_selection = None;

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });

            match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => {
                    checks.push(runtime.block_on(check_catalog(&config)));
                    let (check, selection) = runtime.block_on(check_encoder_chain(&config));
                    checks.push(check);
                    encoder_selection = selection;
                }
                Err(error) => {
                    let details = format!("failed to initialize async runtime: {error}");
                    checks.push(DoctorCheck {
                        name: "catalog_readability",
                        status: CheckStatus::Fail,
                        details: details.clone(),
                    });
                    checks.push(DoctorCheck {
                        name: "encoder_chain",
                        status: CheckStatus::Fail,
                        details,
                    });
                }
            }
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "catalog_readability",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
            checks.push(DoctorCheck {
                name: "encoder_chain",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks, encoder_selection }
}

async fn check_catalog(config: &AppConfig) -> DoctorCheck {
    let catalog = JsonFileCatalog::new(&config.catalog.path).strict(config.catalog.strict);
    match catalog.snapshot().await {
        Ok(snapshot) => DoctorCheck {
            name: "catalog_readability",
            status: CheckStatus::Pass,
            details: format!(
                "loaded {} products from `{}` (version {})",
                snapshot.len(),
                catalog.path().display(),
                short_version(snapshot.version())
            ),
        },
        Err(error) => DoctorCheck {
            name: "catalog_readability",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

/// A degraded chain still passes: the keyword encoder is a supported mode.
async fn check_encoder_chain(config: &AppConfig) -> (DoctorCheck, Option<EncoderSelection>) {
    match build_encoder(&config.encoder).await {
        Ok((_, selection)) => {
            let mut details = format!(
                "selected `{}` (requested `{}`, dimension {})",
                selection.selected,
                config.encoder.strategy,
                selection.dimension.map(|d| d.to_string()).unwrap_or_else(|| "unknown".to_string())
            );
            if selection.degraded() {
                details.push_str("; degraded after failed attempts");
            }
            let check = DoctorCheck { name: "encoder_chain", status: CheckStatus::Pass, details };
            (check, Some(selection))
        }
        Err(error) => (
            DoctorCheck { name: "encoder_chain", status: CheckStatus::Fail, details: error.to_string() },
            None,
        ),
    }
}

fn short_version(version: &str) -> &str {
    version.get(..12).unwrap_or(version)
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    if let Some(selection) = &report.encoder_selection {
        for attempt in &selection.attempts {
            let outcome = match &attempt.error {
                Some(error) => format!("failed: {error}"),
                None => "ok".to_string(),
            };
            lines.push(format!("  - attempt {}: {outcome}", attempt.strategy));
        }
    }

    lines.join("\n")
}
