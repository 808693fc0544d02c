pub mod config;
pub mod doctor;
pub mod recommend;

use std::path::Path;

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

/// Why a command gave up. Each class has a fixed exit code so scripts can
/// branch without parsing the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    ConfigValidation,
    InvalidProfile,
    CatalogUnavailable,
    EncoderUnavailable,
    Runtime,
    Serialization,
}

impl FailureClass {
    pub fn exit_code(self) -> u8 {
        match self {
            Self::ConfigValidation | Self::InvalidProfile => 2,
            Self::CatalogUnavailable | Self::EncoderUnavailable => 3,
            Self::Runtime | Self::Serialization => 1,
        }
    }
}

#[derive(Debug, Serialize)]
struct CommandFailure<'a> {
    command: &'a str,
    status: &'static str,
    error_class: FailureClass,
    message: String,
    /// Input file the failure refers to (profile or catalog).
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

impl CommandResult {
    /// Pretty JSON body for a report the command produced.
    pub fn report<T: Serialize>(command: &str, exit_code: u8, report: &T) -> Self {
        match serde_json::to_string_pretty(report) {
            Ok(output) => Self { exit_code, output },
            Err(error) => Self::failure(command, FailureClass::Serialization, error.to_string()),
        }
    }

    pub fn failure(command: &str, class: FailureClass, message: impl Into<String>) -> Self {
        Self::build_failure(command, class, message.into(), None)
    }

    pub fn failure_at(
        command: &str,
        class: FailureClass,
        path: &Path,
        message: impl Into<String>,
    ) -> Self {
        Self::build_failure(command, class, message.into(), Some(path.display().to_string()))
    }

    fn build_failure(
        command: &str,
        class: FailureClass,
        message: String,
        path: Option<String>,
    ) -> Self {
        let payload =
            CommandFailure { command, status: "error", error_class: class, message, path };
        let output = serde_json::to_string(&payload).unwrap_or_else(|error| {
            format!(
                "{{\"command\":\"{command}\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });
        Self { exit_code: class.exit_code(), output }
    }
}
