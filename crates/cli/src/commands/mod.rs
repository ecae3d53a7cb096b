pub mod config;
pub mod doctor;
pub mod probe;

use serde::Serialize;

/// What a command prints and the process exit code.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct FailureOutcome<'a> {
    command: &'a str,
    status: &'static str,
    error_class: &'a str,
    message: String,
}

impl CommandResult {
    pub fn text(output: impl Into<String>, exit_code: u8) -> Self {
        Self { exit_code, output: output.into() }
    }

    /// Pretty JSON; a payload that cannot be encoded becomes a
    /// `serialization` failure with exit code 2.
    pub fn json<T: Serialize>(command: &str, payload: &T, exit_code: u8) -> Self {
        match serde_json::to_string_pretty(payload) {
            Ok(output) => Self { exit_code, output },
            Err(error) => Self::failure(command, "serialization", error.to_string(), 2),
        }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload =
            FailureOutcome { command, status: "error", error_class, message: message.into() };
        let output = serde_json::to_string(&payload).unwrap_or_else(|_| {
            format!("{{\"command\":\"{command}\",\"status\":\"error\",\"error_class\":\"{error_class}\"}}")
        });
        Self { exit_code, output }
    }
}
