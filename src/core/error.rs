use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigInvalidDescriptor,
    ConfigInvalidValue,

    ParamsTypeMismatch,
    ParamsMissing,
    ParamsInvalid,
    ParamsConflict,
    ParamsUnknown,

    PlatformUnsupported,

    RegistryActionNotFound,
    RegistryDelegateCycle,
    RegistryDuplicateName,

    ToolCommandFailed,

    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigInvalidDescriptor => "config.invalid_descriptor",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ParamsTypeMismatch => "params.type_mismatch",
            ErrorCode::ParamsMissing => "params.missing",
            ErrorCode::ParamsInvalid => "params.invalid",
            ErrorCode::ParamsConflict => "params.conflict",
            ErrorCode::ParamsUnknown => "params.unknown",

            ErrorCode::PlatformUnsupported => "platform.unsupported",

            ErrorCode::RegistryActionNotFound => "registry.action_not_found",
            ErrorCode::RegistryDelegateCycle => "registry.delegate_cycle",
            ErrorCode::RegistryDuplicateName => "registry.duplicate_name",

            ErrorCode::ToolCommandFailed => "tool.command_failed",

            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }

    /// Coarse failure taxonomy: who has to act on this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::ConfigInvalidDescriptor
            | ErrorCode::ConfigInvalidValue
            | ErrorCode::ParamsTypeMismatch
            | ErrorCode::RegistryActionNotFound
            | ErrorCode::RegistryDelegateCycle
            | ErrorCode::RegistryDuplicateName => ErrorKind::Configuration,

            ErrorCode::ParamsMissing
            | ErrorCode::ParamsInvalid
            | ErrorCode::ParamsConflict
            | ErrorCode::ParamsUnknown
            | ErrorCode::PlatformUnsupported => ErrorKind::User,

            ErrorCode::ToolCommandFailed => ErrorKind::Tool,

            ErrorCode::InternalUnexpected => ErrorKind::Internal,
        }
    }
}

/// User errors are bad input or state, tool failures are external commands
/// exiting non-zero, configuration errors are programmer mistakes in action
/// or descriptor setup. All three abort the current step; none is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    User,
    Tool,
    Configuration,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingParamDetails {
    pub key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidParamDetails {
    pub key: String,
    /// None when the parameter is sensitive; the offending value is redacted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMismatchDetails {
    pub key: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictingParamsDetails {
    pub key: String,
    pub conflicts_with: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnknownParamDetails {
    pub key: String,
    pub available: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidDescriptorDetails {
    pub key: String,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionNotFoundDetails {
    pub name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateCycleDetails {
    pub chain: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformUnsupportedDetails {
    pub action: String,
    pub platform: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    pub fn params_missing(key: impl Into<String>) -> Self {
        let key = key.into();
        let details = serde_json::to_value(MissingParamDetails { key: key.clone() })
            .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(
            ErrorCode::ParamsMissing,
            format!("No value found for required parameter '{}'", key),
            details,
        )
    }

    pub fn params_invalid(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let problem = problem.into();
        let details = serde_json::to_value(InvalidParamDetails {
            key: key.clone(),
            value,
            problem: problem.clone(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(
            ErrorCode::ParamsInvalid,
            format!("Invalid value for parameter '{}': {}", key, problem),
            details,
        )
    }

    pub fn params_type_mismatch(
        key: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let expected = expected.into();
        let actual = actual.into();
        let details = serde_json::to_value(TypeMismatchDetails {
            key: key.clone(),
            expected: expected.clone(),
            actual: actual.clone(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(
            ErrorCode::ParamsTypeMismatch,
            format!(
                "Parameter '{}' expects type {} but got {}",
                key, expected, actual
            ),
            details,
        )
    }

    pub fn params_conflict(key: impl Into<String>, conflicts_with: impl Into<String>) -> Self {
        let key = key.into();
        let conflicts_with = conflicts_with.into();
        let details = serde_json::to_value(ConflictingParamsDetails {
            key: key.clone(),
            conflicts_with: conflicts_with.clone(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(
            ErrorCode::ParamsConflict,
            format!(
                "Unresolved conflict between parameters '{}' and '{}'",
                key, conflicts_with
            ),
            details,
        )
        .with_hint("Supply at most one of the conflicting parameters")
    }

    pub fn params_unknown(key: impl Into<String>, available: Vec<String>) -> Self {
        let key = key.into();
        let details = serde_json::to_value(UnknownParamDetails {
            key: key.clone(),
            available: available.clone(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(
            ErrorCode::ParamsUnknown,
            format!("Unknown parameter '{}'", key),
            details,
        )
        .with_hint(format!("Available parameters: {}", available.join(", ")))
    }

    pub fn config_invalid_descriptor(key: impl Into<String>, problem: impl Into<String>) -> Self {
        let key = key.into();
        let problem = problem.into();
        let details = serde_json::to_value(InvalidDescriptorDetails {
            key: key.clone(),
            problem: problem.clone(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(
            ErrorCode::ConfigInvalidDescriptor,
            format!("Invalid parameter descriptor '{}': {}", key, problem),
            details,
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let key = key.into();
        let problem = problem.into();
        let details = serde_json::to_value(InvalidParamDetails {
            key: key.clone(),
            value,
            problem: problem.clone(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid configuration value for '{}': {}", key, problem),
            details,
        )
    }

    pub fn action_not_found(name: impl Into<String>) -> Self {
        let name = name.into();
        let details = serde_json::to_value(ActionNotFoundDetails { name: name.clone() })
            .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(
            ErrorCode::RegistryActionNotFound,
            format!("Could not find action '{}'", name),
            details,
        )
    }

    pub fn delegate_cycle(chain: Vec<String>) -> Self {
        let rendered = chain.join(" -> ");
        let details = serde_json::to_value(DelegateCycleDetails { chain })
            .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(
            ErrorCode::RegistryDelegateCycle,
            format!("Delegate chain contains a cycle: {}", rendered),
            details,
        )
    }

    pub fn duplicate_name(name: impl Into<String>) -> Self {
        let name = name.into();
        let details = serde_json::to_value(ActionNotFoundDetails { name: name.clone() })
            .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(
            ErrorCode::RegistryDuplicateName,
            format!("An action named '{}' is already registered", name),
            details,
        )
    }

    pub fn platform_unsupported(action: impl Into<String>, platform: impl Into<String>) -> Self {
        let action = action.into();
        let platform = platform.into();
        let details = serde_json::to_value(PlatformUnsupportedDetails {
            action: action.clone(),
            platform: platform.clone(),
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(
            ErrorCode::PlatformUnsupported,
            format!(
                "Action '{}' does not support platform '{}'",
                action, platform
            ),
            details,
        )
    }

    pub fn tool_command_failed(details: ToolCommandFailedDetails) -> Self {
        let message = format!(
            "Command '{}' exited with status {}",
            details.command, details.exit_code
        );
        let details =
            serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(ErrorCode::ToolCommandFailed, message, details)
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_render_dotted_strings() {
        assert_eq!(ErrorCode::ParamsMissing.as_str(), "params.missing");
        assert_eq!(
            ErrorCode::RegistryDelegateCycle.as_str(),
            "registry.delegate_cycle"
        );
    }

    #[test]
    fn kinds_follow_the_taxonomy() {
        assert_eq!(ErrorCode::ParamsMissing.kind(), ErrorKind::User);
        assert_eq!(ErrorCode::ToolCommandFailed.kind(), ErrorKind::Tool);
        assert_eq!(
            ErrorCode::ParamsTypeMismatch.kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn missing_param_names_the_key() {
        let err = Error::params_missing("api_token");
        assert_eq!(err.code.as_str(), "params.missing");
        assert!(err.message.contains("api_token"));
        assert_eq!(err.details["key"], "api_token");
    }

    #[test]
    fn hints_accumulate() {
        let err = Error::action_not_found("gmy").with_hint("Did you mean 'gym'?");
        assert_eq!(err.hints.len(), 1);
    }
}
