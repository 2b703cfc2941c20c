//! Exit codes following sysexits.h conventions.
//!
//! Scripts driving bulk imports can tell a bad input file apart from an
//! unreachable database without parsing stderr.

use aiiinotate_core::AiiinotateError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Input data is malformed (invalid JSON, annotation or manifest).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Service unavailable (database, manifest host).
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const UNAVAILABLE: i32 = 69;

/// Prefix of every error raised when an input path cannot be read.
pub const READ_FAILURE: &str = "Failed to read file";

/// Prefix of every error raised when an input file is not JSON.
pub const PARSE_FAILURE: &str = "Failed to parse JSON";

/// Represents an exit code with optional error context.
#[derive(Debug)]
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        let code = match err.downcast_ref::<AiiinotateError>() {
            Some(core) => Self::classify_core(core),
            None if message.contains(READ_FAILURE) => INPUT_ERROR,
            None if message.contains(PARSE_FAILURE) => DATA_ERROR,
            None if message.contains("database") || message.contains("Database") => UNAVAILABLE,
            None => GENERAL_ERROR,
        };

        Self {
            code,
            message: Some(message),
        }
    }

    fn classify_core(err: &AiiinotateError) -> i32 {
        match err {
            AiiinotateError::TargetResolution(_)
            | AiiinotateError::Normalization(_)
            | AiiinotateError::InvalidInput(_) => DATA_ERROR,
            AiiinotateError::Fetch(_)
            | AiiinotateError::Read(_)
            | AiiinotateError::Insert(_)
            | AiiinotateError::Update(_)
            | AiiinotateError::Delete(_) => UNAVAILABLE,
            AiiinotateError::NotFound(_) => GENERAL_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_success() {
        let exit = ExitCode::success();
        assert_eq!(exit.code, SUCCESS);
        assert!(exit.message.is_none());
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let err = std::fs::read("/nonexistent/annotation.json")
            .with_context(|| format!("{READ_FAILURE}: /nonexistent/annotation.json"))
            .unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, INPUT_ERROR);
    }

    #[test]
    fn test_core_errors_are_classified() {
        let err = anyhow::Error::new(AiiinotateError::TargetResolution("null target".into()));
        assert_eq!(ExitCode::from_anyhow(&err).code, DATA_ERROR);

        let err = anyhow::Error::new(AiiinotateError::NotFound("x".into()));
        assert_eq!(ExitCode::from_anyhow(&err).code, GENERAL_ERROR);
    }

    #[test]
    fn test_context_does_not_hide_core_error() {
        let err = Err::<(), _>(AiiinotateError::Normalization("bad list".into()))
            .context("Import of list.json failed")
            .unwrap_err();
        let exit = ExitCode::from_anyhow(&err);
        assert_eq!(exit.code, DATA_ERROR);
        assert!(exit.message.unwrap().contains("bad list"));
    }
}
