//! CLI Exit Codes
//!
//! Standard exit codes for automation. The two load-bearing values are 0
//! (clean operator-initiated exit) and 1 (connection failure); the rest
//! classify less common failures for scripts that care.

use std::process::ExitCode;

/// Exit code constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success / clean operator exit
    pub const SUCCESS: u8 = 0;

    /// Connection failure (port could not be opened)
    pub const CONNECTION_FAILED: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Operation timed out
    pub const TIMEOUT: u8 = 4;

    /// File not found
    pub const FILE_NOT_FOUND: u8 = 6;

    /// Filesystem failure (session directory, artifact write)
    pub const FILESYSTEM: u8 = 7;

    /// Transfer failed (decode error, device-reported error)
    pub const TRANSFER_FAILED: u8 = 10;

    /// Internal error
    pub const INTERNAL_ERROR: u8 = 127;
}

/// CLI operation result.
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    /// Plain success.
    pub fn success() -> Self {
        Self::Success(None)
    }

    /// Success carrying a final message.
    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self::Success(Some(msg.into()))
    }

    /// Error with an explicit code.
    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    /// Connection failure.
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::CONNECTION_FAILED, msg.into())
    }

    /// Timeout.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::TIMEOUT, msg.into())
    }

    /// Get exit code.
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) => Some(msg),
            Self::Error(_, msg) => Some(msg),
            Self::Success(None) => None,
        }
    }

    /// Convert to `ExitCode`.
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Exit code description.
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "Connection failed",
        2 => "Invalid arguments",
        4 => "Operation timed out",
        6 => "File not found",
        7 => "Filesystem failure",
        10 => "Transfer failed",
        127 => "Internal error",
        _ => "Unknown error",
    }
}
