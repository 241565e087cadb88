//! Exit codes for the voi-core CLI.
//!
//! Ranges:
//! - 0: success
//! - 10-19: user/environment errors (fixable by the caller)
//! - 20-29: internal errors and resource limits

/// Process exit codes. A stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Computation finished and its result was printed.
    Clean = 0,

    /// Invalid arguments or input document.
    ArgsError = 10,
    /// Config file missing, unparseable or out of range.
    ConfigError = 11,

    /// Internal error (bug - please report).
    InternalError = 20,
    IoError = 21,
    /// `--timeout` elapsed; the computation was cancelled.
    TimeoutError = 22,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Clean
    }

    /// Codes 10-19.
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    /// Code name for JSON error payloads.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
            ExitCode::TimeoutError => "ERR_TIMEOUT",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
