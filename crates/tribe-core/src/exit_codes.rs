//! Exit codes for the `tribe` CLI.
//!
//! - 0: training finished (including a requested early stop)
//! - 2: bad input: arguments, configuration, trace file
//! - 3: training failed after workers started

use tribe_common::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Clean = 0,
    InputError = 2,
    TrainingFailed = 3,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Map an engine error onto the CLI contract.
    pub fn from_error(err: &Error) -> Self {
        if err.is_input_error() {
            ExitCode::InputError
        } else {
            ExitCode::TrainingFailed
        }
    }

    /// Stable name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK",
            ExitCode::InputError => "ERR_INPUT",
            ExitCode::TrainingFailed => "ERR_TRAINING",
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
