//! Exit code constants for the neuroprompt CLI.
//!
//! # Exit Code Table
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Pipeline completed and the final artifact was produced |
//! | 1 | `INTERNAL` | General/internal failure |
//! | 2 | `CLI_ARGS` | Invalid CLI arguments, input or configuration |
//! | 3 | `GRAPH_INVALID` | Stage graph rejected before execution |
//! | 4 | `STAGE_FAILED` | A stage failed for a reason other than provider exhaustion |
//! | 10 | `STAGE_TIMEOUT` | A stage or request exceeded its timeout |
//! | 70 | `PROVIDERS_EXHAUSTED` | Every provider failed for one completion |
//! | 130 | `CANCELLED` | The run was cancelled (Ctrl-C) |

/// Exit codes matching the documented exit code table.
///
/// ```rust
/// use neuroprompt_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::PROVIDERS_EXHAUSTED, ExitCode::from_i32(70));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    /// Success - final artifact produced
    pub const SUCCESS: ExitCode = ExitCode(0);

    /// Internal error - general failure
    pub const INTERNAL: ExitCode = ExitCode(1);

    /// CLI arguments error - invalid arguments, input or configuration
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Graph invalid - duplicate stage, unknown dependency or cycle
    pub const GRAPH_INVALID: ExitCode = ExitCode(3);

    /// Stage failed - a stage returned an error
    pub const STAGE_FAILED: ExitCode = ExitCode(4);

    /// Stage timeout - stage or request exceeded its configured timeout
    pub const STAGE_TIMEOUT: ExitCode = ExitCode(10);

    /// Providers exhausted - every provider failed for one completion
    pub const PROVIDERS_EXHAUSTED: ExitCode = ExitCode(70);

    /// Cancelled - the run was interrupted
    pub const CANCELLED: ExitCode = ExitCode(130);

    /// Get the numeric exit code value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Create an ExitCode from a raw i32 value.
    ///
    /// Prefer using the named constants when possible.
    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        // Process exit statuses are truncated to a byte on every supported platform.
        std::process::ExitCode::from(code.0.clamp(0, 255) as u8)
    }
}
