//! Block execution result types.

use serde::{Deserialize, Serialize};

/// Status of a block execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockStatus {
    /// Block executed successfully.
    Success,
    /// Block failed, was misconfigured, or could not be attempted.
    Error,
}

impl BlockStatus {
    /// Returns true if the status indicates success.
    pub fn is_success(&self) -> bool {
        matches!(self, BlockStatus::Success)
    }
}

impl std::fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockStatus::Success => write!(f, "success"),
            BlockStatus::Error => write!(f, "error"),
        }
    }
}

/// Result of executing one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockResult {
    /// Execution status.
    pub status: BlockStatus,

    /// Captured output or a description of what went wrong. Never contains NUL.
    pub output: String,

    /// Process exit code, HTTP status code, or -1 when nothing ran.
    pub exit_code: i32,
}

impl BlockResult {
    /// Create a successful result.
    pub fn success(output: impl Into<String>, exit_code: i32) -> Self {
        Self {
            status: BlockStatus::Success,
            output: sanitize_output(output.into()),
            exit_code,
        }
    }

    /// Create an error result.
    pub fn error(output: impl Into<String>, exit_code: i32) -> Self {
        Self {
            status: BlockStatus::Error,
            output: sanitize_output(output.into()),
            exit_code,
        }
    }

    /// Create an error result for a block that could not be attempted.
    pub fn not_attempted(output: impl Into<String>) -> Self {
        Self::error(output, -1)
    }

    /// Create a result from a process exit code; success iff the code is 0.
    pub fn from_exit_code(exit_code: i32, output: impl Into<String>) -> Self {
        if exit_code == 0 {
            Self::success(output, exit_code)
        } else {
            Self::error(output, exit_code)
        }
    }

    /// Returns true if the result indicates success.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Replace NUL with U+FFFD; text columns in the step store reject NUL.
fn sanitize_output(output: String) -> String {
    if output.contains('\0') {
        output.replace('\0', "\u{FFFD}")
    } else {
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_status_display() {
        assert_eq!(BlockStatus::Success.to_string(), "success");
        assert_eq!(BlockStatus::Error.to_string(), "error");
    }

    #[test]
    fn test_from_exit_code() {
        let ok = BlockResult::from_exit_code(0, "done");
        assert!(ok.is_success());
        assert_eq!(ok.exit_code, 0);

        let failed = BlockResult::from_exit_code(3, "boom");
        assert!(!failed.is_success());
        assert_eq!(failed.exit_code, 3);
    }

    #[test]
    fn test_not_attempted_uses_minus_one() {
        let result = BlockResult::not_attempted("Command block has no command configured.");
        assert_eq!(result.status, BlockStatus::Error);
        assert_eq!(result.exit_code, -1);
    }

    #[test]
    fn test_result_serialization() {
        let result = BlockResult::success("ok", 0);
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"status\":\"success\""));
        assert!(json.contains("\"exit_code\":0"));
    }

    #[test]
    fn test_nul_bytes_are_replaced() {
        let result = BlockResult::from_exit_code(0, "a\0b\0");
        assert_eq!(result.output, "a\u{FFFD}b\u{FFFD}");

        let result = BlockResult::not_attempted("bad\0input");
        assert!(!result.output.contains('\0'));
    }
}
