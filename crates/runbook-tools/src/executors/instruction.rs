//! Instruction blocks are notes for the operator.

use crate::result::BlockResult;

pub const ACKNOWLEDGED: &str = "Instruction acknowledged; no automated action required.";

pub fn execute() -> BlockResult {
    BlockResult::success(ACKNOWLEDGED, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_always_succeeds() {
        let result = execute();
        assert!(result.is_success());
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.output, ACKNOWLEDGED);
    }
}
