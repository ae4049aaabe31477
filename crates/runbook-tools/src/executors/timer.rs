//! Timer blocks.

use crate::block::TimerConfig;
use crate::result::BlockResult;

/// Suspend for the configured duration. Always succeeds.
pub async fn execute(config: &TimerConfig) -> BlockResult {
    let wait = config.wait();
    tracing::info!(seconds = wait.as_secs_f64(), "Pausing for timer block");
    tokio::time::sleep(wait).await;
    BlockResult::success(
        format!("Timer finished after {} seconds.", config.display_duration()),
        0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_timer_waits_and_reports_duration() {
        let start = Instant::now();
        let result = execute(&TimerConfig { duration: 5.0 }).await;

        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(result.is_success());
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("5 seconds"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_negative_duration_returns_immediately() {
        let start = Instant::now();
        let result = execute(&TimerConfig { duration: -1.0 }).await;

        assert!(start.elapsed() < Duration::from_millis(1));
        assert!(result.is_success());
    }
}
