// Standard library imports
use std::time::Duration;

// Third party imports
use backoff::{backoff::Backoff, ExponentialBackoff, ExponentialBackoffBuilder};

/// Cấu hình retry cho các thao tác RPC
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Đơn vị chờ tuyến tính giữa các lần thử (lần thử × đơn vị)
    pub retry_unit: Duration,
    /// Thời gian chờ đầu tiên khi toàn bộ pool không khả dụng
    pub outage_initial: Duration,
    /// Hệ số nhân cho mỗi lần chờ outage
    pub outage_multiplier: f64,
    /// Thời gian chờ outage tối đa
    pub outage_max_interval: Duration,
    /// Số lần chờ outage tối đa trước khi báo lỗi
    pub max_outage_waits: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_unit: Duration::from_secs(2),
            outage_initial: Duration::from_secs(30),
            outage_multiplier: 2.0,
            outage_max_interval: Duration::from_secs(300),
            max_outage_waits: 5,
        }
    }
}

impl RetryConfig {
    /// Backoff lũy thừa khi toàn bộ pool hỏng: không jitter, không giới hạn tổng thời gian
    pub fn outage_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.outage_initial)
            .with_multiplier(self.outage_multiplier)
            .with_max_interval(self.outage_max_interval)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build()
    }

    /// Tổng thời gian chờ của mọi lần chờ outage trước khi trả về `PoolExhausted`
    pub fn total_outage_wait(&self) -> Duration {
        let mut backoff = self.outage_backoff();
        (0..self.max_outage_waits)
            .map(|_| backoff.next_backoff().unwrap_or(self.outage_max_interval))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    /// Thời gian chờ sau lần thử thứ `attempt` (bắt đầu từ 1)
    pub fn linear_delay(&self, attempt: u32) -> Duration {
        self.retry_unit.saturating_mul(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_delay() {
        let config = RetryConfig::default();
        assert_eq!(config.linear_delay(1), Duration::from_secs(2));
        assert_eq!(config.linear_delay(3), Duration::from_secs(6));
    }

    #[test]
    fn test_outage_backoff_doubles_and_caps() {
        let config = RetryConfig {
            outage_initial: Duration::from_secs(30),
            outage_max_interval: Duration::from_secs(100),
            ..RetryConfig::default()
        };
        let mut backoff = config.outage_backoff();
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(30)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(60)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(100)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(100)));
    }

    #[test]
    fn test_total_outage_wait() {
        assert_eq!(RetryConfig::default().total_outage_wait(), Duration::from_secs(750));

        let short = RetryConfig {
            max_outage_waits: 3,
            ..RetryConfig::default()
        };
        assert_eq!(short.total_outage_wait(), Duration::from_secs(210));

        let none = RetryConfig {
            max_outage_waits: 0,
            ..RetryConfig::default()
        };
        assert_eq!(none.total_outage_wait(), Duration::ZERO);
    }
}
