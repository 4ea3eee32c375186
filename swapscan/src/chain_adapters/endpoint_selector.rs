// Standard library imports
use std::{collections::HashSet, future::Future, sync::Arc, time::Duration};

// Internal imports
use crate::chain_adapters::{
    interfaces::{ChainClient, ChainError, ClientFactory, RpcError},
    retry::RetryConfig,
};

// Third party imports
use backoff::backoff::Backoff;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Cấu hình cho bộ chọn endpoint
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Khoảng thời gian xóa danh sách endpoint lỗi
    pub failed_reset_interval: Duration,
    /// Thời gian chờ tối đa cho lệnh kiểm tra endpoint
    pub probe_timeout: Duration,
    /// Cấu hình retry
    pub retry: RetryConfig,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            failed_reset_interval: Duration::from_secs(600), // 10 phút
            probe_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }
}

impl SelectorConfig {
    /// Tổng thời gian chờ outage đủ dài để danh sách lỗi được xóa ít nhất một lần,
    /// nếu không thì `PoolExhausted` xảy ra trước khi endpoint nào được kiểm tra lại
    pub fn outage_covers_reset(&self) -> bool {
        self.retry.total_outage_wait() >= self.failed_reset_interval
    }
}

/// Endpoint đang được dùng
struct BoundEndpoint {
    index: usize,
    client: Arc<dyn ChainClient>,
}

/// Chọn một RPC endpoint còn sống từ danh sách, xoay vòng khi gặp lỗi
pub struct EndpointSelector {
    /// Danh sách URL theo thứ tự ưu tiên
    endpoints: Vec<String>,
    /// Các endpoint đang bị đánh dấu lỗi (theo index)
    failed: HashSet<usize>,
    /// Vị trí bắt đầu tìm endpoint tiếp theo
    cursor: usize,
    /// Lần cuối xóa danh sách lỗi
    last_reset: Instant,
    current: Option<BoundEndpoint>,
    factory: Arc<dyn ClientFactory>,
    config: SelectorConfig,
}

impl EndpointSelector {
    pub fn new(
        endpoints: Vec<String>,
        factory: Arc<dyn ClientFactory>,
        config: SelectorConfig,
    ) -> Self {
        info!("Initialized endpoint selector with {} RPC endpoints", endpoints.len());
        if !config.outage_covers_reset() {
            warn!(
                "Outage waits total {:?}, shorter than the failed endpoint reset interval {:?}",
                config.retry.total_outage_wait(),
                config.failed_reset_interval
            );
        }
        Self {
            endpoints,
            failed: HashSet::new(),
            cursor: 0,
            last_reset: Instant::now(),
            current: None,
            factory,
            config,
        }
    }

    /// URL của endpoint đang được dùng
    pub fn current_url(&self) -> Option<&str> {
        self.current.as_ref().map(|bound| self.endpoints[bound.index].as_str())
    }

    /// Kiểm tra endpoint có đang bị đánh dấu lỗi không
    pub fn is_failed(&self, url: &str) -> bool {
        self.endpoints
            .iter()
            .enumerate()
            .any(|(index, endpoint)| endpoint == url && self.failed.contains(&index))
    }

    fn reset_failed_if_due(&mut self) {
        if self.last_reset.elapsed() >= self.config.failed_reset_interval {
            if !self.failed.is_empty() {
                info!("Clearing {} failed RPC endpoints after reset interval", self.failed.len());
            }
            self.failed.clear();
            self.last_reset = Instant::now();
        }
    }

    /// Lấy client của một endpoint còn sống.
    ///
    /// Bắt đầu từ `cursor`, bỏ qua endpoint đã lỗi, kiểm tra bằng `block_number()`.
    /// Endpoint không phản hồi bị đánh dấu lỗi và bỏ qua. Hết danh sách thì trả về
    /// `AllEndpointsUnavailable`.
    pub async fn acquire(&mut self) -> Result<Arc<dyn ChainClient>, RpcError> {
        if self.endpoints.is_empty() {
            return Err(RpcError::EmptyPool);
        }

        self.reset_failed_if_due();

        if let Some(bound) = &self.current {
            if !self.failed.contains(&bound.index) {
                return Ok(bound.client.clone());
            }
            self.current = None;
        }

        let total = self.endpoints.len();
        for step in 0..total {
            let index = (self.cursor + step) % total;
            if self.failed.contains(&index) {
                continue;
            }

            let url = self.endpoints[index].clone();
            match self.probe(&url).await {
                Ok(client) => {
                    info!("Using RPC endpoint {}", url);
                    self.cursor = index;
                    self.current = Some(BoundEndpoint {
                        index,
                        client: client.clone(),
                    });
                    return Ok(client);
                }
                Err(e) => {
                    warn!("RPC endpoint {} failed liveness probe: {}", url, e);
                    self.failed.insert(index);
                }
            }
        }

        self.cursor = (self.cursor + 1) % total;
        Err(RpcError::AllEndpointsUnavailable { endpoints: total })
    }

    async fn probe(&self, url: &str) -> Result<Arc<dyn ChainClient>, ChainError> {
        let client = self.factory.connect(url)?;
        match tokio::time::timeout(self.config.probe_timeout, client.block_number()).await {
            Ok(Ok(head)) => {
                debug!("Probe of {} succeeded at block {}", url, head);
                Ok(client)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ChainError::Timeout {
                url: url.to_string(),
                timeout_ms: self.config.probe_timeout.as_millis() as u64,
            }),
        }
    }

    /// Đánh dấu endpoint lỗi; nếu đang dùng thì bỏ cache và chuyển cursor sang endpoint sau
    pub fn mark_failed(&mut self, url: &str) {
        let Some(index) = self.endpoints.iter().position(|endpoint| endpoint == url) else {
            return;
        };

        self.failed.insert(index);
        if self.current.as_ref().map(|bound| bound.index) == Some(index) {
            self.current = None;
            self.cursor = (index + 1) % self.endpoints.len();
        }
    }

    /// Thực hiện thao tác RPC với retry và xoay vòng endpoint.
    ///
    /// Lỗi thường: đánh dấu endpoint lỗi, chờ `attempt × retry_unit`, thử lại tối đa
    /// `max_attempts` lần. Toàn bộ pool hỏng: chờ theo backoff lũy thừa rồi bắt đầu lại
    /// với số lần thử mới, tối đa `max_outage_waits` lần, sau đó trả về `PoolExhausted`.
    pub async fn execute_with_retry<T, F, Fut>(
        &mut self,
        operation_name: &str,
        max_attempts: u32,
        mut operation: F,
    ) -> Result<T, RpcError>
    where
        F: FnMut(Arc<dyn ChainClient>) -> Fut,
        Fut: Future<Output = Result<T, ChainError>>,
    {
        let max_attempts = max_attempts.max(1);
        let mut outage_backoff = self.config.retry.outage_backoff();
        let mut outage_waits = 0u32;
        let mut attempt = 1u32;

        loop {
            let client = match self.acquire().await {
                Ok(client) => client,
                Err(RpcError::AllEndpointsUnavailable { endpoints }) => {
                    if outage_waits >= self.config.retry.max_outage_waits {
                        return Err(RpcError::PoolExhausted {
                            operation: operation_name.to_string(),
                            waits: outage_waits,
                        });
                    }
                    outage_waits += 1;

                    let wait = outage_backoff
                        .next_backoff()
                        .unwrap_or(self.config.retry.outage_max_interval);
                    warn!(
                        "All {} RPC endpoints unavailable during '{}', waiting {:?} ({}/{})",
                        endpoints,
                        operation_name,
                        wait,
                        outage_waits,
                        self.config.retry.max_outage_waits
                    );

                    let until_reset = self
                        .config
                        .failed_reset_interval
                        .saturating_sub(self.last_reset.elapsed());
                    if wait < until_reset {
                        info!(
                            "Failed endpoints stay excluded for another {:?}, \
                             no probe after this wait",
                            until_reset
                        );
                    }
                    tokio::time::sleep(wait).await;
                    attempt = 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            match operation(client.clone()).await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("'{}' succeeded after {} attempts", operation_name, attempt);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    self.mark_failed(client.url());

                    if attempt >= max_attempts {
                        warn!("'{}' failed after {} attempts: {}", operation_name, attempt, e);
                        return Err(RpcError::RetriesExhausted {
                            operation: operation_name.to_string(),
                            attempts: attempt,
                            source: e,
                        });
                    }

                    let delay = self.config.retry.linear_delay(attempt);
                    warn!(
                        "'{}' failed on {} (attempt {}/{}), retrying in {:?}: {}",
                        operation_name,
                        client.url(),
                        attempt,
                        max_attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
