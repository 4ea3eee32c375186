// External imports
use ethers::types::Filter;

// Standard library imports
use std::{sync::Arc, time::Duration};

// Internal imports
use crate::chain_adapters::{ChainError, EndpointSelector, RetryConfig, RpcError, SelectorConfig};
use crate::tests::fake_chain::{FakeChain, FakeEndpoint, FakeFactory};

// Third party imports
use tokio::time::{self, Instant};

fn endpoints(names: &[&str]) -> Vec<Arc<FakeEndpoint>> {
    names.iter().map(|name| FakeEndpoint::new(name)).collect()
}

fn selector_with(endpoints: &[Arc<FakeEndpoint>], config: SelectorConfig) -> EndpointSelector {
    let factory = FakeFactory::new(FakeChain::new(1_000), endpoints.to_vec());
    EndpointSelector::new(factory.urls(), factory, config)
}

fn selector(endpoints: &[Arc<FakeEndpoint>]) -> EndpointSelector {
    selector_with(endpoints, SelectorConfig::default())
}

async fn fetch_logs(selector: &mut EndpointSelector, max_attempts: u32) -> Result<usize, RpcError> {
    let filter = Filter::new().from_block(0u64).to_block(10u64);
    selector
        .execute_with_retry("get_logs", max_attempts, |client| {
            let filter = filter.clone();
            async move { client.get_logs(&filter).await.map(|logs| logs.len()) }
        })
        .await
}

#[tokio::test(start_paused = true)]
async fn test_acquire_prefers_first_healthy_endpoint() {
    let eps = endpoints(&["a", "b"]);
    let mut selector = selector(&eps);

    let client = selector.acquire().await.unwrap();
    assert_eq!(client.url(), "a");
    assert_eq!(selector.current_url(), Some("a"));

    // Handle được cache, không probe lại
    selector.acquire().await.unwrap();
    assert_eq!(eps[0].probes(), 1);
    assert_eq!(eps[1].probes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_acquire_skips_dead_endpoint() {
    let eps = endpoints(&["a", "b"]);
    eps[0].set_down(true);
    let mut selector = selector(&eps);

    let client = selector.acquire().await.unwrap();
    assert_eq!(client.url(), "b");
    assert!(selector.is_failed("a"));
    assert!(!selector.is_failed("b"));
}

#[tokio::test(start_paused = true)]
async fn test_failed_endpoint_excluded_until_reset_interval() {
    let eps = endpoints(&["a", "b"]);
    eps[0].fail_probes(1);
    let mut selector = selector(&eps);

    assert_eq!(selector.acquire().await.unwrap().url(), "b");

    // A đã lỗi, B bị đánh dấu lỗi: không còn endpoint nào trong khoảng reset
    selector.mark_failed("b");
    assert!(matches!(
        selector.acquire().await,
        Err(RpcError::AllEndpointsUnavailable { endpoints: 2 })
    ));
    time::advance(Duration::from_secs(599)).await;
    assert!(selector.acquire().await.is_err());
    assert_eq!(eps[0].probes(), 1);

    time::advance(Duration::from_secs(1)).await;
    let client = selector.acquire().await.unwrap();
    assert_eq!(client.url(), "a");
    assert!(!selector.is_failed("b"));
}

#[tokio::test(start_paused = true)]
async fn test_mark_failed_advances_past_bound_endpoint() {
    let eps = endpoints(&["a", "b", "c"]);
    let mut selector = selector(&eps);

    assert_eq!(selector.acquire().await.unwrap().url(), "a");
    selector.mark_failed("a");
    assert_eq!(selector.current_url(), None);
    assert_eq!(selector.acquire().await.unwrap().url(), "b");

    // URL lạ bị bỏ qua
    selector.mark_failed("zzz");
    assert_eq!(selector.current_url(), Some("b"));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_url_marked_failed_during_probe() {
    let eps = endpoints(&["b"]);
    let factory = FakeFactory::new(FakeChain::new(1), eps.clone());
    let mut selector = EndpointSelector::new(
        vec!["missing".to_string(), "b".to_string()],
        factory,
        SelectorConfig::default(),
    );

    assert_eq!(selector.acquire().await.unwrap().url(), "b");
    assert!(selector.is_failed("missing"));
}

#[tokio::test(start_paused = true)]
async fn test_empty_pool() {
    let mut selector = selector(&[]);
    assert!(matches!(selector.acquire().await, Err(RpcError::EmptyPool)));
    assert!(matches!(fetch_logs(&mut selector, 3).await, Err(RpcError::EmptyPool)));
}

#[tokio::test(start_paused = true)]
async fn test_execute_fails_over_with_linear_delay() {
    let eps = endpoints(&["a", "b"]);
    eps[0].fail_calls(1);
    let mut selector = selector(&eps);

    let started = Instant::now();
    assert_eq!(fetch_logs(&mut selector, 3).await.unwrap(), 0);

    assert_eq!(started.elapsed(), Duration::from_secs(2));
    assert_eq!(selector.current_url(), Some("b"));
    assert!(selector.is_failed("a"));
}

#[tokio::test(start_paused = true)]
async fn test_execute_exhausts_attempts() {
    let eps = endpoints(&["a", "b", "c", "d"]);
    for ep in &eps {
        ep.fail_calls(1);
    }
    let mut selector = selector(&eps);

    let started = Instant::now();
    let err = fetch_logs(&mut selector, 3).await.unwrap_err();

    match err {
        RpcError::RetriesExhausted {
            operation,
            attempts,
            source,
        } => {
            assert_eq!(operation, "get_logs");
            assert_eq!(attempts, 3);
            assert!(matches!(source, ChainError::Connection { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    // 1 × 2s + 2 × 2s
    assert_eq!(started.elapsed(), Duration::from_secs(6));
    assert_eq!(eps[3].calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_outage_is_bounded() {
    let eps = endpoints(&["a", "b"]);
    for ep in &eps {
        ep.set_down(true);
    }
    let config = SelectorConfig {
        retry: RetryConfig {
            max_outage_waits: 3,
            ..RetryConfig::default()
        },
        ..SelectorConfig::default()
    };
    let mut selector = selector_with(&eps, config);

    let started = Instant::now();
    let err = fetch_logs(&mut selector, 3).await.unwrap_err();

    assert!(matches!(err, RpcError::PoolExhausted { waits: 3, .. }));
    // 30s + 60s + 120s
    assert_eq!(started.elapsed(), Duration::from_secs(210));
    // Chưa tới 600s nên không endpoint nào được probe lại
    assert_eq!(eps[0].probes(), 1);
    assert_eq!(eps[1].probes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_recovered_endpoint_reprobed_before_pool_exhausted() {
    let eps = endpoints(&["a", "b"]);
    for ep in &eps {
        ep.set_down(true);
    }
    // Tổng thời gian chờ 210s, danh sách lỗi được xóa sau 60s
    let config = SelectorConfig {
        failed_reset_interval: Duration::from_secs(60),
        retry: RetryConfig {
            max_outage_waits: 3,
            ..RetryConfig::default()
        },
        ..SelectorConfig::default()
    };
    assert!(config.outage_covers_reset());
    let mut selector = selector_with(&eps, config);

    let recovering = eps[1].clone();
    let task = tokio::spawn(async move {
        let started = Instant::now();
        let result = fetch_logs(&mut selector, 3).await;
        (result, selector.current_url().map(str::to_string), started.elapsed())
    });

    time::sleep(Duration::from_secs(10)).await;
    recovering.set_down(false);

    let (result, url, elapsed) = task.await.unwrap();
    assert_eq!(result.unwrap(), 0);
    assert_eq!(url.as_deref(), Some("b"));
    // Lần chờ 30s chưa tới reset, lần chờ 60s thì tới: B được probe lại ở giây 90
    assert_eq!(elapsed, Duration::from_secs(90));
    assert_eq!(eps[1].probes(), 2);
    assert_eq!(eps[0].probes(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_outage() {
    let eps = endpoints(&["a", "b"]);
    for ep in &eps {
        ep.set_down(true);
    }
    let mut selector = selector(&eps);

    let recovering = eps[1].clone();
    let task = tokio::spawn(async move {
        let result = fetch_logs(&mut selector, 3).await;
        (result, selector.current_url().map(str::to_string))
    });

    time::sleep(Duration::from_secs(100)).await;
    recovering.set_down(false);

    let (result, url) = task.await.unwrap();
    assert_eq!(result.unwrap(), 0);
    assert_eq!(url.as_deref(), Some("b"));
}
