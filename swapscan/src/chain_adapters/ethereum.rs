// External imports
use ethers::{
    providers::{Http, Middleware, Provider, ProviderError},
    types::{BlockNumber, Filter, Log, U64},
};

// Standard library imports
use std::{future::Future, sync::Arc, time::Duration};

// Internal imports
use crate::chain_adapters::interfaces::{ChainClient, ChainError, ClientFactory};

// Third party imports
use async_trait::async_trait;
use tracing::debug;

/// Client HTTP dựa trên ethers cho một endpoint
#[derive(Debug, Clone)]
pub struct EthersClient {
    url: String,
    provider: Provider<Http>,
    request_timeout: Duration,
}

impl EthersClient {
    pub fn new(url: &str, request_timeout: Duration) -> Result<Self, ChainError> {
        let provider = Provider::<Http>::try_from(url).map_err(|e| ChainError::InvalidEndpoint {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            url: url.to_string(),
            provider,
            request_timeout,
        })
    }

    async fn with_timeout<T, F>(&self, request: F) -> Result<T, ChainError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        match tokio::time::timeout(self.request_timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(classify_provider_error(&self.url, e)),
            Err(_) => Err(ChainError::Timeout {
                url: self.url.clone(),
                timeout_ms: self.request_timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl ChainClient for EthersClient {
    fn url(&self) -> &str {
        &self.url
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        let number = self.with_timeout(self.provider.get_block_number()).await?;
        Ok(number.as_u64())
    }

    async fn get_logs(&self, filter: &Filter) -> Result<Vec<Log>, ChainError> {
        let logs = self.with_timeout(self.provider.get_logs(filter)).await?;
        debug!("{} returned {} logs", self.url, logs.len());
        Ok(logs)
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64, ChainError> {
        let block = self
            .with_timeout(self.provider.get_block(BlockNumber::Number(U64::from(number))))
            .await?
            .ok_or(ChainError::BlockNotFound(number))?;
        Ok(block.timestamp.as_u64())
    }
}

/// Phân loại lỗi provider theo nội dung thông báo
pub fn classify_provider_error(url: &str, error: ProviderError) -> ChainError {
    let message = error.to_string();
    let lowercase = message.to_lowercase();

    if lowercase.contains("rate limit")
        || lowercase.contains("too many requests")
        || lowercase.contains("429")
    {
        ChainError::RateLimited(url.to_string())
    } else if lowercase.contains("timeout") || lowercase.contains("timed out") {
        ChainError::Timeout {
            url: url.to_string(),
            timeout_ms: 0,
        }
    } else {
        ChainError::Connection {
            url: url.to_string(),
            message,
        }
    }
}

/// Factory tạo `EthersClient` qua HTTP
#[derive(Debug, Clone)]
pub struct HttpClientFactory {
    request_timeout: Duration,
}

impl HttpClientFactory {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl ClientFactory for HttpClientFactory {
    fn connect(&self, url: &str) -> Result<Arc<dyn ChainClient>, ChainError> {
        Ok(Arc::new(EthersClient::new(url, self.request_timeout)?))
    }
}
