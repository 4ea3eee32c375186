// Public modules
pub mod endpoint_selector;
pub mod ethereum;
pub mod interfaces;
pub mod retry;

#[cfg(test)]
mod tests;

// Public re-exports
pub use {
    endpoint_selector::{EndpointSelector, SelectorConfig},
    ethereum::{EthersClient, HttpClientFactory},
    interfaces::{ChainClient, ChainError, ClientFactory, RpcError},
    retry::RetryConfig,
};
