//! RPC endpoint builder.
//!
//! Provides a fluent builder API for configuring an [`RpcEndpoint`].

use crate::{ErrorCodec, Result, RpcConfig, RpcEndpoint, RpcError, TransportPtr};
use std::sync::Arc;

/// Builder for creating RPC endpoints.
///
/// # Example
///
/// ```
/// use chanrpc::{JsonErrorCodec, MemoryBus, RpcEndpointBuilder, TransportConfig};
///
/// # async fn example() -> chanrpc::Result<()> {
/// let transport =
///     chanrpc::create_memory_transport_with_bus(TransportConfig::hub(), MemoryBus::new()).await?;
///
/// let endpoint = RpcEndpointBuilder::new(transport)
///     .channel_prefix("%editor")
///     .error_codec(JsonErrorCodec)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct RpcEndpointBuilder {
    // ---
    transport: TransportPtr,
    config: Option<RpcConfig>,
    channel_prefix: Option<Arc<str>>,
    codec: Option<Arc<dyn ErrorCodec>>,
}

impl RpcEndpointBuilder {
    /// Create a new endpoint builder for the given transport attachment.
    pub fn new(transport: TransportPtr) -> Self {
        // ---
        Self {
            transport,
            config: None,
            channel_prefix: None,
            codec: None,
        }
    }

    /// Start from an explicit configuration.
    pub fn config(mut self, config: RpcConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the channel namespace prefix.
    ///
    /// Default: `"%chanrpc"`.
    pub fn channel_prefix(mut self, prefix: impl Into<Arc<str>>) -> Self {
        self.channel_prefix = Some(prefix.into());
        self
    }

    /// Use a custom error codec.
    ///
    /// Default: [`JsonErrorCodec`](crate::JsonErrorCodec).
    pub fn error_codec(mut self, codec: impl ErrorCodec + 'static) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    /// Build the endpoint (consumes self).
    ///
    /// # Errors
    ///
    /// Returns `RpcError::InvalidConfig` if the channel prefix is empty.
    pub fn build(self) -> Result<RpcEndpoint> {
        // ---
        let mut config = self.config.unwrap_or_default();
        if let Some(prefix) = self.channel_prefix {
            config.channel_prefix = prefix;
        }

        if config.channel_prefix.trim().is_empty() {
            return Err(RpcError::InvalidConfig(
                "channel prefix must not be empty".into(),
            ));
        }

        let codec = self
            .codec
            .unwrap_or_else(|| Arc::new(crate::JsonErrorCodec));

        Ok(RpcEndpoint::from_parts(self.transport, config, codec))
    }
}
