//! Public, transport-agnostic RPC configuration.
//!
//! This type intentionally contains no transport-specific concepts.
//! Both sides of a call must agree on `channel_prefix`, otherwise the
//! caller's send channel never matches the answerer's subscription.

use std::sync::Arc;

/// Default namespace prepended to every derived channel name.
pub const DEFAULT_CHANNEL_PREFIX: &str = "%chanrpc";

/// Content type stamped on every envelope the endpoint sends.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Endpoint configuration.
///
/// # Example
///
/// ```
/// use chanrpc::RpcConfig;
///
/// let config = RpcConfig::default().with_channel_prefix("%my-app");
/// assert_eq!(config.channel_prefix.as_ref(), "%my-app");
/// ```
#[derive(Debug, Clone)]
pub struct RpcConfig {
    // ---
    /// Namespace for derived channel names, so RPC traffic cannot collide
    /// with application channels on a shared transport.
    pub channel_prefix: Arc<str>,

    /// Content type metadata attached to outgoing envelopes.
    ///
    /// Informational only; payloads are always JSON.
    pub content_type: Arc<str>,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            channel_prefix: Arc::from(DEFAULT_CHANNEL_PREFIX),
            content_type: Arc::from(DEFAULT_CONTENT_TYPE),
        }
    }
}

impl RpcConfig {
    /// Set the channel namespace prefix.
    pub fn with_channel_prefix(mut self, prefix: impl Into<Arc<str>>) -> Self {
        self.channel_prefix = prefix.into();
        self
    }

    /// Set the content type metadata.
    pub fn with_content_type(mut self, content_type: impl Into<Arc<str>>) -> Self {
        self.content_type = content_type.into();
        self
    }
}
