//! Error transport across the context boundary.
//!
//! A handler failure cannot cross the transport as a live Rust value. It is
//! flattened into a [`RemoteError`] on the answering side, encoded by an
//! [`ErrorCodec`], and decoded back into a `RemoteError` on the calling side,
//! where application code can branch on [`RemoteError::kind`].

use std::error::Error as StdError;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::Result;

/// Kind reported for handler panics.
pub const PANIC_KIND: &str = "panic";

/// Kind reported when call arguments cannot be converted for the handler.
pub const BAD_ARGUMENTS_KIND: &str = "bad_arguments";

/// Kind reported when the handler's return value cannot be serialized.
pub const BAD_RESULT_KIND: &str = "bad_result";

/// Transport-safe error shape.
///
/// `kind` plays the role of an error class: it is what callers match on.
/// `stack` carries the rendered source chain of the original error.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RemoteError {
    /// An error with an explicit kind.
    ///
    /// ```
    /// use chanrpc::RemoteError;
    ///
    /// let err = RemoteError::new("not_found", "no such document");
    /// assert!(err.is_kind("not_found"));
    /// ```
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            stack: None,
            data: None,
        }
    }

    /// Flatten a Rust error. The kind is the error's type name; the source
    /// chain is rendered into `stack`, one cause per line.
    pub fn from_error<E>(err: &E) -> Self
    where
        E: StdError + 'static,
    {
        // ---
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {cause}"));
            source = cause.source();
        }

        Self {
            kind: short_type_name::<E>().to_string(),
            message: err.to_string(),
            stack: (!causes.is_empty()).then(|| causes.join("\n")),
            data: None,
        }
    }

    /// Attach structured data.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach a stack / cause trace.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind == kind
    }

    pub(crate) fn panic(message: impl Into<String>) -> Self {
        Self::new(PANIC_KIND, message)
    }
}

impl From<String> for RemoteError {
    fn from(message: String) -> Self {
        RemoteError::new("error", message)
    }
}

impl From<&str> for RemoteError {
    fn from(message: &str) -> Self {
        RemoteError::new("error", message)
    }
}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::from_error(&err)
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(err: std::io::Error) -> Self {
        RemoteError::from_error(&err).with_data(Value::String(format!("{:?}", err.kind())))
    }
}

/// `my_crate::module::NotFound` → `NotFound`; generic arguments are kept.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

/// Converts errors to and from transport payloads.
///
/// Encoding and decoding must round-trip `kind`, `message` and `stack`.
pub trait ErrorCodec: Send + Sync {
    fn encode(&self, err: &RemoteError) -> Result<Bytes>;

    fn decode(&self, payload: &[u8]) -> Result<RemoteError>;
}

/// JSON error codec.
///
/// Decoding is lenient: a bare JSON string becomes a `RemoteError` with kind
/// `"error"`, and missing fields default, so errors from foreign answerers
/// that only send `{"message": ...}` still surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonErrorCodec;

#[derive(Deserialize)]
#[serde(untagged)]
enum WireError {
    Structured {
        #[serde(default, alias = "name")]
        kind: Option<String>,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        stack: Option<String>,
        #[serde(default)]
        data: Option<Value>,
    },
    Message(String),
}

impl ErrorCodec for JsonErrorCodec {
    fn encode(&self, err: &RemoteError) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(err)?))
    }

    fn decode(&self, payload: &[u8]) -> Result<RemoteError> {
        // ---
        let decoded = match serde_json::from_slice::<WireError>(payload)? {
            WireError::Structured {
                kind,
                message,
                stack,
                data,
            } => RemoteError {
                kind: kind.unwrap_or_else(|| "error".to_string()),
                message: message.unwrap_or_default(),
                stack,
                data,
            },
            WireError::Message(message) => RemoteError::new("error", message),
        };
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("disk unplugged")
        }
    }

    impl StdError for Inner {}

    #[derive(Debug)]
    struct QuotaExceeded(Inner);

    impl fmt::Display for QuotaExceeded {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("quota exceeded")
        }
    }

    impl StdError for QuotaExceeded {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn from_error_keeps_kind_message_and_causes() {
        // ---
        let err = RemoteError::from_error(&QuotaExceeded(Inner));
        assert_eq!(err.kind, "QuotaExceeded");
        assert_eq!(err.message, "quota exceeded");
        assert_eq!(err.stack.as_deref(), Some("caused by: disk unplugged"));
    }

    #[test]
    fn json_codec_preserves_everything() {
        // ---
        let codec = JsonErrorCodec;
        let err = RemoteError::new("not_found", "missing")
            .with_stack("at handler")
            .with_data(serde_json::json!({ "id": 7 }));

        let bytes = codec.encode(&err).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), err);
    }

    #[test]
    fn json_codec_accepts_foreign_shapes() {
        // ---
        let codec = JsonErrorCodec;

        let named = codec
            .decode(br#"{"name":"TypeError","message":"x is undefined"}"#)
            .unwrap();
        assert_eq!(named.kind, "TypeError");
        assert_eq!(named.message, "x is undefined");

        let bare = codec.decode(br#""boom""#).unwrap();
        assert_eq!(bare, RemoteError::new("error", "boom"));

        assert!(codec.decode(b"not json").is_err());
    }

    #[test]
    fn display_shows_kind_and_message() {
        // ---
        let err = RemoteError::new("not_found", "no such document").with_stack("at lookup");
        assert_eq!(err.to_string(), "not_found: no such document");

        let boxed: Box<dyn StdError> = Box::new(err);
        assert!(boxed.source().is_none());
    }

    #[test]
    fn short_type_name_strips_module_path() {
        assert_eq!(short_type_name::<QuotaExceeded>(), "QuotaExceeded");
        assert_eq!(short_type_name::<u32>(), "u32");
    }
}
