use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Channel, Result, RpcError};

/// Request payload sent on a send channel.
///
/// The transport has no correlation concept, so the reply channels travel
/// with the request: the answerer replies on `data_channel` or
/// `error_channel` and never needs to know who the caller is beyond the
/// envelope's sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEnvelope {
    pub data_channel: Channel,
    pub error_channel: Channel,
    pub user_args: Vec<Value>,
}

impl CallEnvelope {
    /// Decode a received request payload.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::InvalidEnvelope` if the payload is not a call
    /// envelope.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload)
            .map_err(|err| RpcError::InvalidEnvelope(format!("not a call envelope: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_field_names() {
        // ---
        let call = CallEnvelope {
            data_channel: Channel::from("d"),
            error_channel: Channel::from("e"),
            user_args: vec![Value::from(1), Value::from("two")],
        };

        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "dataChannel": "d",
                "errorChannel": "e",
                "userArgs": [1, "two"],
            })
        );
    }

    #[test]
    fn malformed_payload_is_an_invalid_envelope() {
        // ---
        let malformed: [&[u8]; 3] = [b"not json", br#"{"dataChannel":"d"}"#, b"[1,2]"];
        for payload in malformed {
            assert!(matches!(
                CallEnvelope::decode(payload),
                Err(RpcError::InvalidEnvelope(_))
            ));
        }

        let call = CallEnvelope::decode(br#"{"dataChannel":"d","errorChannel":"e","userArgs":[]}"#)
            .unwrap();
        assert_eq!(call.error_channel, Channel::from("e"));
        assert!(call.user_args.is_empty());
    }
}
