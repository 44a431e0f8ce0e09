use bytes::Bytes;

use crate::{ChannelTriple, OnceSubscription, Result, Transport};

/// How a pending call ended.
#[derive(Debug)]
pub(super) enum Reply {
    /// Payload from the data channel.
    Data(Bytes),
    /// Encoded error from the error channel.
    Error(Bytes),
    /// A reply listener was removed before anything arrived.
    Closed,
}

/// Caller-side state of one in-flight call.
///
/// Owns exactly one once-listener on the call's data channel and one on its
/// error channel. Both are released when [`settle`](Self::settle) returns,
/// and also if the call is abandoned, because releasing a listener is tied
/// to dropping its subscription. No exit path leaves a listener behind.
pub(super) struct PendingCall {
    // ---
    data: OnceSubscription,
    error: OnceSubscription,
}

impl PendingCall {
    /// Register both reply listeners. Must happen before the request is
    /// sent, otherwise a fast answerer could reply into the void.
    pub(super) async fn register(transport: &dyn Transport, triple: &ChannelTriple) -> Result<Self> {
        // ---
        let data = transport.subscribe_once(triple.data.clone()).await?;
        // If this fails, `data` is dropped and deregistered on the way out.
        let error = transport.subscribe_once(triple.error.clone()).await?;

        Ok(Self { data, error })
    }

    /// Wait for the first reply on either channel.
    ///
    /// The winning listener is consumed by its `recv`; the losing one is
    /// dropped when `select!` discards its branch. Both are therefore gone
    /// before this returns.
    pub(super) async fn settle(self) -> Reply {
        // ---
        let PendingCall { data, error } = self;

        tokio::select! {
            env = data.recv() => match env {
                Some(env) => Reply::Data(env.payload),
                None => Reply::Closed,
            },
            env = error.recv() => match env {
                Some(env) => Reply::Error(env.payload),
                None => Reply::Closed,
            },
        }
    }
}
