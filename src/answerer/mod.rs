// src/answerer/mod.rs
//! Answerer half of the endpoint.
//!
//! # Architecture
//!
//! [`answer`](RpcEndpoint::answer) subscribes once to an operation's stable
//! send channel and spawns a receive loop. Every [`CallEnvelope`] that
//! arrives is handled in its own task, so a slow handler never delays the
//! next call. The handler's result goes back on the envelope's data channel,
//! any failure on its error channel, both addressed to the envelope's sender.
//!
//! Handler failures never escape: errors, argument mismatches, result
//! serialization failures and panics are all turned into a [`RemoteError`]
//! and sent to the caller.
//!
//! # Lifecycle
//!
//! The subscription lives until [`AnswerHandle::dispose`] is called, the
//! handle is dropped, or the transport is closed. Disposal removes the
//! listener immediately; calls that were already delivered still run to
//! completion and reply.
//!
//! Each context answers a send channel at most once, no matter how many
//! endpoints share its transport. The claim is given back when the receive
//! loop ends, whatever ended it.

mod handler;

use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::task::JoinHandle;

use handler::{Handler, HandlerFn, HandlerOutput};

use crate::domain::Claim;
use crate::endpoint::Inner;
use crate::peer::{self, ReplyPolicy};
use crate::{
    // ---
    log_debug,
    log_error,
    log_trace,
    log_warn,
    Args,
    CallEnvelope,
    Channel,
    ContextId,
    Envelope,
    RemoteError,
    Result,
    RpcEndpoint,
    RpcError,
    SubscriptionHandle,
    SubscriptionId,
};

impl RpcEndpoint {
    // ---
    /// Answer calls made with [`call`](RpcEndpoint::call).
    ///
    /// The handler receives the caller's positional arguments converted to
    /// `TArgs` (use a tuple for several arguments) and returns a future
    /// resolving to the reply or an error convertible into [`RemoteError`].
    ///
    /// # Errors
    ///
    /// - `RpcError::InvalidContext` if this endpoint is a peer
    /// - `RpcError::AlreadyAnswered` if this context already answers the operation
    /// - `RpcError::Transport` if the subscription cannot be registered
    ///
    /// # Example
    ///
    /// ```
    /// # use chanrpc::{MemoryBus, RemoteError, RpcEndpoint, TransportConfig};
    /// # async fn example() -> chanrpc::Result<()> {
    /// # let hub = RpcEndpoint::new(
    /// #     chanrpc::create_memory_transport_with_bus(TransportConfig::hub(), MemoryBus::new()).await?,
    /// # );
    /// let handle = hub
    ///     .answer("greet", |name: String| async move {
    ///         if name.is_empty() {
    ///             return Err(RemoteError::new("invalid_name", "name is empty"));
    ///         }
    ///         Ok(format!("hello {name}"))
    ///     })
    ///     .await?;
    ///
    /// // later
    /// handle.dispose();
    /// # Ok(())
    /// # }
    /// ```
    pub async fn answer<TArgs, TResp, E, F, Fut>(
        &self,
        operation: &str,
        handler: F,
    ) -> Result<AnswerHandle>
    where
        TArgs: DeserializeOwned + Send + 'static,
        TResp: Serialize + Send + 'static,
        E: Into<RemoteError> + Send + 'static,
        F: Fn(TArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<TResp, E>> + Send + 'static,
    {
        // ---
        // Hub-addressed calls are only ever delivered to the hub.
        if !self.context_id().is_hub() {
            return Err(RpcError::InvalidContext(format!(
                "answer({operation}) requires the hub context, this endpoint is {}",
                self.context_id()
            )));
        }

        let channel = self.inner.namer.send_channel(operation, None);
        let handler: Arc<dyn HandlerFn> = Arc::new(Handler::new(handler));
        self.start_answering(channel, handler, ReplyPolicy::Unchecked)
            .await
    }

    /// Answer calls made to this peer with [`call_peer`](RpcEndpoint::call_peer).
    ///
    /// Before replying, the answerer checks that the caller's context is
    /// still attached. Replies to a context that has gone away are dropped
    /// and counted in [`AnswerHandle::dropped_replies`].
    ///
    /// # Errors
    ///
    /// - `RpcError::InvalidContext` if this endpoint is the hub
    /// - `RpcError::AlreadyAnswered` if this context already answers the operation
    /// - `RpcError::Transport` if the subscription cannot be registered
    pub async fn answer_peer<TArgs, TResp, E, F, Fut>(
        &self,
        operation: &str,
        handler: F,
    ) -> Result<AnswerHandle>
    where
        TArgs: DeserializeOwned + Send + 'static,
        TResp: Serialize + Send + 'static,
        E: Into<RemoteError> + Send + 'static,
        F: Fn(TArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<TResp, E>> + Send + 'static,
    {
        // ---
        let local = self.context_id().peer_id().cloned().ok_or_else(|| {
            RpcError::InvalidContext(format!(
                "answer_peer({operation}) requires a peer context, this endpoint is the hub"
            ))
        })?;

        let channel = self.inner.namer.send_channel(operation, Some(&local));
        let handler: Arc<dyn HandlerFn> = Arc::new(Handler::new(handler));
        self.start_answering(channel, handler, ReplyPolicy::RequireLivePeer)
            .await
    }

    async fn start_answering(
        &self,
        channel: Channel,
        handler: Arc<dyn HandlerFn>,
        policy: ReplyPolicy,
    ) -> Result<AnswerHandle> {
        // ---
        let base = self.inner.transport.base();
        let claim = base.claim(&channel)?;

        let subscription = match self.inner.transport.subscribe(channel.clone()).await {
            Ok(subscription) => subscription,
            Err(err) => {
                base.release(&channel, claim);
                return Err(err);
            }
        };

        let stats = Arc::new(AnswerStats::default());
        let subscription_id = subscription.id();

        log_debug!("{}: answering on {channel}", self.context_id());

        let task = tokio::spawn(answer_loop(
            self.inner.clone(),
            subscription,
            claim,
            handler,
            policy,
            stats.clone(),
        ));

        Ok(AnswerHandle {
            inner: self.inner.clone(),
            channel,
            claim,
            subscription_id,
            disposed: AtomicBool::new(false),
            stats,
            _task: task,
        })
    }
}

#[derive(Default)]
struct AnswerStats {
    dropped_replies: AtomicU64,
}

/// Disposer for an answerer registration.
///
/// Returned by [`RpcEndpoint::answer`] and [`RpcEndpoint::answer_peer`].
/// Dropping the handle disposes the registration; keep it alive for as long
/// as the operation should be answered.
#[must_use = "dropping an AnswerHandle stops answering"]
pub struct AnswerHandle {
    // ---
    inner: Arc<Inner>,
    channel: Channel,
    claim: Claim,
    subscription_id: SubscriptionId,
    disposed: AtomicBool,
    stats: Arc<AnswerStats>,

    /// Receive loop; ends on its own once the subscription is removed.
    _task: JoinHandle<()>,
}

impl AnswerHandle {
    /// Stop answering. New calls are no longer delivered once this returns;
    /// calls already delivered still complete. Calling it again is a no-op.
    pub fn dispose(&self) {
        // ---
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let transport = &self.inner.transport;
        transport.unsubscribe(&self.channel, self.subscription_id);
        transport.base().release(&self.channel, self.claim);

        log_debug!("stopped answering on {}", self.channel);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// The send channel this registration listens on.
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Replies dropped because the calling context was no longer alive.
    pub fn dropped_replies(&self) -> u64 {
        self.stats.dropped_replies.load(Ordering::Relaxed)
    }
}

impl Drop for AnswerHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for AnswerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerHandle")
            .field("channel", &self.channel)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

async fn answer_loop(
    inner: Arc<Inner>,
    mut subscription: SubscriptionHandle,
    claim: Claim,
    handler: Arc<dyn HandlerFn>,
    policy: ReplyPolicy,
    stats: Arc<AnswerStats>,
) {
    // ---
    while let Some(env) = subscription.recv().await {
        let mut call = match CallEnvelope::decode(&env.payload) {
            Ok(call) => call,
            Err(err) => {
                log_warn!("{}: dropping call from {}: {err}", env.channel, env.sender);
                continue;
            }
        };

        log_trace!("{}: call from {} on {}", inner.transport.context_id(), env.sender, env.channel);

        let inner = inner.clone();
        let handler = handler.clone();
        let stats = stats.clone();
        let origin = env.sender;

        tokio::spawn(async move {
            let args = Args::from(std::mem::take(&mut call.user_args));
            let outcome = run_isolated(handler, args).await;

            match send_reply(&inner, policy, origin, &call, outcome).await {
                Ok(()) => {}
                Err(RpcError::DeadPeer(_ctx)) => {
                    stats.dropped_replies.fetch_add(1, Ordering::Relaxed);
                    log_debug!("reply on {} dropped, {_ctx} is gone", call.data_channel);
                }
                Err(err) => {
                    log_error!("failed to send reply for {}: {err}", call.data_channel);
                }
            }
        });
    }

    // Disposed, dropped or closed: the channel is free for a new answerer.
    inner.transport.base().release(subscription.channel(), claim);
    log_debug!("receive loop ended for {}", subscription.channel());
}

/// Run the handler in its own task so a panic is contained and reported.
async fn run_isolated(handler: Arc<dyn HandlerFn>, args: Args) -> HandlerOutput {
    // ---
    match tokio::spawn(async move { handler.call(args).await }).await {
        Ok(outcome) => outcome,
        Err(join_err) if join_err.is_panic() => {
            let message = panic_message(join_err.into_panic());
            log_error!("answer handler panicked: {message}");
            Err(RemoteError::panic(message))
        }
        Err(join_err) => Err(RemoteError::new("cancelled", join_err.to_string())),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

async fn send_reply(
    inner: &Inner,
    policy: ReplyPolicy,
    origin: ContextId,
    call: &CallEnvelope,
    outcome: HandlerOutput,
) -> Result<()> {
    // ---
    peer::guard_reply(inner.transport.as_ref(), policy, &origin)?;

    let (channel, payload) = match outcome {
        Ok(bytes) => (call.data_channel.clone(), bytes),
        Err(remote) => {
            log_debug!("handler failed, replying on {}: {remote}", call.error_channel);
            (call.error_channel.clone(), inner.codec.encode(&remote)?)
        }
    };

    let env = Envelope::new(channel, inner.transport.context_id().clone(), payload)
        .to(origin)
        .with_content_type(inner.config.content_type.clone());

    inner.transport.send(env).await
}
