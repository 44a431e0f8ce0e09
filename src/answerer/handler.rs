use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use crate::codec::{BAD_ARGUMENTS_KIND, BAD_RESULT_KIND};
use crate::{Args, RemoteError};

pub(super) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Outcome of one handler invocation, ready to be sent back: serialized
/// result bytes, or the error to encode.
pub(super) type HandlerOutput = std::result::Result<Bytes, RemoteError>;

/// Type-erased async handler.
///
/// Lets the answer loop drive handlers of any argument, result and error
/// type through one `Arc<dyn HandlerFn>`.
pub(super) trait HandlerFn: Send + Sync {
    fn call(&self, args: Args) -> BoxFuture<'static, HandlerOutput>;
}

pub(super) struct Handler<F, Fut, TArgs, TResp, E> {
    func: F,
    _phantom: PhantomData<fn(TArgs) -> (Fut, TResp, E)>,
}

impl<F, Fut, TArgs, TResp, E> Handler<F, Fut, TArgs, TResp, E>
where
    F: Fn(TArgs) -> Fut,
    Fut: Future<Output = std::result::Result<TResp, E>>,
{
    pub(super) fn new(func: F) -> Self {
        Self {
            func,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut, TArgs, TResp, E> HandlerFn for Handler<F, Fut, TArgs, TResp, E>
where
    F: Fn(TArgs) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<TResp, E>> + Send + 'static,
    TArgs: DeserializeOwned + Send + 'static,
    TResp: Serialize + Send + 'static,
    E: Into<RemoteError> + Send + 'static,
{
    fn call(&self, args: Args) -> BoxFuture<'static, HandlerOutput> {
        // ---
        let parsed: TArgs = match args.parse() {
            Ok(parsed) => parsed,
            Err(err) => {
                let remote = RemoteError::new(BAD_ARGUMENTS_KIND, err.to_string());
                return Box::pin(async move { Err(remote) });
            }
        };

        let fut = (self.func)(parsed);

        Box::pin(async move {
            let resp = fut.await.map_err(Into::into)?;
            serde_json::to_vec(&resp)
                .map(Bytes::from)
                .map_err(|err| RemoteError::new(BAD_RESULT_KIND, err.to_string()))
        })
    }
}
