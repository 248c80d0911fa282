//! Client session runtime.

use std::{fmt, time::Duration};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::{io::AsyncWriteExt, net::TcpStream, time::timeout};
use tokio_util::codec::Framed;

use super::{
    BatchSlot,
    ClientError,
    RemoteError,
    RpcClientBuilder,
    batch::PendingCall,
};
use crate::{
    codec::TerminatedFrameCodec,
    correlation::CorrelationIds,
    message::{
        Request,
        Response,
        decode_batch_response,
        decode_response,
        encode_batch,
        encode_request,
    },
};

/// One client connection.
///
/// Calls take `&mut self`, so a session runs at most one exchange at a time.
/// After a [`ClientError::Timeout`] a late reply may still arrive; it is
/// detected on the next call as a [`ClientError::CorrelationMismatch`], and
/// the session should be discarded.
///
/// # Examples
///
/// ```no_run
/// use std::net::SocketAddr;
///
/// use framerpc::client::RpcClient;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let addr: SocketAddr = "127.0.0.1:9000".parse()?;
/// let mut client = RpcClient::builder().connect(addr).await?;
///
/// let sum = client.batch_append::<_, i64>("add", &[1, 2], false)?;
/// let echo = client.batch_append::<_, String>("echo", &"hi", false)?;
/// client.batch_call().await?;
/// assert_eq!(sum.take()?, 3);
/// assert_eq!(echo.take()?, "hi");
/// # Ok(())
/// # }
/// ```
pub struct RpcClient {
    framed: Framed<TcpStream, TerminatedFrameCodec>,
    timeout: Duration,
    ids: CorrelationIds,
    pending: Vec<PendingCall>,
}

impl fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcClient")
            .field("timeout", &self.timeout)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

impl RpcClient {
    /// Start building a new client.
    #[must_use]
    pub fn builder() -> RpcClientBuilder { RpcClientBuilder::new() }

    pub(super) fn new(framed: Framed<TcpStream, TerminatedFrameCodec>, timeout: Duration) -> Self {
        Self {
            framed,
            timeout,
            ids: CorrelationIds::new(),
            pending: Vec::new(),
        }
    }

    /// Deadline applied to each call or batch.
    #[must_use]
    pub const fn timeout(&self) -> Duration { self.timeout }

    /// Call `method` and decode its result as `R`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Remote`] if the server reported a failure,
    /// [`ClientError::Decode`] if the result does not fit `R`, and transport
    /// errors such as [`ClientError::Timeout`] or
    /// [`ClientError::Disconnected`].
    pub async fn call<P, R>(&mut self, method: &str, params: &P) -> Result<R, ClientError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let value = self.call_with(method, params, false).await?;
        serde_json::from_value(value).map_err(|err| ClientError::decode(&err))
    }

    /// Send `method` as a notification, without a correlation id.
    ///
    /// The server still answers; the reply is read and its result dropped.
    ///
    /// # Errors
    ///
    /// As for [`RpcClient::call`], apart from result decoding.
    pub async fn notify<P>(&mut self, method: &str, params: &P) -> Result<(), ClientError>
    where
        P: Serialize + ?Sized,
    {
        self.call_with(method, params, true).await.map(drop)
    }

    /// Issue one request and return the raw JSON result.
    ///
    /// # Errors
    ///
    /// See [`RpcClient::call`].
    pub async fn call_with<P>(
        &mut self,
        method: &str,
        params: &P,
        is_notify: bool,
    ) -> Result<Value, ClientError>
    where
        P: Serialize + ?Sized,
    {
        let request = self.request(method, params, is_notify)?;
        let payload = encode_request(&request).map_err(ClientError::Serialize)?;
        let reply = self.exchange(payload).await?;
        let response = decode_response(&reply).map_err(|err| ClientError::decode(&err))?;
        settle(request.id, response)
    }

    /// Queue a call for the next [`RpcClient::batch_call`]. No I/O happens.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Serialize`] if `params` cannot be encoded; the
    /// call is not queued in that case.
    pub fn batch_append<P, R>(
        &mut self,
        method: &str,
        params: &P,
        is_notify: bool,
    ) -> Result<BatchSlot<R>, ClientError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let request = self.request(method, params, is_notify)?;
        let (pending, slot) = PendingCall::new(request);
        self.pending.push(pending);
        Ok(slot)
    }

    /// Number of calls queued for the next batch.
    #[must_use]
    pub fn pending_len(&self) -> usize { self.pending.len() }

    /// Send every queued call as one batch frame and fill their slots.
    ///
    /// The queue is cleared whether or not the batch succeeds. An empty
    /// queue returns immediately without touching the connection.
    ///
    /// # Errors
    ///
    /// Returns the transport or decode error that aborted the whole batch;
    /// every slot then holds [`ClientError::BatchAborted`]. Per-call
    /// failures reported by the server land in the individual slots and do
    /// not make this call fail.
    pub async fn batch_call(&mut self) -> Result<(), ClientError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = std::mem::take(&mut self.pending);
        match self.exchange_batch(&pending).await {
            Ok(responses) => {
                for (call, response) in pending.iter().zip(responses) {
                    call.complete(settle(call.request.id.clone(), response));
                }
                Ok(())
            }
            Err(err) => {
                tracing::debug!(error = %err, calls = pending.len(), "batch aborted");
                for call in &pending {
                    call.complete(Err(ClientError::BatchAborted(err.to_string())));
                }
                Err(err)
            }
        }
    }

    /// Shut down the write half of the connection.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Connection`] if the shutdown fails.
    pub async fn close(mut self) -> Result<(), ClientError> {
        SinkExt::<Bytes>::flush(&mut self.framed)
            .await
            .map_err(ClientError::transport)?;
        self.framed.get_mut().shutdown().await?;
        Ok(())
    }

    fn request<P>(&self, method: &str, params: &P, is_notify: bool) -> Result<Request, ClientError>
    where
        P: Serialize + ?Sized,
    {
        let params = serde_json::to_value(params).map_err(ClientError::Serialize)?;
        let id = (!is_notify).then(|| self.ids.next_id());
        Ok(Request::new(id, method, params))
    }

    async fn exchange_batch(&mut self, pending: &[PendingCall]) -> Result<Vec<Response>, ClientError> {
        let requests: Vec<Request> = pending.iter().map(|call| call.request.clone()).collect();
        let payload = encode_batch(&requests).map_err(ClientError::Serialize)?;
        let reply = self.exchange(payload).await?;
        let responses = decode_batch_response(&reply).map_err(|err| ClientError::decode(&err))?;
        if responses.len() != requests.len() {
            return Err(ClientError::Decode(format!(
                "expected {} batch responses, received {}",
                requests.len(),
                responses.len()
            )));
        }
        Ok(responses)
    }

    /// Write one frame and read the next, under a single deadline.
    async fn exchange(&mut self, payload: Bytes) -> Result<Bytes, ClientError> {
        let deadline = self.timeout;
        let framed = &mut self.framed;
        timeout(deadline, async move {
            framed.send(payload).await.map_err(ClientError::transport)?;
            match framed.next().await {
                Some(Ok(frame)) => Ok(frame),
                Some(Err(err)) => Err(ClientError::transport(err)),
                None => Err(ClientError::Disconnected),
            }
        })
        .await
        .map_err(|_| ClientError::Timeout(deadline))?
    }
}

/// Check the reply id and turn the response into the call outcome.
fn settle(expected: Option<String>, response: Response) -> Result<Value, ClientError> {
    if let (Some(sent), Some(received)) = (expected.as_deref(), response.id.as_deref())
        && sent != received
    {
        return Err(ClientError::CorrelationMismatch {
            expected,
            received: response.id,
        });
    }
    response
        .into_result()
        .map_err(|message| ClientError::Remote(RemoteError::new(message)))
}
