//! Correlation-id multiplexing over one framed duplex byte stream (spec
//! §4.2). A `Session` owns the stream: writes are serialized through a
//! queue to one writer task, and one receiver task demultiplexes replies
//! by correlation id onto the right caller's future.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace, warn};

use crate::error::{ClientError, ClientResult};
use crate::framing::{self, FramedTransport};
use crate::protocol::header;
use crate::protocol::messages::{ApiKey, Request, Response};

struct PendingEntry {
    api_key: ApiKey,
    reply_tx: oneshot::Sender<ClientResult<Response>>,
}

type PendingTable = Arc<Mutex<HashMap<i32, PendingEntry>>>;

struct SessionInner {
    next_correlation_id: AtomicU32,
    pending: PendingTable,
    write_tx: tokio::sync::mpsc::UnboundedSender<Bytes>,
    closed: Arc<AtomicBool>,
    explicitly_closed: AtomicBool,
    shutdown: CancellationToken,
    client_id: String,
}

/// A cheap-to-clone handle onto one multiplexed session. Every clone
/// shares the same correlation-id counter, pending table, and write queue.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Spawns the writer and receiver tasks over `io` and returns a handle.
    /// `io` is consumed; the session owns it for its lifetime.
    #[instrument(skip(io, client_id))]
    pub fn spawn<T>(io: T, client_id: impl Into<String>) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let framed: FramedTransport<T> = framing::framed(io);
        let (sink, stream) = framed.split();

        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let shutdown = CancellationToken::new();
        let (write_tx, write_rx) = tokio::sync::mpsc::unbounded_channel::<Bytes>();

        tokio::spawn(run_writer(sink, write_rx, closed.clone(), shutdown.clone()));
        tokio::spawn(run_reader(stream, pending.clone(), closed.clone(), shutdown.clone()));

        Self {
            inner: Arc::new(SessionInner {
                next_correlation_id: AtomicU32::new(0),
                pending,
                write_tx,
                closed,
                explicitly_closed: AtomicBool::new(false),
                shutdown,
                client_id: client_id.into(),
            }),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Tears the session down: stops the writer/receiver tasks and fails
    /// every currently-pending reply with [`ClientError::Closed`], the
    /// distinct "shut down on purpose" kind from the organic
    /// `SessionClosed` a dead socket produces (spec §6, §7).
    pub fn close(&self) {
        if self.inner.explicitly_closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.shutdown.cancel();
        let drained: Vec<_> = self.inner.pending.lock().unwrap().drain().collect();
        for (_, entry) in drained {
            let _ = entry.reply_tx.send(Err(ClientError::Closed));
        }
    }

    fn next_correlation_id(&self) -> i32 {
        self.inner.next_correlation_id.fetch_add(1, Ordering::Relaxed) as i32
    }

    /// Encodes and sends `request`, returning a future that resolves with
    /// the correlated reply. Ackless requests (Produce with
    /// `required_acks == 0`) bypass pending-table registration entirely
    /// and resolve as soon as the bytes are handed to the write queue.
    #[instrument(skip(self, request))]
    pub fn send(&self, request: Request) -> PendingReply {
        let api_key = request.api_key();
        let correlation_id = self.next_correlation_id();
        let body = request.encode_body();
        let wire = header::encode_request(api_key, 0, correlation_id, &self.inner.client_id, &body);

        if request.is_ackless() {
            debug!(correlation_id, "ackless request, bypassing pending table");
            let result = self
                .inner
                .write_tx
                .send(wire)
                .map(|_| Response::empty_produce_ack())
                .map_err(|_| ClientError::SessionClosed);
            return PendingReply::ready(result);
        }

        if self.inner.explicitly_closed.load(Ordering::SeqCst) {
            return PendingReply::ready(Err(ClientError::Closed));
        }
        if self.is_closed() {
            return PendingReply::ready(Err(ClientError::SessionClosed));
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.inner
            .pending
            .lock()
            .unwrap()
            .insert(correlation_id, PendingEntry { api_key, reply_tx });

        if self.inner.write_tx.send(wire).is_err() {
            self.inner.pending.lock().unwrap().remove(&correlation_id);
            return PendingReply::ready(Err(ClientError::SessionClosed));
        }

        PendingReply::pending(correlation_id, self.inner.pending.clone(), reply_rx)
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.inner.pending.lock().unwrap().len()
    }
}

/// The future returned by [`Session::send`]. Dropping it before completion
/// removes its pending-table entry, so a cancelled caller never leaks a
/// slot for a reply nobody will read.
pub struct PendingReply {
    state: PendingReplyState,
}

enum PendingReplyState {
    Ready(Option<ClientResult<Response>>),
    Pending {
        correlation_id: i32,
        pending: PendingTable,
        rx: oneshot::Receiver<ClientResult<Response>>,
        completed: bool,
    },
}

impl PendingReply {
    fn ready(result: ClientResult<Response>) -> Self {
        Self {
            state: PendingReplyState::Ready(Some(result)),
        }
    }

    fn pending(
        correlation_id: i32,
        pending: PendingTable,
        rx: oneshot::Receiver<ClientResult<Response>>,
    ) -> Self {
        Self {
            state: PendingReplyState::Pending {
                correlation_id,
                pending,
                rx,
                completed: false,
            },
        }
    }
}

impl Future for PendingReply {
    type Output = ClientResult<Response>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            PendingReplyState::Ready(result) => {
                Poll::Ready(result.take().expect("PendingReply polled after completion"))
            }
            PendingReplyState::Pending { rx, completed, .. } => {
                match Pin::new(rx).poll(cx) {
                    Poll::Ready(Ok(result)) => {
                        *completed = true;
                        Poll::Ready(result)
                    }
                    Poll::Ready(Err(_)) => {
                        *completed = true;
                        Poll::Ready(Err(ClientError::SessionClosed))
                    }
                    Poll::Pending => Poll::Pending,
                }
            }
        }
    }
}

impl Drop for PendingReply {
    fn drop(&mut self) {
        if let PendingReplyState::Pending {
            correlation_id,
            pending,
            completed,
            ..
        } = &self.state
        {
            if !*completed {
                pending.lock().unwrap().remove(correlation_id);
            }
        }
    }
}

async fn run_writer<Si>(
    mut sink: Si,
    mut write_rx: tokio::sync::mpsc::UnboundedReceiver<Bytes>,
    closed: Arc<AtomicBool>,
    shutdown: CancellationToken,
) where
    Si: futures::Sink<Bytes> + Unpin,
    Si::Error: std::fmt::Display,
{
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            maybe_bytes = write_rx.recv() => {
                match maybe_bytes {
                    Some(bytes) => {
                        if let Err(e) = sink.send(bytes).await {
                            warn!("session write failed, closing: {e}");
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
    closed.store(true, Ordering::SeqCst);
}

async fn run_reader<St>(
    mut stream: St,
    pending: PendingTable,
    closed: Arc<AtomicBool>,
    shutdown: CancellationToken,
) where
    St: futures::Stream<Item = std::io::Result<bytes::BytesMut>> + Unpin,
{
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = stream.next() => next,
        };
        match next {
            Some(Ok(frame)) => match header::decode_response_prefix(&frame) {
                Ok((correlation_id, body)) => {
                    let entry = pending.lock().unwrap().remove(&correlation_id);
                    match entry {
                        Some(PendingEntry { api_key, reply_tx }) => {
                            let decoded = Response::decode(api_key, body);
                            let _ = reply_tx.send(decoded);
                        }
                        None => {
                            trace!(correlation_id, "reply for unknown or cancelled request, dropping");
                        }
                    }
                }
                Err(e) => {
                    error!("malformed response frame, closing session: {e}");
                    break;
                }
            },
            Some(Err(e)) => {
                error!("session transport error, closing: {e}");
                break;
            }
            None => {
                debug!("session stream ended");
                break;
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    let drained: Vec<_> = pending.lock().unwrap().drain().collect();
    for (_, entry) in drained {
        let _ = entry.reply_tx.send(Err(ClientError::SessionClosed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{MetadataRequest, ProduceRequest};
    use tokio::io::duplex;
    use tokio::net::{TcpListener, TcpStream};

    #[tokio::test]
    async fn ackless_produce_bypasses_pending_table() {
        let (client_io, _server_io) = duplex(4096);
        let session = Session::spawn(client_io, "test-client");

        let reply = session
            .send(Request::Produce(ProduceRequest {
                acks: 0,
                timeout_ms: 0,
                topic_data: vec![],
            }))
            .await
            .unwrap();

        assert!(matches!(reply, Response::Produce(_)));
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn replies_are_matched_by_correlation_id_regardless_of_arrival_order() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut framed = framing::framed(socket);

            // Read two requests, echo their correlation ids back in
            // reverse order.
            let req1 = framed.next().await.unwrap().unwrap();
            let req2 = framed.next().await.unwrap().unwrap();

            // Request layout: apiKey(2) apiVersion(2) correlationId(4) ...
            let cid1 = i32::from_be_bytes(req1[4..8].try_into().unwrap());
            let cid2 = i32::from_be_bytes(req2[4..8].try_into().unwrap());

            let mut reply2 = cid2.to_be_bytes().to_vec();
            reply2.extend_from_slice(&MetadataResponseFixture::encode());
            framed.send(Bytes::from(reply2)).await.unwrap();

            let mut reply1 = cid1.to_be_bytes().to_vec();
            reply1.extend_from_slice(&MetadataResponseFixture::encode());
            framed.send(Bytes::from(reply1)).await.unwrap();
        });

        let client = TcpStream::connect(addr).await.unwrap();
        let session = Session::spawn(client, "test-client");

        let fut1 = session.send(Request::Metadata(MetadataRequest {
            topics: vec!["t1".into()],
        }));
        let fut2 = session.send(Request::Metadata(MetadataRequest {
            topics: vec!["t2".into()],
        }));

        let (r1, r2) = tokio::join!(fut1, fut2);
        assert!(r1.is_ok());
        assert!(r2.is_ok());

        server.await.unwrap();
    }

    struct MetadataResponseFixture;
    impl MetadataResponseFixture {
        fn encode() -> Bytes {
            crate::protocol::messages::MetadataResponse {
                brokers: vec![],
                topics: vec![],
            }
            .encode()
        }
    }

    #[tokio::test]
    async fn session_closes_and_fails_pending_on_eof() {
        let (client_io, server_io) = duplex(4096);
        let session = Session::spawn(client_io, "test-client");

        let pending = session.send(Request::Metadata(MetadataRequest { topics: vec![] }));
        drop(server_io); // peer disappears mid-flight

        let result = pending.await;
        assert!(matches!(result, Err(ClientError::SessionClosed)));
    }

    #[tokio::test]
    async fn explicit_close_fails_pending_with_closed_not_session_closed() {
        let (client_io, _server_io) = duplex(4096);
        let session = Session::spawn(client_io, "test-client");

        let pending = session.send(Request::Metadata(MetadataRequest { topics: vec![] }));
        session.close();

        let result = pending.await;
        assert!(matches!(result, Err(ClientError::Closed)));

        let after_close = session
            .send(Request::Metadata(MetadataRequest { topics: vec![] }))
            .await;
        assert!(matches!(after_close, Err(ClientError::Closed)));
    }
}
