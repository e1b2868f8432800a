//! A request/response function bound to one broker (spec §4.4). Built by
//! stacking a [`Session`] on a [`RecoverableResource`] that owns the
//! underlying TCP socket: the first `send` after construction (or after a
//! transport failure) pays the cost of (re)connecting, single-flighted
//! across concurrent callers by the Resource itself.

use tokio::net::TcpStream;
use tracing::{debug, instrument, warn};

use crate::data::Endpoint;
use crate::error::{ClientError, ClientResult};
use crate::protocol::messages::{Request, Response};
use crate::resource::{BoxFuture, RecoverAction, RecoverableResource};
use crate::session::Session;

/// A channel to one broker. Cheap to clone; clones share the same
/// underlying socket resource.
#[derive(Clone)]
pub struct Channel {
    endpoint: Endpoint,
    resource: RecoverableResource<Session, ClientError>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Channel {
    /// Two handles onto the same resource are equal regardless of which
    /// socket generation is currently live; this is what lets a
    /// [`crate::reactive::Reactive`] map of channels apply its
    /// distinctness filter without reconnecting to compare sockets.
    fn eq(&self, other: &Self) -> bool {
        self.endpoint == other.endpoint && self.resource.ptr_eq(&other.resource)
    }
}

impl Channel {
    /// Builds a channel to `endpoint`. No socket is opened yet: the first
    /// `send` (or an explicit [`Channel::connect`]) triggers creation.
    pub fn new(endpoint: Endpoint, client_id: impl Into<String>) -> Self {
        let client_id = client_id.into();
        let connect_endpoint = endpoint.clone();

        let creator = move || -> BoxFuture<'static, Result<Session, ClientError>> {
            let endpoint = connect_endpoint.clone();
            let client_id = client_id.clone();
            Box::pin(async move {
                debug!(%endpoint, "opening channel socket");
                let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
                    .await
                    .map_err(ClientError::Transport)?;
                stream.set_nodelay(true).map_err(ClientError::Transport)?;
                set_exclusive_address_use(&stream);
                Ok(Session::spawn(stream, client_id))
            })
        };

        let handler = |_current: Option<std::sync::Arc<Session>>, err: ClientError| match err {
            ClientError::Transport(_) | ClientError::SessionClosed => RecoverAction::Recreate,
            other => RecoverAction::Escalate(ClientError::Escalated(other.to_string())),
        };

        Self {
            endpoint,
            resource: RecoverableResource::new(creator, handler),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Forces the underlying socket to exist, surfacing a connect failure
    /// immediately rather than on the first `send`.
    pub async fn connect(&self) -> ClientResult<()> {
        self.resource.create().await.map(|_| ())
    }

    /// Tears down the currently-held session, if any, failing its pending
    /// replies with [`ClientError::Closed`]. A channel that hasn't
    /// connected yet has nothing to close.
    pub async fn close(&self) {
        if let Some(session) = self.resource.snapshot().await {
            session.close();
        }
    }

    /// Sends `request` and awaits its correlated reply, transparently
    /// recreating the underlying socket and session on transport failure.
    #[instrument(skip(self, request), fields(endpoint = %self.endpoint))]
    pub async fn send(&self, request: Request) -> ClientResult<Response> {
        self.resource
            .inject(
                |session, request: Request| -> BoxFuture<'static, Result<Response, ClientError>> {
                    Box::pin(async move { session.send(request).await })
                },
                request,
            )
            .await
    }
}

#[cfg(windows)]
fn set_exclusive_address_use(_stream: &TcpStream) {
    // SO_EXCLUSIVEADDRUSE has no portable tokio API and would need a raw
    // socket option crate; left unimplemented until a Windows deployment
    // actually needs it.
    warn!("exclusive address use requested but not implemented on this platform");
}

#[cfg(not(windows))]
fn set_exclusive_address_use(_stream: &TcpStream) {
    // No POSIX equivalent; documented no-op (see DESIGN.md).
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::MetadataRequest;
    use futures::{SinkExt, StreamExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn send_round_trips_through_a_real_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut framed = crate::framing::framed(socket);
            let req = framed.next().await.unwrap().unwrap();
            let cid = i32::from_be_bytes(req[4..8].try_into().unwrap());

            let mut reply = cid.to_be_bytes().to_vec();
            reply.extend_from_slice(
                &crate::protocol::messages::MetadataResponse {
                    brokers: vec![],
                    topics: vec![],
                }
                .encode(),
            );
            framed.send(bytes::Bytes::from(reply)).await.unwrap();
        });

        let channel = Channel::new(
            Endpoint::new(addr.ip().to_string(), addr.port()),
            "test-client",
        );

        let response = channel
            .send(Request::Metadata(MetadataRequest { topics: vec![] }))
            .await
            .unwrap();

        assert!(matches!(response, Response::Metadata(_)));
    }

    #[tokio::test]
    async fn connect_to_refused_endpoint_errors() {
        // Port 0 is never listening once resolved to an ephemeral, unused
        // address; bind-and-drop to get a guaranteed-refused port.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let channel = Channel::new(Endpoint::new(addr.ip().to_string(), addr.port()), "c");
        let result = channel.connect().await;
        assert!(result.is_err());
    }
}
