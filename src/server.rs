use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::error::{ChatError, RelayError};
use crate::filter::ProfanityFilter;
use crate::message::{Ack, ServerEvent};
use crate::protocol::{Frame, encode_event, parse_frame};
use crate::registry::UserRegistry;
use crate::router::EventRouter;
use crate::session::{Operation, Session};
use crate::transport::{ChannelTransport, Transport};
use crate::types::ConnectionId;

pub struct Server {
    pub config: ServerConfig,
    router: Arc<EventRouter>,
    transport: Arc<ChannelTransport>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let transport = Arc::new(ChannelTransport::with_capacity(config.outbox_capacity));
        let filter = ProfanityFilter::new().with_words(&config.blocked_words);
        let router = Arc::new(EventRouter::new(
            UserRegistry::new(),
            transport.clone(),
            Box::new(filter),
            &config,
        ));
        Self {
            config,
            router,
            transport,
        }
    }

    /// Accept connections until the listener fails.
    pub async fn run(self) -> Result<(), ChatError> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        tracing::info!(addr = %listener.local_addr()?, "relay listening");
        self.serve(listener).await
    }

    async fn serve(self, listener: TcpListener) -> Result<(), ChatError> {
        loop {
            let (stream, peer) = listener.accept().await?;
            let router = Arc::clone(&self.router);
            let transport = Arc::clone(&self.transport);
            tokio::spawn(async move {
                if let Err(e) = handle_client(router, transport, stream).await {
                    tracing::warn!(%peer, error = %e, "client error");
                }
            });
        }
    }
}

/// Drive one socket: frames in, session transitions, events out.
async fn handle_client(
    router: Arc<EventRouter>,
    transport: Arc<ChannelTransport>,
    stream: TcpStream,
) -> Result<(), ChatError> {
    let peer = stream.peer_addr()?;
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let (id, rx) = transport.attach();
    tracing::info!(conn = %id, %peer, online = transport.connection_count(), "connected");
    let writer_task = tokio::spawn(write_events(id, rx, writer));

    let mut session = router.session(id);
    let result = read_frames(&mut session, transport.as_ref(), &mut reader).await;

    session.disconnect().await;
    transport.detach(id);
    // Detaching closes the outbox, so the writer finishes once it has
    // flushed whatever was queued.
    let _ = writer_task.await;
    tracing::info!(conn = %id, "disconnected");

    result
}

async fn read_frames<R>(
    session: &mut Session,
    transport: &dyn Transport,
    reader: &mut R,
) -> Result<(), ChatError>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = reader.read_line(&mut line).await?;
        if bytes == 0 {
            return Ok(()); // client hung up
        }
        if line.trim().is_empty() {
            continue;
        }

        let frame = match parse_frame(&line) {
            Ok(frame) => frame,
            Err(e) => {
                transport.send(session.id(), ServerEvent::Ack(Ack::err("parse", e)));
                continue;
            }
        };

        let (op, outcome) = match frame {
            Frame::Join { username, room } => (
                Operation::Join,
                session.join(&username, &room).await.map(|_| ()),
            ),
            Frame::Msg { text } => (Operation::SendMessage, session.send_message(&text).await),
            Frame::Loc {
                latitude,
                longitude,
            } => (
                Operation::SendLocation,
                session.send_location(latitude, longitude).await,
            ),
            Frame::Quit => return Ok(()),
        };
        transport.send(session.id(), ack(op, outcome));
    }
}

fn ack(op: Operation, outcome: Result<(), RelayError>) -> ServerEvent {
    ServerEvent::Ack(match outcome {
        Ok(()) => Ack::ok(op.as_str()),
        Err(e) => Ack::err(op.as_str(), e),
    })
}

async fn write_events<W>(id: ConnectionId, mut rx: mpsc::Receiver<ServerEvent>, mut writer: W)
where
    W: AsyncWriteExt + Unpin,
{
    while let Some(event) = rx.recv().await {
        let line = match encode_event(&event) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(conn = %id, error = %e, "failed to encode event");
                continue;
            }
        };
        if writer.write_all(line.as_bytes()).await.is_err() {
            tracing::debug!(conn = %id, "write failed, peer gone");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

    use super::*;

    struct Client {
        lines: tokio::io::Lines<BufReader<OwnedReadHalf>>,
        writer: OwnedWriteHalf,
    }

    impl Client {
        async fn connect(addr: std::net::SocketAddr) -> Self {
            let stream = TcpStream::connect(addr).await.unwrap();
            let (reader, writer) = stream.into_split();
            Self {
                lines: BufReader::new(reader).lines(),
                writer,
            }
        }

        async fn send(&mut self, line: &str) {
            self.writer.write_all(format!("{line}\n").as_bytes()).await.unwrap();
        }

        async fn next(&mut self) -> Value {
            let line = self.lines.next_line().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }
    }

    async fn start() -> std::net::SocketAddr {
        let config = ServerConfig::builder().blocked_words(["badword"]).build();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(Server::new(config).serve(listener));
        addr
    }

    #[tokio::test]
    async fn chat_over_tcp() {
        let addr = start().await;
        let mut alice = Client::connect(addr).await;
        let mut bob = Client::connect(addr).await;

        alice.send("JOIN:alice:r1").await;
        assert_eq!(alice.next().await["data"]["text"], "Welcome To Idan's Chat!");
        assert_eq!(alice.next().await["data"]["users"], serde_json::json!(["alice"]));
        assert_eq!(alice.next().await["data"], serde_json::json!({ "op": "join", "error": null }));

        bob.send("JOIN:Alice:r1").await;
        let rejected = bob.next().await;
        assert_eq!(rejected["data"]["op"], "join");
        assert_eq!(rejected["data"]["error"], "Username is in use!");

        bob.send("JOIN:bob:r1").await;
        assert_eq!(bob.next().await["data"]["text"], "Welcome To Idan's Chat!");
        assert_eq!(bob.next().await["data"]["users"], serde_json::json!(["alice", "bob"]));
        assert_eq!(bob.next().await["data"]["op"], "join");

        assert_eq!(alice.next().await["data"]["text"], "bob has joined the chat!");
        assert_eq!(alice.next().await["data"]["users"], serde_json::json!(["alice", "bob"]));

        alice.send("MSG:badword").await;
        let blocked = alice.next().await;
        assert_eq!(blocked["data"]["error"], "Profanity is not allowed!");

        alice.send("MSG:hello").await;
        let msg = alice.next().await;
        assert_eq!(msg["event"], "message");
        assert_eq!(msg["data"]["username"], "alice");
        assert_eq!(msg["data"]["text"], "hello");
        assert_eq!(alice.next().await["data"], serde_json::json!({ "op": "sendMessage", "error": null }));
        assert_eq!(bob.next().await["data"]["text"], "hello");

        bob.send("LOC:1.5,2.5").await;
        let loc = alice.next().await;
        assert_eq!(loc["event"], "locationMessage");
        assert_eq!(loc["data"]["url"], "https://google.com/maps?q=1.5,2.5");

        alice.send("QUIT:").await;
        assert_eq!(bob.next().await["event"], "locationMessage");
        assert_eq!(bob.next().await["data"]["op"], "sendLocation");
        assert_eq!(bob.next().await["data"]["text"], "alice has left!");
        assert_eq!(bob.next().await["data"]["users"], serde_json::json!(["bob"]));
    }

    #[tokio::test]
    async fn malformed_frames_keep_the_connection() {
        let addr = start().await;
        let mut client = Client::connect(addr).await;

        client.send("garbage").await;
        assert_eq!(client.next().await["data"]["op"], "parse");

        client.send("MSG:too early").await;
        let early = client.next().await;
        assert_eq!(early["data"]["op"], "sendMessage");
        assert_eq!(early["data"]["error"], "cannot sendMessage while connected");

        client.send("JOIN: : ").await;
        assert_eq!(client.next().await["data"]["error"], "Username and room are required!");
    }
}
