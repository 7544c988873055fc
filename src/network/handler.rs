//! Per-connection state machine.
//!
//! Every accepted connection runs one instance of [`run_connection`] as its
//! own task. The connection moves through three phases: awaiting
//! credentials, awaiting a session join, and active gameplay dispatch. All
//! outbound traffic goes through an unbounded channel drained by a dedicated
//! writer task, so the session lock can fan out notifications without
//! awaiting and two sources never interleave bytes on the socket.
//!
//! A frame that is not valid JSON is a transport fault and terminates the
//! connection. A frame that is valid JSON but not a recognized request is a
//! protocol violation: it is logged and dropped, and the connection stays
//! open.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::auth::{AccountStore, AuthOutcome, StoreError};
use crate::game::registry::SessionRegistry;
use crate::game::session::{GameSession, JoinError};
use crate::game::state::Slot;
use crate::network::protocol::{ClientRequest, ServerMessage};
use crate::network::transport::{self, TransportError};

/// Serve one connection until it closes, then release its session slot.
pub async fn run_connection(
    stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    store: Arc<dyn AccountStore>,
) {
    let (mut reader, mut writer) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    let writer_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(error) = transport::send_message(&mut writer, &message).await {
                debug!(%addr, %error, "outbound write failed");
                break;
            }
        }
    });

    let joined = drive(&mut reader, &tx, &registry, store.as_ref(), addr).await;
    if let Some((session, slot)) = joined {
        session.mark_disconnected(slot);
        info!(%addr, session = session.key(), slot = slot.label(), "participant left");
    }

    // Closing our sender (and the slot's clone above) lets the writer task
    // drain any final notice before the socket drops.
    drop(tx);
    let _ = writer_task.await;
    debug!(%addr, "connection closed");
}

/// Walk the connection through its phases. Returns the joined session and
/// slot if the connection got that far, for disconnect bookkeeping.
async fn drive<R>(
    reader: &mut R,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    registry: &SessionRegistry,
    store: &dyn AccountStore,
    addr: SocketAddr,
) -> Option<(Arc<GameSession>, Slot)>
where
    R: AsyncRead + Unpin,
{
    let _ = tx.send(ServerMessage::Credentials);

    let (username, session_key) = authenticate(reader, tx, store, addr).await?;

    let session = registry.get_or_create(&session_key);
    let slot = match session.join(&username, tx.clone()) {
        Ok(slot) => slot,
        Err(JoinError::Full) => {
            info!(%addr, session = session.key(), "join refused, session full");
            let _ = tx.send(ServerMessage::Error {
                message: JoinError::Full.to_string(),
            });
            return None;
        }
    };
    info!(%addr, session = session.key(), slot = slot.label(), username, "participant joined");

    loop {
        match read_request(reader, addr).await {
            Ok(Some(request)) => dispatch(request, &session, slot, tx, store, addr),
            Ok(None) => {}
            Err(error) if error.is_end_of_stream() => {
                info!(%addr, "peer disconnected");
                break;
            }
            Err(error) => {
                warn!(%addr, %error, "transport fault, dropping connection");
                break;
            }
        }
    }

    Some((session, slot))
}

/// Credential phase: wait for a credentials request and check it against the
/// account store. Non-credential requests are dropped; a denied or
/// unreachable store ends the connection after a rejection notice.
async fn authenticate<R>(
    reader: &mut R,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    store: &dyn AccountStore,
    addr: SocketAddr,
) -> Option<(String, String)>
where
    R: AsyncRead + Unpin,
{
    loop {
        let request = match read_request(reader, addr).await {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(error) if error.is_end_of_stream() => {
                info!(%addr, "peer disconnected before credentials");
                return None;
            }
            Err(error) => {
                warn!(%addr, %error, "transport fault before credentials");
                return None;
            }
        };

        let ClientRequest::Credentials {
            username,
            password,
            session_key,
        } = request
        else {
            warn!(%addr, "request before credentials, dropped");
            continue;
        };

        match store.authenticate(&username, &password) {
            Ok(AuthOutcome::Allowed) => {
                info!(%addr, username, "login accepted");
            }
            Ok(AuthOutcome::Created) => {
                info!(%addr, username, "account created");
            }
            Ok(AuthOutcome::Denied) => {
                info!(%addr, username, "login rejected");
                let _ = tx.send(ServerMessage::BadPassword);
                return None;
            }
            Err(StoreError::Unavailable(reason)) => {
                warn!(%addr, username, reason, "account store unavailable, treating as denied");
                let _ = tx.send(ServerMessage::BadPassword);
                return None;
            }
        }

        let _ = tx.send(ServerMessage::LoginSuccess);
        return Some((username, session_key));
    }
}

/// Apply one gameplay request to the session.
fn dispatch(
    request: ClientRequest,
    session: &Arc<GameSession>,
    slot: Slot,
    tx: &mpsc::UnboundedSender<ServerMessage>,
    store: &dyn AccountStore,
    addr: SocketAddr,
) {
    match request {
        ClientRequest::UpdateState {
            ypos,
            ballx,
            bally,
            ballxvel,
            ballyvel,
            score,
            sync,
        } => {
            session.set_paddle_y(slot, ypos);
            session.set_ball(ballx, bally, ballxvel, ballyvel);
            session.set_score(slot, score);
            session.set_sync(slot, sync);

            if let Some(winner) = session.take_win(slot) {
                match store.record_win(&winner) {
                    Ok(()) => info!(session = session.key(), winner, "win recorded"),
                    Err(StoreError::Unavailable(reason)) => {
                        warn!(session = session.key(), winner, reason, "win not recorded");
                    }
                }
            }
        }
        ClientRequest::Sync => {
            let _ = tx.send(ServerMessage::GameState(session.snapshot()));
        }
        ClientRequest::PlayAgain => {
            if session.vote_rematch(slot) {
                info!(session = session.key(), "both voted, scores reset");
            }
        }
        ClientRequest::Credentials { .. } => {
            warn!(%addr, "credentials resent after login, dropped");
        }
    }
}

/// Read one frame and validate its shape. `Ok(None)` is a dropped protocol
/// violation; the caller keeps reading.
async fn read_request<R>(
    reader: &mut R,
    addr: SocketAddr,
) -> Result<Option<ClientRequest>, TransportError>
where
    R: AsyncRead + Unpin,
{
    let value = transport::recv_value(reader).await?;
    match serde_json::from_value::<ClientRequest>(value) {
        Ok(request) => Ok(Some(request)),
        Err(error) => {
            warn!(%addr, %error, "unrecognized request, dropped");
            Ok(None)
        }
    }
}
