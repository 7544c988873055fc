//! Headless session client.
//!
//! The companion side of the wire protocol, used by integration tests and
//! by any frontend that wants the handshake, update, and drift plumbing
//! without reimplementing it. The client is strictly sequential: one
//! request on the stream, then its reply, so no reader task is needed.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpStream;
use tracing::debug;

use crate::auth::hash_password;
use crate::game::drift::{DriftTracker, LocalView, Reconciliation};
use crate::game::state::{Slot, StateSnapshot};
use crate::network::protocol::{ClientRequest, ServerMessage};
use crate::network::transport::{self, TransportError};

/// Client-side failures.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Wire-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Server rejected the credentials.
    #[error("login rejected")]
    LoginRejected,

    /// Server sent a failure notice and will close the connection.
    #[error("server refused: {0}")]
    Refused(String),

    /// Server sent something the current exchange has no use for.
    #[error("unexpected server message: {0:?}")]
    Unexpected(ServerMessage),
}

/// A connected participant endpoint.
pub struct SessionClient {
    stream: TcpStream,
}

impl SessionClient {
    /// Connect to a server.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(TransportError::from)?;
        debug!(%addr, "connected");
        Ok(Self { stream })
    }

    /// Run the credential handshake. The password is hashed here; plaintext
    /// never reaches the wire.
    pub async fn login(
        &mut self,
        username: &str,
        password: &str,
        session_key: &str,
    ) -> Result<(), ClientError> {
        match self.recv().await? {
            ServerMessage::Credentials => {}
            other => return Err(ClientError::Unexpected(other)),
        }

        self.send(&ClientRequest::Credentials {
            username: username.to_string(),
            password: hash_password(password),
            session_key: session_key.to_string(),
        })
        .await?;

        match self.recv().await? {
            ServerMessage::LoginSuccess => Ok(()),
            ServerMessage::BadPassword => Err(ClientError::LoginRejected),
            ServerMessage::Error { message } => Err(ClientError::Refused(message)),
            other => Err(ClientError::Unexpected(other)),
        }
    }

    /// Block until the start notification arrives and return the assigned
    /// slot. An error notice here means the session was already full.
    pub async fn await_start(&mut self) -> Result<Slot, ClientError> {
        match self.recv().await? {
            ServerMessage::StartGame { paddle, .. } => Slot::from_label(&paddle).ok_or_else(|| {
                ClientError::Refused(format!("unknown paddle label {paddle:?}"))
            }),
            ServerMessage::Error { message } => Err(ClientError::Refused(message)),
            other => Err(ClientError::Unexpected(other)),
        }
    }

    /// Push this participant's per-tick fields. Fire-and-forget.
    pub async fn send_update(
        &mut self,
        ypos: i32,
        view: &LocalView,
        own_score: u32,
        tick: u64,
    ) -> Result<(), ClientError> {
        self.send(&ClientRequest::UpdateState {
            ypos,
            ballx: view.ballx,
            bally: view.bally,
            ballxvel: view.ballxvel,
            ballyvel: view.ballyvel,
            score: own_score,
            sync: tick,
        })
        .await
    }

    /// Pull the session's full snapshot.
    pub async fn request_sync(&mut self) -> Result<StateSnapshot, ClientError> {
        self.send(&ClientRequest::Sync).await?;
        match self.recv().await? {
            ServerMessage::GameState(snapshot) => Ok(snapshot),
            other => Err(ClientError::Unexpected(other)),
        }
    }

    /// Pull a snapshot and reconcile the local view against it.
    pub async fn synchronize(
        &mut self,
        tick: u64,
        tracker: &mut DriftTracker,
        view: &mut LocalView,
    ) -> Result<Reconciliation, ClientError> {
        let snapshot = self.request_sync().await?;
        let outcome = tracker.reconcile(tick, view, &snapshot);
        tracker.mark_synced(tick);
        Ok(outcome)
    }

    /// Vote to restart the game.
    pub async fn play_again(&mut self) -> Result<(), ClientError> {
        self.send(&ClientRequest::PlayAgain).await
    }

    async fn send(&mut self, request: &ClientRequest) -> Result<(), ClientError> {
        transport::send_message(&mut self.stream, request).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<ServerMessage, ClientError> {
        Ok(transport::recv_message(&mut self.stream).await?)
    }
}
