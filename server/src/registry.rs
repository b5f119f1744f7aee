//! Player roster shared by every connection handler and the game controller
//!
//! This module holds the single source of truth for who is connected:
//! - Player registration in connection order, which decides the poser role
//! - Idempotent removal that closes the player's connection
//! - Snapshots of the roster for status reports
//! - Best-effort broadcasting of status text to every connection
//!
//! Roster changes and snapshots go through one lock. Each connection has
//! its own write lock, and writes happen outside the roster lock with a
//! deadline, so a client that stops reading only ever stalls itself.

use crate::error::Error;
use log::{debug, info, warn};
use shared::Role;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{oneshot, Mutex, RwLock};
use tokio::time::timeout;

/// Write side of a player's connection
pub type Connection = Box<dyn AsyncWrite + Send + Unpin>;

type SharedConnection = Arc<Mutex<Connection>>;

pub const DEFAULT_NICKNAME: &str = "No nickname";

/// Longest a single write may block before the player is dropped
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected player and the write half of their connection
pub struct Player {
    /// Unique player identifier, used for routing and log labels only
    pub id: u32,
    /// Remote address of the connection
    pub addr: SocketAddr,
    /// Poser or guesser, fixed at registration
    pub role: Role,
    pub nickname: String,
    /// Every guess accepted while the game was running
    pub words_guessed: Vec<String>,
    pub won: bool,
    connection: SharedConnection,
    // Dropped together with the player, which wakes the handler's read loop
    _kick: oneshot::Sender<()>,
}

impl Player {
    fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            addr: self.addr,
            role: self.role,
            nickname: self.nickname.clone(),
            words_guessed: self.words_guessed.clone(),
            won: self.won,
        }
    }
}

/// Read-only copy of a player taken under the roster lock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub id: u32,
    pub addr: SocketAddr,
    pub role: Role,
    pub nickname: String,
    pub words_guessed: Vec<String>,
    pub won: bool,
}

/// Result of admitting a new connection
#[derive(Debug)]
pub struct Registration {
    pub id: u32,
    pub role: Role,
    /// Resolves once the player has been removed from the roster
    pub kicked: oneshot::Receiver<()>,
}

struct Roster {
    players: Vec<Player>,
    next_id: u32,
}

/// Cloneable handle to the shared roster
#[derive(Clone)]
pub struct PlayerRegistry {
    inner: Arc<RwLock<Roster>>,
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes one frame, giving up after [`WRITE_TIMEOUT`]
async fn write_frame(connection: &SharedConnection, data: &[u8]) -> io::Result<()> {
    let write = async {
        let mut connection = connection.lock().await;
        connection.write_all(data).await?;
        connection.flush().await
    };

    match timeout(WRITE_TIMEOUT, write).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out")),
    }
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Roster {
                players: Vec::new(),
                next_id: 1,
            })),
        }
    }

    /// Appends a new player with the default nickname.
    ///
    /// The role is decided under the same lock as the insertion: whoever
    /// lands in an empty roster becomes the poser, everyone after that a
    /// guesser.
    pub async fn register(&self, connection: Connection, addr: SocketAddr) -> Registration {
        let mut roster = self.inner.write().await;

        let id = roster.next_id;
        roster.next_id += 1;

        let role = if roster.players.is_empty() {
            Role::Poser
        } else {
            Role::Guesser
        };

        let (kick, kicked) = oneshot::channel();
        roster.players.push(Player {
            id,
            addr,
            role,
            nickname: DEFAULT_NICKNAME.to_string(),
            words_guessed: Vec::new(),
            won: false,
            connection: Arc::new(Mutex::new(connection)),
            _kick: kick,
        });

        info!("Player {} connected from {} as {:?}", id, addr, role);
        Registration { id, role, kicked }
    }

    /// Removes a player and closes their connection.
    ///
    /// Returns false if the player was already gone.
    pub async fn unregister(&self, id: u32) -> bool {
        let player = {
            let mut roster = self.inner.write().await;

            let Some(index) = roster.players.iter().position(|p| p.id == id) else {
                return false;
            };

            let player = roster.players.remove(index);
            info!(
                "Player {} '{}' disconnected, total players -> {}",
                id,
                player.nickname,
                roster.players.len()
            );
            player
        };

        let shutdown = async { player.connection.lock().await.shutdown().await };
        match timeout(WRITE_TIMEOUT, shutdown).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Player {}: shutdown failed: {}", id, e),
            Err(_) => debug!("Player {}: shutdown timed out", id),
        }
        true
    }

    /// Disconnects every player, one at a time.
    ///
    /// Players that leave concurrently are simply skipped.
    pub async fn drain(&self) {
        loop {
            let next = {
                let roster = self.inner.read().await;
                roster.players.first().map(|p| p.id)
            };

            match next {
                Some(id) => {
                    self.unregister(id).await;
                }
                None => break,
            }
        }
    }

    pub async fn count(&self) -> usize {
        self.inner.read().await.players.len()
    }

    /// Copies the roster in connection order
    pub async fn all(&self) -> Vec<PlayerSnapshot> {
        let roster = self.inner.read().await;
        roster.players.iter().map(Player::snapshot).collect()
    }

    pub async fn get(&self, id: u32) -> Option<PlayerSnapshot> {
        let roster = self.inner.read().await;
        roster.players.iter().find(|p| p.id == id).map(Player::snapshot)
    }

    /// Runs `f` against a registered player, returning None if they left.
    pub async fn with_player<T>(&self, id: u32, f: impl FnOnce(&mut Player) -> T) -> Option<T> {
        let mut roster = self.inner.write().await;
        roster.players.iter_mut().find(|p| p.id == id).map(f)
    }

    async fn connection(&self, id: u32) -> Option<SharedConnection> {
        let roster = self.inner.read().await;
        roster
            .players
            .iter()
            .find(|p| p.id == id)
            .map(|p| Arc::clone(&p.connection))
    }

    /// Writes `text` to a single player's connection.
    ///
    /// Fails with `TimedOut` if the connection stays blocked past
    /// [`WRITE_TIMEOUT`]; the caller decides what happens to the player.
    pub async fn send(&self, id: u32, text: &str) -> Result<(), Error> {
        let connection = self.connection(id).await.ok_or(Error::PlayerGone(id))?;
        write_frame(&connection, &shared::encode(text)).await?;
        Ok(())
    }

    /// Sends `text` to every registered player.
    ///
    /// A failed write is logged and skipped; the remaining players still
    /// receive the message. Players whose write times out are removed.
    pub async fn broadcast(&self, text: &str) {
        let data = shared::encode(text);
        let targets: Vec<(u32, SharedConnection)> = {
            let roster = self.inner.read().await;
            roster
                .players
                .iter()
                .map(|p| (p.id, Arc::clone(&p.connection)))
                .collect()
        };

        let mut stalled = Vec::new();
        for (id, connection) in &targets {
            if let Err(e) = write_frame(connection, &data).await {
                warn!("Failed to send status to player {}: {}", id, e);
                if e.kind() == io::ErrorKind::TimedOut {
                    stalled.push(*id);
                }
            }
        }

        for id in stalled {
            self.unregister(id).await;
        }

        debug!("Broadcast to {} players: {:?}", targets.len(), text);
    }
}
