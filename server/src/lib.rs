//! # Word Guessing Game Server
//!
//! This library provides the authoritative server for a multiplayer word
//! guessing game. One player, the poser, picks a secret word; everybody who
//! connects after them tries to guess it before a shared countdown runs out.
//!
//! ## Core Responsibilities
//!
//! ### Connection Lifecycle
//! Every accepted TCP connection is registered in a shared roster and served
//! by its own task. The first player in the roster becomes the poser and
//! every later player a guesser. When a connection ends, for whatever reason,
//! the player is removed from the roster and the socket is closed.
//!
//! ### Game Session
//! There is exactly one game session at a time. It goes from idle to armed
//! when the poser submits the word, to running when the poser starts the
//! countdown, and back to idle once the countdown reaches zero. A second
//! word is refused while a session is active.
//!
//! ### State Broadcasting
//! While the countdown runs, status updates are pushed to every connected
//! player at most every two ticks. When it ends, the results are broadcast
//! and every player is disconnected, leaving the server ready for a new game.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! The roster of connected players, guarded by a single roster lock:
//! - Registration in connection order and role assignment
//! - Idempotent removal that closes the connection
//! - Snapshots and best-effort broadcasting with bounded writes
//!
//! ### Game Module (`game`)
//! The session state and the controller task:
//! - Secret word, countdown and phase behind one mutex
//! - Periodic ticker feeding a coalescing status channel
//! - Final results and session reset
//!
//! ### Handler Module (`handler`)
//! The per-connection request/response state machines for posers and
//! guessers.
//!
//! ### Network Module (`network`)
//! The TCP acceptor that registers connections and spawns their handlers.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::game::GameConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("127.0.0.1:8080", GameConfig::default()).await?;
//!
//!     // Accepts players forever; each game resets the session when it ends
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod game;
pub mod handler;
pub mod network;
pub mod registry;

pub use error::Error;
