//! Integration tests for the word guessing server
//!
//! These tests run the real TCP server on an ephemeral port with a short
//! game clock and talk to it the way a client would.

use server::game::{GameConfig, Phase};
use server::network::Server;
use server::registry::PlayerRegistry;
use shared::{Command, API_BAD_REQUEST, MAX_INPUT_LENGTH};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const DEADLINE: Duration = Duration::from_secs(5);

fn quick_config() -> GameConfig {
    GameConfig {
        total_ticks: 4,
        tick: Duration::from_millis(100),
        min_broadcast_interval: Duration::from_millis(10),
    }
}

async fn start_server() -> (SocketAddr, PlayerRegistry, Arc<server::game::Session>) {
    let server = Server::bind("127.0.0.1:0", quick_config()).await.unwrap();
    let addr = server.local_addr().unwrap();
    let registry = server.registry();
    let session = server.session();
    tokio::spawn(async move { server.run().await });
    (addr, registry, session)
}

/// Reads until `needle` shows up in everything received so far
async fn read_until(stream: &mut TcpStream, needle: &str) -> String {
    let mut received = String::new();
    let mut buffer = [0u8; 1024];

    timeout(DEADLINE, async {
        while !received.contains(needle) {
            let len = stream.read(&mut buffer).await.unwrap();
            assert!(len > 0, "connection closed before {needle:?}, got {received:?}");
            received.push_str(std::str::from_utf8(&buffer[..len]).unwrap());
        }
    })
    .await
    .expect("timed out waiting for server");

    received
}

async fn read_to_close(stream: &mut TcpStream) -> String {
    let mut received = String::new();
    timeout(DEADLINE, stream.read_to_string(&mut received))
        .await
        .expect("timed out waiting for disconnect")
        .unwrap();
    received
}

async fn send(stream: &mut TcpStream, command: Command, body: &str) {
    stream
        .write_all(command.frame(body).as_bytes())
        .await
        .unwrap();
}

async fn wait_for_empty_roster(registry: &PlayerRegistry) {
    for _ in 0..200 {
        if registry.count().await == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("roster still has {} players", registry.count().await);
}

/// PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// A frame without the terminator is answered and then closed
    #[tokio::test]
    async fn missing_terminator_closes_connection() {
        let (addr, registry, _) = start_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"POST TOUCH Ana").await.unwrap();

        assert_eq!(read_to_close(&mut client).await, API_BAD_REQUEST);
        wait_for_empty_roster(&registry).await;
    }

    /// An unknown but well formed request keeps the connection open
    #[tokio::test]
    async fn unknown_command_keeps_connection() {
        let (addr, registry, _) = start_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"POST DANCE HTTP/1.1\r\n").await.unwrap();
        let reply = read_until(&mut client, "\r\n").await;
        assert_eq!(reply, "POST FIRST HTTP/1.1 400 ERROR\r\n");

        send(&mut client, Command::Touch, "Ana").await;
        let reply = read_until(&mut client, "\r\n").await;
        assert_eq!(reply, "POST FIRST TOUCH HTTP/1.1 200 OK\r\n");
        assert_eq!(registry.count().await, 1);
    }

    /// Oversized input is refused without dropping the player
    #[tokio::test]
    async fn oversized_word_is_user_error() {
        let (addr, _, session) = start_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        send(&mut client, Command::Touch, "Ana").await;
        read_until(&mut client, "200 OK").await;

        send(&mut client, Command::UserInput, &"x".repeat(MAX_INPUT_LENGTH + 1)).await;
        let reply = read_until(&mut client, "\r\n").await;
        assert!(reply.starts_with("POST FIRST HTTP/1.1 403 ERROR\r\n"), "{reply}");
        assert_eq!(session.phase().await, Phase::Idle);

        send(&mut client, Command::UserInput, "banana").await;
        read_until(&mut client, "POST FIRST HTTP/1.1 200 OK\r\n").await;
        assert_eq!(session.phase().await, Phase::Armed);
    }
}

/// GAME FLOW TESTS
mod game_flow_tests {
    use super::*;

    /// Single poser plays a whole game and is disconnected at the end
    #[tokio::test]
    async fn poser_plays_full_game() {
        let (addr, registry, session) = start_server().await;
        let mut poser = TcpStream::connect(addr).await.unwrap();

        send(&mut poser, Command::Touch, "Ana").await;
        let reply = read_until(&mut poser, "\r\n").await;
        assert_eq!(reply, "POST FIRST TOUCH HTTP/1.1 200 OK\r\n");

        send(&mut poser, Command::UserInput, "banana").await;
        read_until(&mut poser, "POST FIRST HTTP/1.1 200 OK\r\n").await;

        send(&mut poser, Command::Start, "").await;
        let output = read_to_close(&mut poser).await;

        assert!(output.contains("Time left: 4s"), "{output}");
        assert!(output.contains("Time left: 2s"), "{output}");
        assert!(output.ends_with("Game over. The word was 'banana'. Winners: Ana\n"));

        wait_for_empty_roster(&registry).await;
        assert_eq!(session.countdown().await, 4);
        assert_eq!(session.phase().await, Phase::Idle);
    }

    /// A guesser finds the word and is listed as the winner
    #[tokio::test]
    async fn guesser_wins_game() {
        let (addr, registry, _) = start_server().await;

        let mut poser = TcpStream::connect(addr).await.unwrap();
        send(&mut poser, Command::Touch, "Ana").await;
        read_until(&mut poser, "POST FIRST TOUCH HTTP/1.1 200 OK\r\n").await;

        let mut guesser = TcpStream::connect(addr).await.unwrap();
        send(&mut guesser, Command::Touch, "Bia").await;
        read_until(&mut guesser, "POST GUESSER TOUCH HTTP/1.1 200 OK\r\n").await;

        send(&mut poser, Command::UserInput, "banana").await;
        read_until(&mut poser, "POST FIRST HTTP/1.1 200 OK\r\n").await;
        send(&mut poser, Command::Start, "").await;

        read_until(&mut guesser, "Time left:").await;
        send(&mut guesser, Command::Guess, "BANANA").await;
        read_until(&mut guesser, "POST GUESSER HTTP/1.1 200 OK\r\n").await;

        let poser_output = read_to_close(&mut poser).await;
        let guesser_output = read_to_close(&mut guesser).await;

        let results = "Game over. The word was 'banana'. Winners: Bia\n";
        assert!(poser_output.ends_with(results), "{poser_output}");
        assert!(guesser_output.ends_with(results), "{guesser_output}");
        wait_for_empty_roster(&registry).await;
    }

    /// After a game ends the next player to connect is the new poser
    #[tokio::test]
    async fn session_resets_for_next_game() {
        let (addr, registry, session) = start_server().await;

        let mut first = TcpStream::connect(addr).await.unwrap();
        send(&mut first, Command::Touch, "Ana").await;
        read_until(&mut first, "200 OK").await;
        send(&mut first, Command::UserInput, "banana").await;
        read_until(&mut first, "POST FIRST HTTP/1.1 200 OK\r\n").await;
        send(&mut first, Command::Start, "").await;
        read_to_close(&mut first).await;
        wait_for_empty_roster(&registry).await;

        let mut second = TcpStream::connect(addr).await.unwrap();
        send(&mut second, Command::Touch, "Caio").await;
        let reply = read_until(&mut second, "\r\n").await;
        assert_eq!(reply, "POST FIRST TOUCH HTTP/1.1 200 OK\r\n");

        send(&mut second, Command::UserInput, "pera").await;
        read_until(&mut second, "POST FIRST HTTP/1.1 200 OK\r\n").await;
        assert_eq!(session.word().await.as_deref(), Some("pera"));
    }
}
