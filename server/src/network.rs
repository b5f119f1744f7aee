//! Server network layer accepting TCP connections and dispatching handlers

use crate::error::Error;
use crate::game::{GameConfig, Session};
use crate::handler::PlayerHandler;
use crate::registry::PlayerRegistry;
use log::{error, info};
use shared::Role;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

/// Listening socket plus the state every connection shares
pub struct Server {
    listener: TcpListener,
    registry: PlayerRegistry,
    session: Arc<Session>,
    config: GameConfig,
}

impl Server {
    pub async fn bind(addr: &str, config: GameConfig) -> Result<Self, Error> {
        let listener = TcpListener::bind(addr).await?;
        info!("server: listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            registry: PlayerRegistry::new(),
            session: Arc::new(Session::new(config.total_ticks)),
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> PlayerRegistry {
        self.registry.clone()
    }

    pub fn session(&self) -> Arc<Session> {
        Arc::clone(&self.session)
    }

    /// Accepts connections until the task is dropped
    pub async fn run(&self) -> Result<(), Error> {
        loop {
            info!("server: waiting for new players...");

            match self.listener.accept().await {
                Ok((stream, addr)) => self.admit(stream, addr).await,
                Err(e) => {
                    error!("server: failed to accept connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    /// Registers the connection and spawns the handler for its role
    async fn admit(&self, stream: TcpStream, addr: SocketAddr) {
        let (reader, writer) = stream.into_split();
        let registration = self.registry.register(Box::new(writer), addr).await;

        match registration.role {
            Role::Poser => info!("server: player {} will choose the word", registration.id),
            Role::Guesser => info!("server: player {} will guess", registration.id),
        }

        PlayerHandler::new(
            registration,
            reader,
            self.registry.clone(),
            Arc::clone(&self.session),
            self.config.clone(),
        )
        .spawn();

        info!("server: total players -> {}", self.registry.count().await);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_bind_reports_ephemeral_port() {
        let server = Server::bind("127.0.0.1:0", GameConfig::default())
            .await
            .unwrap();

        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(server.session().total_ticks(), GameConfig::default().total_ticks);
    }

    #[tokio::test]
    async fn test_bind_rejects_address_without_port() {
        let result = Server::bind("127.0.0.1", GameConfig::default()).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_roles_follow_connection_order() {
        let server = Server::bind("127.0.0.1:0", GameConfig::default())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let registry = server.registry();
        tokio::spawn(async move { server.run().await });

        let mut first = TcpStream::connect(addr).await.unwrap();
        first
            .write_all(shared::Command::Touch.frame("Ana").as_bytes())
            .await
            .unwrap();
        let mut buffer = [0u8; 256];
        let len = first.read(&mut buffer).await.unwrap();
        assert_eq!(&buffer[..len], b"POST FIRST TOUCH HTTP/1.1 200 OK\r\n");

        let mut second = TcpStream::connect(addr).await.unwrap();
        second
            .write_all(shared::Command::Touch.frame("Bia").as_bytes())
            .await
            .unwrap();
        let len = second.read(&mut buffer).await.unwrap();
        assert_eq!(&buffer[..len], b"POST GUESSER TOUCH HTTP/1.1 200 OK\r\n");

        let roles: Vec<Role> = registry.all().await.iter().map(|p| p.role).collect();
        assert_eq!(roles, vec![Role::Poser, Role::Guesser]);
    }
}
