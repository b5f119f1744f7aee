//! Per-connection protocol state machines
//!
//! Each accepted connection gets one handler task. The first player in the
//! roster is served as the poser, who names themselves, picks the secret
//! word and starts the countdown. Everybody else is a guesser, who names
//! themselves and submits guesses while the countdown runs.
//!
//! Malformed framing ends the connection; well-formed requests that make no
//! sense in the current state are answered with a bad request and the
//! handler keeps listening.

use crate::error::Error;
use crate::game::{GameConfig, GameController, Session, MSG_GAME_CANCELLED};
use crate::registry::{PlayerRegistry, Registration};
use log::{debug, error, info, warn};
use shared::{
    decode, validate_input, Command, Request, Response, Role, API_BAD_REQUEST, MAX_PACK_LENGTH,
};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::oneshot;

pub const CLT_MSG_TOO_LONG_WORD: &str = "Word too long, please choose a shorter one.";
pub const CLT_MSG_WRONG_GUESS: &str = "Wrong guess, try again.";
pub const CLT_MSG_ALREADY_GUESSED: &str = "You already guessed the word.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoserState {
    AwaitingNickname,
    AwaitingWord,
    AwaitingStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuesserState {
    AwaitingNickname,
    Guessing,
    Won,
}

/// How a handler's receive loop ended without an error
#[derive(Debug, PartialEq, Eq)]
enum Exit {
    /// Stop reading but leave the connection open for broadcasts
    StopReceiving,
    /// Peer closed the connection or the player was removed
    Closed,
}

pub struct PlayerHandler<R> {
    id: u32,
    role: Role,
    label: String,
    reader: R,
    kicked: oneshot::Receiver<()>,
    // Set while this poser's word is waiting for the start command
    armed: bool,
    registry: PlayerRegistry,
    session: Arc<Session>,
    config: GameConfig,
}

impl<R> PlayerHandler<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(
        registration: Registration,
        reader: R,
        registry: PlayerRegistry,
        session: Arc<Session>,
        config: GameConfig,
    ) -> Self {
        Self {
            id: registration.id,
            role: registration.role,
            label: format!("player {}", registration.id),
            reader,
            kicked: registration.kicked,
            armed: false,
            registry,
            session,
            config,
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        let outcome = match self.role {
            Role::Poser => self.serve_poser().await,
            Role::Guesser => self.serve_guesser().await,
        };

        match outcome {
            Ok(Exit::StopReceiving) => {
                debug!("{}: stopped receiving", self.label);
            }
            Ok(Exit::Closed) => self.disconnect().await,
            Err(Error::Protocol(e)) => {
                warn!("{}: {}", self.label, e);
                if let Err(e) = self.registry.send(self.id, API_BAD_REQUEST).await {
                    debug!("{}: could not report bad request: {}", self.label, e);
                }
                self.disconnect().await;
            }
            Err(Error::Io(e)) => {
                warn!("{}: {}", self.label, e);
                self.disconnect().await;
            }
            Err(Error::PlayerGone(_)) => {
                debug!("{}: removed while serving", self.label);
                self.disconnect().await;
            }
            Err(e) => {
                error!("{}: unexpected failure: {:?}", self.label, e);
                let response = Response::ServerError.render(self.role, false);
                if let Err(e) = self.registry.send(self.id, &response).await {
                    debug!("{}: could not report server error: {}", self.label, e);
                }
                self.disconnect().await;
            }
        }
    }

    async fn disconnect(&mut self) {
        if self.armed {
            self.armed = false;
            if self.session.abandon().await {
                // The controller cancels the game and empties the roster
                info!("{}: left before starting the game", self.label);
            }
            self.registry.unregister(self.id).await;
            return;
        }

        let removed = self.registry.unregister(self.id).await;

        // Without a poser nobody can choose a word, so everyone starts over
        if removed && self.role == Role::Poser {
            info!("{}: left before choosing a word", self.label);
            self.registry.broadcast(MSG_GAME_CANCELLED).await;
            self.registry.drain().await;
        }
    }

    /// Waits for the next frame. Returns None once the peer closes the
    /// connection or the player is removed from the roster.
    async fn next_request(&mut self) -> Result<Option<String>, Error> {
        let mut buffer = [0u8; MAX_PACK_LENGTH];

        tokio::select! {
            read = self.reader.read(&mut buffer) => {
                let len = read?;
                if len == 0 {
                    return Ok(None);
                }
                Ok(Some(decode(&buffer[..len])?))
            }
            _ = &mut self.kicked => Ok(None),
        }
    }

    async fn reply(&mut self, response: Response, touch: bool) -> Result<(), Error> {
        self.registry
            .send(self.id, &response.render(self.role, touch))
            .await
    }

    async fn register_nickname(&mut self, nickname: &str) -> Result<bool, Error> {
        match validate_input(nickname) {
            Ok(nickname) => {
                self.registry
                    .with_player(self.id, |p| p.nickname = nickname.to_string())
                    .await
                    .ok_or(Error::PlayerGone(self.id))?;
                self.label = format!("player {} '{}'", self.id, nickname);
                info!("{}: connected", self.label);
                self.reply(Response::Success, true).await?;
                Ok(true)
            }
            Err(e) => {
                debug!("{}: rejected nickname: {}", self.label, e);
                self.reply(Response::UserError(CLT_MSG_TOO_LONG_WORD.into()), false)
                    .await?;
                Ok(false)
            }
        }
    }

    async fn serve_poser(&mut self) -> Result<Exit, Error> {
        let mut state = PoserState::AwaitingNickname;

        while let Some(text) = self.next_request().await? {
            let request = Request::parse(&text)?;

            match (state, request.command) {
                (PoserState::AwaitingNickname, Some(Command::Touch)) => {
                    if self.register_nickname(request.body).await? {
                        state = PoserState::AwaitingWord;
                    }
                }
                (PoserState::AwaitingWord, Some(Command::UserInput)) => {
                    if self.choose_word(request.body).await? {
                        state = PoserState::AwaitingStart;
                    }
                }
                (PoserState::AwaitingStart, Some(Command::Start)) => {
                    self.session.start().await?;
                    self.armed = false;
                    info!("{}: game started", self.label);
                    return Ok(Exit::StopReceiving);
                }
                (_, command) => {
                    debug!("{}: {:?} not accepted in {:?}", self.label, command, state);
                    self.reply(Response::BadRequest, false).await?;
                }
            }
        }

        Ok(Exit::Closed)
    }

    async fn choose_word(&mut self, word: &str) -> Result<bool, Error> {
        let word = match validate_input(word) {
            Ok(word) => word,
            Err(e) => {
                debug!("{}: rejected word: {}", self.label, e);
                self.reply(Response::UserError(CLT_MSG_TOO_LONG_WORD.into()), false)
                    .await?;
                return Ok(false);
            }
        };

        if let Err(e) = self.session.arm(word).await {
            self.reply(Response::UserError(e.to_string()), false).await?;
            return Ok(false);
        }
        self.armed = true;

        self.reply(Response::Success, false).await?;
        GameController::new(
            Arc::clone(&self.session),
            self.registry.clone(),
            self.config.clone(),
        )
        .spawn();
        info!("{}: word chosen", self.label);

        Ok(true)
    }

    async fn serve_guesser(&mut self) -> Result<Exit, Error> {
        let mut state = GuesserState::AwaitingNickname;

        while let Some(text) = self.next_request().await? {
            let request = Request::parse(&text)?;

            match (state, request.command) {
                (GuesserState::AwaitingNickname, Some(Command::Touch)) => {
                    if self.register_nickname(request.body).await? {
                        state = GuesserState::Guessing;
                    }
                }
                (GuesserState::Guessing, Some(Command::Guess)) => {
                    if self.submit_guess(request.body).await? {
                        state = GuesserState::Won;
                    }
                }
                (GuesserState::Won, Some(Command::Guess)) => {
                    self.reply(Response::UserError(CLT_MSG_ALREADY_GUESSED.into()), false)
                        .await?;
                }
                (_, command) => {
                    debug!("{}: {:?} not accepted in {:?}", self.label, command, state);
                    self.reply(Response::BadRequest, false).await?;
                }
            }
        }

        Ok(Exit::Closed)
    }

    /// Returns true when the guess matched the secret word
    async fn submit_guess(&mut self, guess: &str) -> Result<bool, Error> {
        let guess = match validate_input(guess) {
            Ok(guess) => guess,
            Err(e) => {
                debug!("{}: rejected guess: {}", self.label, e);
                self.reply(Response::UserError(CLT_MSG_TOO_LONG_WORD.into()), false)
                    .await?;
                return Ok(false);
            }
        };

        let correct = match self.session.check_guess(self.id, guess).await {
            Ok(correct) => correct,
            Err(e) => {
                self.reply(Response::UserError(e.to_string()), false).await?;
                return Ok(false);
            }
        };

        self.registry
            .with_player(self.id, |p| {
                p.words_guessed.push(guess.to_string());
                p.won |= correct;
            })
            .await
            .ok_or(Error::PlayerGone(self.id))?;

        if correct {
            info!("{}: guessed the word", self.label);
            self.reply(Response::Success, false).await?;
        } else {
            debug!("{}: wrong guess {:?}", self.label, guess);
            self.reply(Response::UserError(CLT_MSG_WRONG_GUESS.into()), false)
                .await?;
        }

        Ok(correct)
    }
}
