use crate::registry::{PlayerRegistry, PlayerSnapshot};
use log::{debug, error, info};
use shared::{Role, TOTAL_GAME_TIME};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};

pub const MSG_WAITING_START: &str = "Word chosen. Waiting for the poser to start\n";
pub const MSG_GAME_CANCELLED: &str = "Game cancelled: the poser left before starting\n";

#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Countdown length, one tick per `tick`
    pub total_ticks: u32,
    pub tick: Duration,
    /// Minimum gap between two status broadcasts
    pub min_broadcast_interval: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            total_ticks: TOTAL_GAME_TIME,
            tick: Duration::from_secs(1),
            min_broadcast_interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No word has been chosen
    Idle,
    /// Word stored, controller waiting for the start command
    Armed,
    /// Countdown is ticking
    Running,
    /// Countdown is over and the results are being sent
    Finishing,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("A game is already in progress, wait for it to finish.")]
    AlreadyActive,

    #[error("The game is not running.")]
    NotRunning,

    #[error("No word has been chosen yet.")]
    NotArmed,
}

#[derive(Debug)]
struct SessionState {
    phase: Phase,
    word: Option<String>,
    countdown: u32,
    /// Players whose guess matched, in the order they found the word
    winners: Vec<u32>,
}

/// The single game session shared by handlers and the controller
#[derive(Debug)]
pub struct Session {
    total_ticks: u32,
    state: Mutex<SessionState>,
    wake: Notify,
}

impl Session {
    pub fn new(total_ticks: u32) -> Self {
        Self {
            total_ticks,
            state: Mutex::new(SessionState {
                phase: Phase::Idle,
                word: None,
                countdown: total_ticks,
                winners: Vec::new(),
            }),
            wake: Notify::new(),
        }
    }

    pub fn total_ticks(&self) -> u32 {
        self.total_ticks
    }

    /// Stores the secret word. Only one word per session is accepted.
    pub async fn arm(&self, word: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        if state.phase != Phase::Idle {
            return Err(SessionError::AlreadyActive);
        }

        state.phase = Phase::Armed;
        state.word = Some(word.to_string());
        state.countdown = self.total_ticks;
        state.winners.clear();
        Ok(())
    }

    /// Releases the controller into the countdown
    pub async fn start(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        if state.phase != Phase::Armed {
            return Err(SessionError::NotArmed);
        }

        state.phase = Phase::Running;
        self.wake.notify_one();
        Ok(())
    }

    /// Drops an armed session that was never started.
    pub async fn abandon(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.phase != Phase::Armed {
            return false;
        }

        state.phase = Phase::Idle;
        state.word = None;
        state.countdown = self.total_ticks;
        self.wake.notify_one();
        true
    }

    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase
    }

    pub async fn countdown(&self) -> u32 {
        self.state.lock().await.countdown
    }

    pub async fn word(&self) -> Option<String> {
        self.state.lock().await.word.clone()
    }

    /// Compares a guess to the secret word, ignoring case and surrounding
    /// whitespace. Guesses only count while the countdown runs.
    ///
    /// A match is recorded for `player` under the same lock, so it is part
    /// of the results even if the countdown ends right after.
    pub async fn check_guess(&self, player: u32, guess: &str) -> Result<bool, SessionError> {
        let mut state = self.state.lock().await;
        let correct = match (&state.phase, &state.word) {
            (Phase::Running, Some(word)) => {
                guess.trim().to_lowercase() == word.trim().to_lowercase()
            }
            _ => return Err(SessionError::NotRunning),
        };

        if correct && !state.winners.contains(&player) {
            state.winners.push(player);
        }
        Ok(correct)
    }

    /// Stops accepting guesses and returns who found the word
    async fn close(&self) -> Vec<u32> {
        let mut state = self.state.lock().await;
        state.phase = Phase::Finishing;
        state.winners.clone()
    }

    /// Waits until the session is started (true) or abandoned (false)
    async fn wait_for_start(&self) -> bool {
        loop {
            let notified = self.wake.notified();
            match self.phase().await {
                Phase::Running => return true,
                Phase::Idle | Phase::Finishing => return false,
                Phase::Armed => notified.await,
            }
        }
    }

    /// Decrements the countdown and returns the remaining ticks
    async fn tick(&self) -> u32 {
        let mut state = self.state.lock().await;
        state.countdown = state.countdown.saturating_sub(1);
        state.countdown
    }

    async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.phase = Phase::Idle;
        state.word = None;
        state.countdown = self.total_ticks;
        state.winners.clear();
    }
}

/// Runs one game from word submission to final results
pub struct GameController {
    session: Arc<Session>,
    registry: PlayerRegistry,
    config: GameConfig,
}

impl GameController {
    pub fn new(session: Arc<Session>, registry: PlayerRegistry, config: GameConfig) -> Self {
        Self {
            session,
            registry,
            config,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        info!("game: word chosen, waiting for start");
        self.registry.broadcast(MSG_WAITING_START).await;

        if !self.session.wait_for_start().await {
            info!("game: abandoned before start");
            self.registry.broadcast(MSG_GAME_CANCELLED).await;
            self.registry.drain().await;
            return;
        }

        info!("game: started, {} ticks", self.config.total_ticks);

        let (status_tx, mut status_rx) = watch::channel(self.session.total_ticks());
        let ticker = tokio::spawn(run_ticker(
            Arc::clone(&self.session),
            self.config.tick,
            status_tx,
        ));

        self.broadcast_status(self.session.total_ticks()).await;
        sleep(self.config.min_broadcast_interval).await;

        loop {
            let open = status_rx.changed().await.is_ok();
            let remaining = *status_rx.borrow_and_update();
            if !open || remaining == 0 {
                break;
            }

            self.broadcast_status(remaining).await;
            sleep(self.config.min_broadcast_interval).await;
        }

        if let Err(e) = ticker.await {
            error!("game: ticker task failed: {}", e);
        }

        self.finish().await;
    }

    async fn broadcast_status(&self, remaining: u32) {
        let players = self.registry.all().await;
        let status = status_report(remaining, &players);
        debug!("game: {}", status);
        self.registry.broadcast(&status).await;
    }

    /// Sends the results, resets the session and disconnects everyone
    async fn finish(&self) {
        let winners = self.session.close().await;
        let word = self.session.word().await.unwrap_or_default();

        for id in &winners {
            self.registry.with_player(*id, |p| p.won = true).await;
        }

        let players = self.registry.all().await;
        if !players.iter().any(|p| p.role == Role::Guesser && p.won) {
            // Nobody found the word, so it goes to the poser
            if let Some(poser) = players.iter().find(|p| p.role == Role::Poser) {
                self.registry.with_player(poser.id, |p| p.won = true).await;
            }
        }

        let players = self.registry.all().await;
        let results = final_report(&word, &players);
        info!("game: {}", results);
        self.registry.broadcast(&results).await;

        self.session.reset().await;
        self.registry.drain().await;
        info!("game: finished");
    }
}

/// Decrements the countdown once per `period` and flags every even value
/// for broadcast
async fn run_ticker(session: Arc<Session>, period: Duration, status: watch::Sender<u32>) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let remaining = session.tick().await;
        if remaining % 2 == 0 {
            let _ = status.send(remaining);
        }

        if remaining == 0 {
            break;
        }
    }
}

fn winner_names(players: &[PlayerSnapshot]) -> String {
    let names: Vec<&str> = players
        .iter()
        .filter(|p| p.won)
        .map(|p| p.nickname.as_str())
        .collect();

    if names.is_empty() {
        "nobody".to_string()
    } else {
        names.join(", ")
    }
}

pub fn status_report(remaining: u32, players: &[PlayerSnapshot]) -> String {
    format!(
        "Time left: {}s | players: {} | guessed: {}\n",
        remaining,
        players.len(),
        winner_names(players)
    )
}

pub fn final_report(word: &str, players: &[PlayerSnapshot]) -> String {
    format!(
        "Game over. The word was '{}'. Winners: {}\n",
        word,
        winner_names(players)
    )
}
