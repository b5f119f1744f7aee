use std::str::Utf8Error;

pub const HOST: &str = "127.0.0.1";
pub const PORT: u16 = 8080;
pub const MAX_INPUT_LENGTH: usize = 128;
pub const MAX_PACK_LENGTH: usize = 256;
pub const TOTAL_GAME_TIME: u32 = 9;

// Everything after this marker is user input and never read as a command
pub const API_END: &str = "HTTP/1.1\r\n";

pub const API_POST: &str = "POST ";
pub const API_TOUCH: &str = "TOUCH ";
pub const API_USER_INPUT: &str = "USER_INPUT ";
pub const API_START: &str = "START ";
pub const API_GUESS: &str = "GUESS ";
pub const API_FIRST: &str = "FIRST ";
pub const API_GUESSER: &str = "GUESSER ";

pub const API_SUCCESS: &str = "HTTP/1.1 200 OK\r\n";
pub const API_USER_ERROR: &str = "HTTP/1.1 403 ERROR\r\n";
pub const API_BAD_REQUEST: &str = "HTTP/1.1 400 ERROR\r\n";
pub const API_ERROR_500: &str = "HTTP/1.1 500 ERROR\r\n";

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("request has no \"HTTP/1.1\\r\\n\" terminator")]
    MissingTerminator,

    #[error("request is not valid utf-8")]
    Decode(#[from] Utf8Error),

    #[error("input is {len} characters long, at most {max} allowed")]
    InputTooLong { len: usize, max: usize },
}

pub fn encode(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

pub fn decode(data: &[u8]) -> Result<String, ProtocolError> {
    Ok(std::str::from_utf8(data)?.to_string())
}

/// Returns everything after the first terminator.
pub fn extract_body(request: &str) -> Result<&str, ProtocolError> {
    request
        .split_once(API_END)
        .map(|(_, body)| body)
        .ok_or(ProtocolError::MissingTerminator)
}

/// Applies the input length cap, counted in characters rather than bytes.
pub fn validate_input(input: &str) -> Result<&str, ProtocolError> {
    let len = input.chars().count();
    if len <= MAX_INPUT_LENGTH {
        Ok(input)
    } else {
        Err(ProtocolError::InputTooLong {
            len,
            max: MAX_INPUT_LENGTH,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Touch,
    UserInput,
    Start,
    Guess,
}

impl Command {
    fn prefix(self) -> String {
        let token = match self {
            Command::Touch => API_TOUCH,
            Command::UserInput => API_USER_INPUT,
            Command::Start => API_START,
            Command::Guess => API_GUESS,
        };
        format!("{API_POST}{token}")
    }

    /// Builds a complete request frame carrying `body`.
    pub fn frame(self, body: &str) -> String {
        format!("{}{API_END}{body}", self.prefix())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<'a> {
    /// `None` when the frame is well formed but names no known command
    pub command: Option<Command>,
    pub body: &'a str,
}

impl<'a> Request<'a> {
    pub fn parse(text: &'a str) -> Result<Self, ProtocolError> {
        let (header, body) = text
            .split_once(API_END)
            .ok_or(ProtocolError::MissingTerminator)?;

        let command = [
            Command::Touch,
            Command::UserInput,
            Command::Start,
            Command::Guess,
        ]
        .into_iter()
        .find(|command| header.contains(&command.prefix()));

        Ok(Request { command, body })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Poser,
    Guesser,
}

impl Role {
    pub fn tag(self) -> &'static str {
        match self {
            Role::Poser => API_FIRST,
            Role::Guesser => API_GUESSER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Success,
    UserError(String),
    BadRequest,
    ServerError,
}

impl Response {
    pub fn status_line(&self) -> &'static str {
        match self {
            Response::Success => API_SUCCESS,
            Response::UserError(_) => API_USER_ERROR,
            Response::BadRequest => API_BAD_REQUEST,
            Response::ServerError => API_ERROR_500,
        }
    }

    /// Renders the response for a player of the given role. `touch` marks
    /// the reply to a nickname registration.
    pub fn render(&self, role: Role, touch: bool) -> String {
        let touch = if touch { API_TOUCH } else { "" };
        let reason = match self {
            Response::UserError(reason) => reason.as_str(),
            _ => "",
        };
        format!(
            "{API_POST}{}{touch}{}{reason}",
            role.tag(),
            self.status_line()
        )
    }
}
