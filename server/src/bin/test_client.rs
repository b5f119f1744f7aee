use clap::Parser;
use shared::{Command, MAX_PACK_LENGTH};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[command(author, version, about = "Scripted player for manual testing", long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Nickname sent on connect
    #[arg(short, long, default_value = "tester")]
    nickname: String,

    /// Secret word to submit; only meaningful for the first player
    #[arg(short, long)]
    word: Option<String>,

    /// Guesses to submit once the countdown is running
    #[arg(short, long)]
    guess: Vec<String>,
}

async fn receive(stream: &mut TcpStream) -> Result<Option<String>, Box<dyn std::error::Error>> {
    let mut buf = [0u8; MAX_PACK_LENGTH];
    let len = stream.read(&mut buf).await?;
    if len == 0 {
        return Ok(None);
    }

    let text = shared::decode(&buf[..len])?;
    println!("<- {:?}", text);
    Ok(Some(text))
}

async fn send(stream: &mut TcpStream, command: Command, body: &str) -> std::io::Result<()> {
    let frame = command.frame(body);
    println!("-> {:?}", frame);
    stream.write_all(&shared::encode(&frame)).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut stream = TcpStream::connect(&args.server).await?;
    println!("Connected to {}", args.server);

    send(&mut stream, Command::Touch, &args.nickname).await?;
    receive(&mut stream).await?;

    if let Some(word) = &args.word {
        send(&mut stream, Command::UserInput, word).await?;
        receive(&mut stream).await?;

        // Start sends no reply
        send(&mut stream, Command::Start, "").await?;
    } else if !args.guess.is_empty() {
        println!("Waiting for the countdown...");
        loop {
            match receive(&mut stream).await? {
                Some(text) if text.contains("Time left:") => break,
                Some(_) => continue,
                None => {
                    println!("Server closed the connection");
                    return Ok(());
                }
            }
        }

        for guess in &args.guess {
            send(&mut stream, Command::Guess, guess).await?;
            receive(&mut stream).await?;
        }
    }

    while receive(&mut stream).await?.is_some() {}

    println!("Server closed the connection");
    Ok(())
}
