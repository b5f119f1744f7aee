use clap::Parser;
use log::info;
use server::game::GameConfig;
use server::network::Server;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = shared::HOST)]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = shared::PORT)]
    port: u16,

    /// Length of a game in ticks
    #[arg(short = 't', long, default_value_t = shared::TOTAL_GAME_TIME)]
    game_time: u32,

    /// Duration of one tick in milliseconds
    #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u64).range(1..))]
    tick_ms: u64,

    /// Minimum time between status broadcasts in milliseconds
    #[arg(long, default_value = "500")]
    broadcast_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = GameConfig {
        total_ticks: args.game_time,
        tick: Duration::from_millis(args.tick_ms),
        min_broadcast_interval: Duration::from_millis(args.broadcast_ms),
    };

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&address, config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("server: received Ctrl+C, shutting down");
        }
    }

    info!("server: closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["server"]).unwrap();
        assert_eq!(args.port, shared::PORT);
        assert_eq!(args.game_time, shared::TOTAL_GAME_TIME);
        assert_eq!(args.tick_ms, 1000);
    }

    #[test]
    fn test_zero_tick_is_rejected() {
        assert!(Args::try_parse_from(["server", "--tick-ms", "0"]).is_err());
        assert!(Args::try_parse_from(["server", "--tick-ms", "1"]).is_ok());
    }
}
