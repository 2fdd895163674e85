use clap::{Parser, Subcommand};
use quicperf::{Client, Config, Server};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "quicperf")]
#[command(about = "QUIC single-stream throughput measurement tool", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the traffic-source server
    Server {
        /// Port to listen on
        #[arg(short, long, default_value = "4433")]
        port: u16,

        /// Bind to specific address
        #[arg(short, long)]
        bind: Option<String>,

        /// Write chunk size in bytes
        #[arg(short = 'l', long, default_value = "262144")]
        chunk_size: usize,
    },

    /// Run the measuring client
    Client {
        /// Server address to connect to
        server: String,

        /// Port to connect to
        #[arg(short, long, default_value = "4433")]
        port: u16,

        /// Measurement window in seconds
        #[arg(short = 't', long, default_value = "10")]
        time: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server {
            port,
            bind,
            chunk_size,
        } => {
            let mut config = Config::server(port).with_chunk_size(chunk_size);
            if let Some(bind_addr) = bind {
                config.bind_addr = Some(bind_addr.parse()?);
            }

            let server = Server::new(config);
            server.run().await?;
        }

        Commands::Client { server, port, time } => {
            let config =
                Config::client(server, port).with_duration(Duration::from_secs(time));

            let client = Client::new(config)?;
            client.run().await?;
        }
    }

    Ok(())
}
