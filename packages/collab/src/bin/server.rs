use clap::Parser;
use reactype_collab::{Config, RelayServer};
use std::path::PathBuf;

/// ReacType collaboration relay
#[derive(Parser, Debug)]
#[command(name = "reactype-relay")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing reactype.config.json
    #[arg(short, long, default_value = ".")]
    config: PathBuf,

    /// Address to listen on, overriding the config file
    #[arg(short, long)]
    bind: Option<String>,

    /// Port to listen on, keeping the configured host
    #[arg(short, long, conflicts_with = "bind")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = Config::load(&args.config)?;

    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    } else if let Some(port) = args.port {
        let host = config
            .server
            .bind_addr
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "127.0.0.1".to_string());
        config.server.bind_addr = format!("{}:{}", host, port);
    }

    RelayServer::new(config.server).serve().await
}
