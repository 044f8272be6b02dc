use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use go_server::{replay, GoServer, ReplaySink, ServerConfig};
use protocol::{GameRecord, KoRule};

/// 围棋对局服务器
#[derive(Parser, Debug)]
#[command(name = "go-server", version, about = "Networked Go game server")]
struct Cli {
    /// JSON config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Board size
    #[arg(long)]
    size: Option<usize>,

    /// Ko rule: simple or positional
    #[arg(long)]
    ko: Option<KoRule>,

    /// Seat a bot as White opposite the first player
    #[arg(long)]
    bot: bool,

    /// Bot think time in milliseconds
    #[arg(long)]
    bot_think_ms: Option<u64>,

    /// Replay a saved game record and exit
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,
}

impl Cli {
    fn server_config(&self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };

        if let Some(host) = &self.host {
            config.network.host = host.clone();
        }
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(size) = self.size {
            config.board_size = size;
        }
        if let Some(ko) = self.ko {
            config.ko_rule = ko;
        }
        if self.bot {
            config.bot_opponent = true;
        }
        if let Some(ms) = self.bot_think_ms {
            config.bot_think_ms = ms;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("go_server=debug".parse()?)
                .add_directive("protocol=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Some(path) = &cli.replay {
        return run_replay(path).await;
    }

    let config = cli.server_config()?;
    info!("围棋服务端启动中...");
    let server = GoServer::bind(config).await?;

    tokio::select! {
        result = server.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("收到中断信号，服务端退出");
            Ok(())
        }
    }
}

/// 回放棋谱并逐行打印
async fn run_replay(path: &Path) -> Result<()> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("无法读取棋谱 {}", path.display()))?;
    let record = GameRecord::from_json(&json)
        .with_context(|| format!("无法解析棋谱 {}", path.display()))?;

    let (sink, mut rx) = ReplaySink::new();
    let outcome = replay(&record, Arc::new(sink)).await;

    while let Ok(msg) = rx.try_recv() {
        println!("{msg}");
    }
    outcome?;
    Ok(())
}
