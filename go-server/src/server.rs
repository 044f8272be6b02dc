//! 服务器主逻辑
//!
//! 接受连接、分配席位，每个连接一个读任务和一个写任务。

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use protocol::{
    ClientCommand, Color, LineReader, LineWriter, Listener, Notice, ProtocolError, Seat,
    ServerMessage, TcpConnection, TcpListener,
};

use crate::bot::seat_bot;
use crate::config::ServerConfig;
use crate::participant::RemotePlayer;
use crate::session::{SessionHandle, SessionRegistry, Ticket};

/// 每个连接的发送队列长度，写满即视为对端断开
const OUTBOUND_QUEUE: usize = 256;

/// 围棋服务器
pub struct GoServer {
    config: Arc<ServerConfig>,
    listener: TcpListener,
    registry: Arc<Mutex<SessionRegistry>>,
}

impl GoServer {
    /// 校验配置并绑定监听地址
    pub async fn bind(config: ServerConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let addr = config.network.addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("无法监听 {addr}"))?;

        info!(
            "监听 {} ({}x{}, 打劫规则 {}, 机器人 {})",
            listener.local_addr().unwrap_or(addr),
            config.board_size,
            config.board_size,
            config.ko_rule,
            if config.bot_opponent { "开" } else { "关" },
        );

        let registry = SessionRegistry::new(config.board_size, config.ko_rule);
        Ok(Self {
            config: Arc::new(config),
            listener,
            registry: Arc::new(Mutex::new(registry)),
        })
    }

    pub fn local_addr(&self) -> Option<String> {
        self.listener.local_addr()
    }

    /// 接受连接的主循环
    ///
    /// 每个连接在自己的任务里入座，单个连接出错只记日志，不会结束循环。
    pub async fn run(mut self) -> anyhow::Result<()> {
        loop {
            match self.listener.accept_with_addr().await {
                Ok((conn, addr)) => {
                    tokio::spawn(handle_connection(
                        conn,
                        addr,
                        self.config.clone(),
                        self.registry.clone(),
                    ));
                }
                Err(e) => warn!("接受连接失败: {}", e),
            }
        }
    }
}

async fn handle_connection(
    conn: TcpConnection,
    addr: SocketAddr,
    config: Arc<ServerConfig>,
    registry: Arc<Mutex<SessionRegistry>>,
) {
    let (reader, writer) = conn.split();
    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);
    tokio::spawn(write_loop(writer, rx, addr));

    // 入座完成前一直持有注册表锁，席位按连接顺序分配
    let (handle, ticket) = {
        let mut registry = registry.lock().await;
        let handle = registry.open_session().await;
        let ticket = handle
            .join(Arc::new(RemotePlayer::new(addr.to_string(), tx)))
            .await;

        if config.bot_opponent && ticket.seat == Seat::Player(Color::Black) {
            seat_bot(&handle, config.bot_config()).await;
        }
        (handle, ticket)
    };
    info!("{} 加入会话 #{}，席位 {}", addr, handle.id(), ticket.seat);

    read_loop(reader, handle, ticket, addr).await;
}

/// 写任务：把队列中的消息逐行写出
///
/// 队列关闭（席位释放）或写失败时结束，并关闭写端。
async fn write_loop<W>(
    mut writer: LineWriter<W>,
    mut rx: mpsc::Receiver<ServerMessage>,
    addr: SocketAddr,
) where
    W: AsyncWrite + Unpin + Send,
{
    while let Some(msg) = rx.recv().await {
        if let Err(e) = writer.send(&msg).await {
            debug!("写入 {} 失败: {}", addr, e);
            return;
        }
    }
    let _ = writer.shutdown().await;
}

/// 读任务：逐行解析命令并提交给会话
async fn read_loop<R>(
    mut reader: LineReader<R>,
    handle: SessionHandle,
    ticket: Ticket,
    addr: SocketAddr,
) where
    R: AsyncRead + Unpin + Send,
{
    loop {
        let line = match reader.read_line().await {
            Ok(line) => line,
            Err(ProtocolError::ConnectionClosed) => break,
            Err(e @ (ProtocolError::LineTooLong { .. } | ProtocolError::InvalidEncoding)) => {
                handle.notify(&ticket, Notice::Malformed(e.to_string())).await;
                continue;
            }
            Err(e) => {
                warn!("读取 {} 失败: {}", addr, e);
                break;
            }
        };

        match line.parse::<ClientCommand>() {
            Ok(ClientCommand::Quit) => {
                debug!("{} 退出", addr);
                break;
            }
            Ok(ClientCommand::Action(action)) => {
                match handle.submit(&ticket, action).await {
                    Ok(()) => debug!("{} ({}) {}", addr, ticket.seat, action),
                    Err(e) => debug!("{} ({}) {} 被拒绝: {}", addr, ticket.seat, action, e),
                }
            }
            Err(e) => handle.notify(&ticket, Notice::Malformed(e.to_string())).await,
        }
    }

    handle.disconnect(&ticket).await;
    info!("{} 断开连接", addr);
}
