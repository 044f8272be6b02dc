//! 参与者抽象
//!
//! 对局只需要能“收到一条消息”的对象：网络玩家、机器人、回放接收端都实现同一个 trait。

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use protocol::{ProtocolError, ServerMessage};

/// 参与者
///
/// 会话持锁投递，`notify` 不能等待对端。
#[async_trait]
pub trait Participant: Send + Sync {
    /// 投递一条消息，失败视为对方已断开
    async fn notify(&self, msg: ServerMessage) -> protocol::Result<()>;

    /// 用于日志的描述
    fn describe(&self) -> String;
}

/// 网络玩家
///
/// 消息进入有界队列，由连接的写任务取出并写到 socket。
/// 队列满说明对端长时间不读，按断开处理。
pub struct RemotePlayer {
    peer: String,
    tx: mpsc::Sender<ServerMessage>,
}

impl RemotePlayer {
    pub fn new(peer: impl Into<String>, tx: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            peer: peer.into(),
            tx,
        }
    }
}

#[async_trait]
impl Participant for RemotePlayer {
    async fn notify(&self, msg: ServerMessage) -> protocol::Result<()> {
        self.tx.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => {
                debug!("{} 的发送队列已满", self.peer);
                ProtocolError::ConnectionClosed
            }
            TrySendError::Closed(_) => ProtocolError::ConnectionClosed,
        })
    }

    fn describe(&self) -> String {
        format!("玩家 {}", self.peer)
    }
}

/// 回放接收端，只收消息不行动
pub struct ReplaySink {
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ReplaySink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Participant for ReplaySink {
    async fn notify(&self, msg: ServerMessage) -> protocol::Result<()> {
        self.tx.send(msg).map_err(|_| ProtocolError::ConnectionClosed)
    }

    fn describe(&self) -> String {
        "回放".to_string()
    }
}
