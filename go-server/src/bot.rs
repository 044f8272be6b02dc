//! 机器人参与者
//!
//! 通知进入无界队列（投递永不阻塞），由机器人任务处理：缓存最新棋盘，
//! 轮到自己时等待思考时间后落子，被拒绝时排除该点重新选择。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use go_bot::{BotConfig, BotEngine, BotMove};
use protocol::{Action, Board, Notice, Point, ProtocolError, ServerMessage};

use crate::participant::Participant;
use crate::session::{SessionHandle, Ticket, WeakSessionHandle};

/// 机器人参与者
pub struct BotPlayer {
    tx: mpsc::UnboundedSender<ServerMessage>,
}

#[async_trait]
impl Participant for BotPlayer {
    async fn notify(&self, msg: ServerMessage) -> protocol::Result<()> {
        self.tx.send(msg).map_err(|_| ProtocolError::ConnectionClosed)
    }

    fn describe(&self) -> String {
        "机器人".to_string()
    }
}

/// 让机器人入座并启动它的任务
pub async fn seat_bot(handle: &SessionHandle, config: BotConfig) -> (Ticket, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let ticket = handle.join(Arc::new(BotPlayer { tx })).await;
    let task = tokio::spawn(run_bot(
        rx,
        handle.downgrade(),
        ticket,
        BotEngine::new(config),
    ));
    (ticket, task)
}

/// 机器人主循环，会话销毁或席位释放后退出
async fn run_bot(
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
    session: WeakSessionHandle,
    ticket: Ticket,
    mut engine: BotEngine,
) {
    let Some(color) = ticket.seat.color() else {
        return;
    };
    info!("机器人执 {}", color);

    let mut board: Option<Board> = None;
    let mut last_point: Option<Point> = None;

    while let Some(msg) = rx.recv().await {
        match msg {
            ServerMessage::Board(snapshot) => {
                board = Some(Board::from_snapshot(&snapshot));
                continue;
            }
            ServerMessage::Notice(Notice::YourTurn { .. }) => {
                engine.begin_turn();
                tokio::time::sleep(engine.think_time()).await;
            }
            ServerMessage::Notice(Notice::Rejected(err)) if err.is_rule_violation() => {
                // 只有落子会被规则拒绝；停一手被拒绝不会重试
                let Some(point) = last_point.take() else {
                    continue;
                };
                debug!("机器人落子 {} 被拒绝: {}", point, err);
                engine.reject(point);
            }
            _ => continue,
        }

        let Some(current) = board.as_ref() else {
            continue;
        };
        let action = match engine.choose(current, color) {
            BotMove::Play(point) => {
                last_point = Some(point);
                Action::from(point)
            }
            BotMove::Pass => {
                last_point = None;
                Action::Pass
            }
        };

        let Some(handle) = session.upgrade() else {
            break;
        };
        if let Err(e) = handle.submit(&ticket, action).await {
            debug!("机器人动作 {} 未被接受: {}", action, e);
        }
    }

    debug!("机器人任务结束");
}
