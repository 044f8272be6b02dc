//! 棋谱回放
//!
//! 把保存的动作逐个交给一局新的对局，接收端以观战者身份收到全部消息。

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use protocol::{GameRecord, GoError, Notice, MAX_BOARD_SIZE};

use crate::participant::Participant;
use crate::session::GameSession;

/// 回放错误
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("action #{number} was rejected: {source}")]
    Rejected { number: u32, source: GoError },

    #[error("board size {0} is out of range (1..={max})", max = MAX_BOARD_SIZE)]
    InvalidBoardSize(usize),
}

/// 回放一份棋谱，返回回放结束后的对局
pub async fn replay(
    record: &GameRecord,
    sink: Arc<dyn Participant>,
) -> Result<GameSession, ReplayError> {
    if !(1..=MAX_BOARD_SIZE).contains(&record.board_size) {
        return Err(ReplayError::InvalidBoardSize(record.board_size));
    }

    sink.notify(
        Notice::Info(format!(
            "Replaying {} actions recorded at {}",
            record.len(),
            record.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ))
        .into(),
    )
    .await
    .ok();

    let mut session = GameSession::new(record.board_size, record.ko_rule);
    info!(
        "回放 {}x{} 棋谱，共 {} 手",
        session.board_size(),
        session.board_size(),
        record.len()
    );
    let (_ticket, outbox) = session.observe(sink.clone());
    session.dispatch(outbox).await;

    for entry in &record.actions {
        let outbox = session
            .apply(entry.color, entry.action)
            .map_err(|source| ReplayError::Rejected {
                number: entry.number,
                source,
            })?;
        debug!("#{} {} {}", entry.number, entry.color, entry.action);
        session.dispatch(outbox).await;
    }

    sink.notify(Notice::Info("Replay finished".to_string()).into())
        .await
        .ok();
    Ok(session)
}
