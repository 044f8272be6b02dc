//! 围棋共享协议库
//!
//! 包含:
//! - 棋子颜色、坐标、棋盘等核心数据结构
//! - 落子规则（提子、自杀、打劫）与终局数目
//! - 行协议消息定义 (ClientCommand, ServerMessage)
//! - 传输层抽象 (Connector, Connection, Listener traits)
//! - 行编解码 (LineReader, LineWriter)
//! - 棋谱格式 (JSON)

mod board;
mod constants;
mod error;
mod message;
mod record;
mod rules;
mod score;
mod stone;
mod transport;

pub use board::{Board, Snapshot};
pub use constants::*;
pub use error::{GoError, ProtocolError, Result};
pub use message::{Action, ClientCommand, GameResult, Notice, Seat, ServerLine, ServerMessage};
pub use record::{ActionRecord, GameRecord};
pub use rules::{group_at, remove_captured, Group, KoRule, RepetitionHistory, RuleEngine};
pub use score::{
    calculate_score, empty_regions, seki_stones, GameOutcome, Prisoners, Region, Score,
    ScoreBreakdown,
};
pub use stone::{Color, Point, StoneColor};
pub use transport::{
    Connection, Connector, Listener,
    TcpConnection, TcpConnector, TcpListener,
    NetworkConfig,
    LineReader, LineWriter,
};
