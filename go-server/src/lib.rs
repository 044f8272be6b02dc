//! 围棋服务端
//!
//! 包含:
//! - 对局会话与回合状态机
//! - 参与者抽象（网络玩家、机器人、回放）
//! - 会话注册表
//! - TCP 服务器
//! - 棋谱回放

pub mod bot;
pub mod config;
pub mod participant;
pub mod replay;
pub mod server;
pub mod session;

pub use bot::{seat_bot, BotPlayer};
pub use config::{ConfigError, ServerConfig};
pub use participant::{Participant, RemotePlayer, ReplaySink};
pub use replay::{replay, ReplayError};
pub use server::GoServer;
pub use session::{
    Audience, GameSession, Outbox, Phase, Seats, SessionHandle, SessionRegistry, SessionStatus,
    Ticket, WeakSessionHandle,
};
