//! 错误类型定义

use thiserror::Error;

/// 围棋规则与回合错误
///
/// 全部可在本地恢复：只通知行动方，不改变对局状态。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GoError {
    /// 落子超出棋盘
    #[error("point ({x}, {y}) is outside the board")]
    OutOfBounds { x: i32, y: i32 },

    /// 目标交叉点已有棋子
    #[error("point ({x}, {y}) is already occupied")]
    Occupied { x: i32, y: i32 },

    /// 自杀（无气且未提子）
    #[error("suicide is not allowed")]
    Suicide,

    /// 打劫：重复棋盘局面
    #[error("ko: the move would repeat a previous board position")]
    Ko,

    /// 不是你的回合
    #[error("not your turn")]
    NotYourTurn,

    /// 对局已结束
    #[error("the game is already over")]
    GameOver,

    /// 对局仍在进行（RESUME 仅在终局后有效）
    #[error("the game is still in progress")]
    GameInProgress,

    /// 对手尚未加入
    #[error("waiting for an opponent to join")]
    WaitingForOpponent,

    /// 观战者不能行动
    #[error("observers cannot act")]
    Spectator,
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化错误
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// 空命令行
    #[error("empty command")]
    EmptyCommand,

    /// 未知命令
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// 缺少参数
    #[error("{command} is missing its {argument} argument")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    /// 多余参数
    #[error("{command} does not take argument {value:?}")]
    UnexpectedArgument { command: &'static str, value: String },

    /// 非法整数
    #[error("invalid integer: {0:?}")]
    InvalidInteger(String),

    /// 非法棋盘数据
    #[error("invalid board: {reason}")]
    InvalidBoard { reason: String },

    /// 行超长
    #[error("line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },

    /// 非 UTF-8 文本
    #[error("line is not valid UTF-8")]
    InvalidEncoding,

    /// 连接超时
    #[error("connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("connection closed")]
    ConnectionClosed,

    /// 围棋规则错误
    #[error("go error: {0}")]
    Go(#[from] GoError),
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl GoError {
    /// 违反落子规则（而非回合或席位问题），换一个点可能合法
    pub fn is_rule_violation(&self) -> bool {
        matches!(
            self,
            GoError::OutOfBounds { .. } | GoError::Occupied { .. } | GoError::Suicide | GoError::Ko
        )
    }
}
