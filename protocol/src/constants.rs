//! 协议常量定义

use std::time::Duration;

/// 棋谱格式版本
pub const RECORD_VERSION: &str = "1.0";

/// 默认监听地址
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// 默认端口
pub const DEFAULT_PORT: u16 = 12345;

/// 默认棋盘大小
pub const DEFAULT_BOARD_SIZE: usize = 19;

/// 配置允许的最大棋盘大小
pub const MAX_BOARD_SIZE: usize = 25;

/// 单行消息最大字节数（不含换行符）
pub const MAX_LINE_LEN: usize = 4096;

/// BOARD 消息中各交叉点之间的分隔符
pub const FIELD_SEPARATOR: char = ';';

/// 机器人默认思考时间（毫秒）
pub const BOT_THINK_TIME_MS: u64 = 500;

/// 连接超时（秒）
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// 连接超时 Duration
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(CONNECT_TIMEOUT_SECS);
