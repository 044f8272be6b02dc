//! 服务端配置
//!
//! 先读可选的 JSON 文件，再由命令行参数覆盖。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use go_bot::BotConfig;
use protocol::{KoRule, NetworkConfig, BOT_THINK_TIME_MS, DEFAULT_BOARD_SIZE, MAX_BOARD_SIZE};

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("board size {0} is out of range (1..={max})", max = MAX_BOARD_SIZE)]
    InvalidBoardSize(usize),
}

/// 服务端配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub network: NetworkConfig,
    pub board_size: usize,
    pub ko_rule: KoRule,
    /// 第一个玩家入座后由机器人执白
    pub bot_opponent: bool,
    pub bot_think_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            board_size: DEFAULT_BOARD_SIZE,
            ko_rule: KoRule::default(),
            bot_opponent: false,
            bot_think_ms: BOT_THINK_TIME_MS,
        }
    }
}

impl ServerConfig {
    /// 从 JSON 文件加载，缺省字段取默认值
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_BOARD_SIZE).contains(&self.board_size) {
            return Err(ConfigError::InvalidBoardSize(self.board_size));
        }
        Ok(())
    }

    pub fn bot_config(&self) -> BotConfig {
        BotConfig {
            think_time_ms: self.bot_think_ms,
            ..BotConfig::default()
        }
    }
}
