//! 围棋机器人
//!
//! 包含:
//! - 单点局部评估（提子、救子、气、离中心距离）
//! - 带随机扰动的贪心选点

mod engine;
mod evaluate;

pub use engine::{BotConfig, BotEngine, BotMove};
pub use evaluate::Evaluator;
