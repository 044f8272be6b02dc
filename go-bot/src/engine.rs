//! 选点引擎
//!
//! 对每个空点打分，加上 [0, 1) 的随机扰动后取最高分。
//! 最高分仍低于停着阈值时停一手。

use std::collections::HashSet;
use std::time::Duration;

use protocol::{Board, Color, Point, StoneColor, BOT_THINK_TIME_MS};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::evaluate::Evaluator;

/// 机器人配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// 每手落子前的等待时间
    pub think_time_ms: u64,
    /// 最高分低于该值时停一手
    pub pass_threshold: f64,
    /// 随机种子，None 时使用系统熵
    pub seed: Option<u64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            think_time_ms: BOT_THINK_TIME_MS,
            pass_threshold: -500.0,
            seed: None,
        }
    }
}

/// 机器人的决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotMove {
    Play(Point),
    Pass,
}

/// 机器人引擎
pub struct BotEngine {
    config: BotConfig,
    rng: ChaCha8Rng,
    /// 本回合被服务端拒绝过的点
    rejected: HashSet<Point>,
}

impl BotEngine {
    /// 创建新的引擎
    pub fn new(config: BotConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            config,
            rng,
            rejected: HashSet::new(),
        }
    }

    pub fn think_time(&self) -> Duration {
        Duration::from_millis(self.config.think_time_ms)
    }

    /// 新回合开始，清空被拒绝的点
    pub fn begin_turn(&mut self) {
        self.rejected.clear();
    }

    /// 记录被拒绝的点，本回合不再选择
    pub fn reject(&mut self, point: Point) {
        self.rejected.insert(point);
    }

    /// 选择下一手
    pub fn choose(&mut self, board: &Board, color: Color) -> BotMove {
        let mut best: Option<(Point, f64)> = None;

        for point in board.points() {
            if board.get(point) != Some(StoneColor::Empty) || self.rejected.contains(&point) {
                continue;
            }

            let score = Evaluator::evaluate(board, point, color) + self.rng.gen::<f64>();
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((point, score));
            }
        }

        match best {
            Some((point, score)) if score >= self.config.pass_threshold => {
                debug!("{} 选择 {} (评分 {:.1})", color, point, score);
                BotMove::Play(point)
            }
            Some((_, score)) => {
                debug!("{} 最高评分 {:.1} 低于阈值，停一手", color, score);
                BotMove::Pass
            }
            None => BotMove::Pass,
        }
    }
}
