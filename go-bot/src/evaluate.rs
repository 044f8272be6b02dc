//! 落子评估函数

use std::collections::HashSet;

use protocol::{group_at, remove_captured, Board, Color, Point, StoneColor};

/// 评估器
pub struct Evaluator;

/// 各项分值
mod weights {
    /// 落下后整块无气
    pub const SUICIDE: f64 = -1000.0;
    /// 落下后只剩一口气
    pub const SELF_ATARI: f64 = -50.0;
    /// 相邻对方棋块只剩一口气（可提）
    pub const CAPTURE: f64 = 1000.0;
    /// 相邻对方棋块剩两口气（可打吃）
    pub const PRESSURE: f64 = 20.0;
    /// 相邻己方棋块只剩一口气（救子）
    pub const RESCUE: f64 = 800.0;
    /// 与己方棋块相连
    pub const CONNECT: f64 = 5.0;
    /// 不接触对方时落在一线
    pub const EDGE: f64 = -10.0;
}

impl Evaluator {
    /// 评估 `color` 在 `point` 落子的得分，越高越好
    ///
    /// `point` 必须是棋盘内的空点。
    pub fn evaluate(board: &Board, point: Point, color: Color) -> f64 {
        let mut scratch = board.clone();
        scratch.set(point, color.into());
        remove_captured(&mut scratch, point, color);

        let liberties = group_at(&scratch, point).map_or(0, |g| g.liberty_count());
        if liberties == 0 {
            return weights::SUICIDE;
        }

        let mut score = 0.0;
        if liberties == 1 {
            score += weights::SELF_ATARI;
        }

        let mine = StoneColor::from(color);
        let theirs = StoneColor::from(color.opponent());
        let mut counted: HashSet<Point> = HashSet::new();
        let mut touches_enemy = false;

        for next in board.neighbors(point) {
            let stone = board.get(next);
            if stone == Some(theirs) {
                touches_enemy = true;
            }
            if counted.contains(&next) {
                continue;
            }
            let Some(group) = group_at(board, next) else {
                continue;
            };
            counted.extend(group.stones.iter().copied());

            if stone == Some(theirs) {
                match group.liberty_count() {
                    1 => score += weights::CAPTURE,
                    2 => score += weights::PRESSURE,
                    _ => {}
                }
            } else if stone == Some(mine) {
                if group.liberty_count() == 1 {
                    score += weights::RESCUE;
                } else {
                    score += weights::CONNECT;
                }
            }
        }

        if !touches_enemy {
            let size = board.size() as f64;
            let center = size / 2.0;
            score -= (point.x as f64 - center).abs() + (point.y as f64 - center).abs();

            let last = board.size() as i32 - 1;
            if point.x == 0 || point.y == 0 || point.x == last || point.y == last {
                score += weights::EDGE;
            }
        }

        score
    }
}
