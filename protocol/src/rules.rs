//! 落子规则
//!
//! 合法性判定（越界、占用、自杀、打劫）、提子以及气的计算。
//! 所有泛洪搜索都使用显式队列，19 路棋盘上的大块棋也不会爆栈。

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::board::{Board, Snapshot};
use crate::error::GoError;
use crate::score::{self, Prisoners, Score};
use crate::stone::{Color, Point, StoneColor};

/// 一块棋：同色四连通的棋子及其气
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub color: Color,
    pub stones: Vec<Point>,
    /// 去重后的气
    pub liberties: Vec<Point>,
}

impl Group {
    pub fn liberty_count(&self) -> usize {
        self.liberties.len()
    }

    pub fn is_dead(&self) -> bool {
        self.liberties.is_empty()
    }
}

fn slot(board: &Board, point: Point) -> usize {
    point.y as usize * board.size() + point.x as usize
}

/// 从种子点出发收集整块棋
///
/// 种子越界或为空点时返回 None。
pub fn group_at(board: &Board, seed: Point) -> Option<Group> {
    let color = board.get(seed)?.color()?;
    let stone = StoneColor::from(color);
    let cells = board.size() * board.size();

    let mut visited = vec![false; cells];
    let mut liberty_seen = vec![false; cells];
    let mut stones = Vec::new();
    let mut liberties = Vec::new();
    let mut frontier = VecDeque::from([seed]);
    visited[slot(board, seed)] = true;

    while let Some(point) = frontier.pop_front() {
        stones.push(point);
        for next in board.neighbors(point) {
            let i = slot(board, next);
            match board.get(next) {
                Some(StoneColor::Empty) if !liberty_seen[i] => {
                    liberty_seen[i] = true;
                    liberties.push(next);
                }
                Some(c) if c == stone && !visited[i] => {
                    visited[i] = true;
                    frontier.push_back(next);
                }
                _ => {}
            }
        }
    }

    Some(Group {
        color,
        stones,
        liberties,
    })
}

/// 提掉与 `point` 相邻、已无气的对方棋块
///
/// 返回被提掉的坐标，每颗子只出现一次。
pub fn remove_captured(board: &mut Board, point: Point, color: Color) -> Vec<Point> {
    let opponent = StoneColor::from(color.opponent());
    let mut removed = Vec::new();

    for next in point.neighbors() {
        // 已提掉的子变成空点，同一块棋不会被重复计数
        if board.get(next) != Some(opponent) {
            continue;
        }
        if let Some(group) = group_at(board, next) {
            if group.is_dead() {
                for stone in &group.stones {
                    board.set(*stone, StoneColor::Empty);
                }
                removed.extend(group.stones);
            }
        }
    }

    removed
}

/// 打劫规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KoRule {
    /// 禁止还原对方上一手之前的局面
    #[default]
    Simple,
    /// 禁止还原本局出现过的任何局面（全局同形）
    Positional,
}

impl fmt::Display for KoRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KoRule::Simple => f.write_str("simple"),
            KoRule::Positional => f.write_str("positional"),
        }
    }
}

impl FromStr for KoRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(KoRule::Simple),
            "positional" | "superko" => Ok(KoRule::Positional),
            other => Err(format!("unknown ko rule {other:?} (expected simple or positional)")),
        }
    }
}

/// 打劫判定所需的历史局面
///
/// `previous` 是最近一手落子之前的局面，也就是轮到的一方看来
/// “对方上一手之前”的局面。`seen` 只在全局同形规则下使用。
#[derive(Debug, Clone, Default)]
pub struct RepetitionHistory {
    previous: Option<Snapshot>,
    seen: HashSet<Snapshot>,
}

impl RepetitionHistory {
    /// 记录一手棋落下之前的局面
    pub fn record(&mut self, before: Snapshot, rule: KoRule) {
        if rule == KoRule::Positional {
            self.seen.insert(before.clone());
        }
        self.previous = Some(before);
    }

    /// 该局面是否构成重复
    pub fn repeats(&self, board: &Board, rule: KoRule) -> bool {
        if self.previous.as_ref().is_some_and(|s| board.matches(s)) {
            return true;
        }
        rule == KoRule::Positional && self.seen.contains(&board.snapshot())
    }
}

/// 规则引擎
///
/// 除打劫历史外无状态。不负责通知玩家：拒绝原因以 [`GoError`] 返回，
/// 由调用方决定如何告知。
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    ko_rule: KoRule,
    history: RepetitionHistory,
}

impl RuleEngine {
    pub fn new(ko_rule: KoRule) -> Self {
        Self {
            ko_rule,
            history: RepetitionHistory::default(),
        }
    }

    /// 判定落子是否合法，返回拒绝原因
    ///
    /// 在棋盘副本上模拟，调用方的棋盘不会被修改。
    /// 先提子后判自杀：能提子的“自杀”手是合法的。
    pub fn check_move(&self, board: &Board, point: Point, color: Color) -> Result<(), GoError> {
        match board.get(point) {
            None => {
                return Err(GoError::OutOfBounds {
                    x: point.x,
                    y: point.y,
                })
            }
            Some(StoneColor::Empty) => {}
            Some(_) => {
                return Err(GoError::Occupied {
                    x: point.x,
                    y: point.y,
                })
            }
        }

        let mut scratch = board.clone();
        scratch.set(point, color.into());
        let captured = remove_captured(&mut scratch, point, color);

        if captured.is_empty() && group_at(&scratch, point).is_some_and(|g| g.is_dead()) {
            return Err(GoError::Suicide);
        }

        if self.history.repeats(&scratch, self.ko_rule) {
            return Err(GoError::Ko);
        }

        Ok(())
    }

    pub fn is_move_valid(&self, board: &Board, point: Point, color: Color) -> bool {
        self.check_move(board, point, color).is_ok()
    }

    /// 落子并提子，返回提子数
    ///
    /// 调用前必须已经通过 [`RuleEngine::check_move`]，这里不再校验。
    pub fn play_move(&mut self, board: &mut Board, point: Point, color: Color) -> usize {
        self.history.record(board.snapshot(), self.ko_rule);
        board.set(point, color.into());
        remove_captured(board, point, color).len()
    }

    /// 终局数目：地 + 提子
    pub fn calculate_score(&self, board: &Board, prisoners: Prisoners) -> Score {
        score::calculate_score(board, prisoners)
    }
}
