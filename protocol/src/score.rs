//! 终局计分
//!
//! 数地（空点区域归属）加提子数。被双方包围的区域是公气，
//! 紧邻公气的棋块视为双活，双活棋块围住的空也不计为地。

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::rules::group_at;
use crate::stone::{Color, Point, StoneColor};

/// 双方提子数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prisoners {
    /// 黑方提掉的白子数
    pub black: u32,
    /// 白方提掉的黑子数
    pub white: u32,
}

impl Prisoners {
    pub fn add(&mut self, color: Color, count: usize) {
        let count = count as u32;
        match color {
            Color::Black => self.black += count,
            Color::White => self.white += count,
        }
    }

    pub fn of(&self, color: Color) -> u32 {
        match color {
            Color::Black => self.black,
            Color::White => self.white,
        }
    }
}

impl fmt::Display for Prisoners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "prisoners: B={}, W={}", self.black, self.white)
    }
}

/// 单方得分明细
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub territory: u32,
    pub prisoners: u32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u32 {
        self.territory + self.prisoners
    }
}

/// 对局结果（胜方或平局）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOutcome {
    Winner(Color),
    Draw,
}

/// 终局得分
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub black: ScoreBreakdown,
    pub white: ScoreBreakdown,
}

impl Score {
    pub fn of(&self, color: Color) -> ScoreBreakdown {
        match color {
            Color::Black => self.black,
            Color::White => self.white,
        }
    }

    /// 总分高者胜，相等为平局（无贴目）
    pub fn outcome(&self) -> GameOutcome {
        let (black, white) = (self.black.total(), self.white.total());
        if black > white {
            GameOutcome::Winner(Color::Black)
        } else if white > black {
            GameOutcome::Winner(Color::White)
        } else {
            GameOutcome::Draw
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, color) in [Color::Black, Color::White].into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let part = self.of(color);
            write!(
                f,
                "{color} {} (territory {}, prisoners {})",
                part.total(),
                part.territory,
                part.prisoners
            )?;
        }
        Ok(())
    }
}

/// 四连通的空点区域
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub points: Vec<Point>,
    /// 与区域相邻的棋子
    pub border: Vec<Point>,
    pub touches_black: bool,
    pub touches_white: bool,
}

impl Region {
    /// 只被一方包围时的归属
    pub fn owner(&self) -> Option<Color> {
        match (self.touches_black, self.touches_white) {
            (true, false) => Some(Color::Black),
            (false, true) => Some(Color::White),
            _ => None,
        }
    }

    /// 被双方包围的公气
    pub fn is_neutral(&self) -> bool {
        self.touches_black && self.touches_white
    }
}

fn slot(size: usize, point: Point) -> usize {
    point.y as usize * size + point.x as usize
}

/// 把所有空点划分成区域
pub fn empty_regions(board: &Board) -> Vec<Region> {
    let size = board.size();
    let mut visited = vec![false; size * size];
    let mut regions = Vec::new();

    for start in board.points() {
        if visited[slot(size, start)] || board.get(start) != Some(StoneColor::Empty) {
            continue;
        }

        let mut region = Region {
            points: Vec::new(),
            border: Vec::new(),
            touches_black: false,
            touches_white: false,
        };
        let mut border_seen = vec![false; size * size];
        let mut frontier = VecDeque::from([start]);
        visited[slot(size, start)] = true;

        while let Some(point) = frontier.pop_front() {
            region.points.push(point);
            for next in board.neighbors(point) {
                let i = slot(size, next);
                match board.get(next) {
                    Some(StoneColor::Empty) => {
                        if !visited[i] {
                            visited[i] = true;
                            frontier.push_back(next);
                        }
                    }
                    Some(stone) => {
                        match stone {
                            StoneColor::Black => region.touches_black = true,
                            StoneColor::White => region.touches_white = true,
                            StoneColor::Empty => {}
                        }
                        if !border_seen[i] {
                            border_seen[i] = true;
                            region.border.push(next);
                        }
                    }
                    None => {}
                }
            }
        }

        regions.push(region);
    }

    regions
}

/// 标记紧邻公气的整块棋（双活）
pub fn seki_stones(board: &Board, regions: &[Region]) -> Vec<bool> {
    let size = board.size();
    let mut marked = vec![false; size * size];

    for region in regions.iter().filter(|r| r.is_neutral()) {
        for &stone in &region.border {
            if marked[slot(size, stone)] {
                continue;
            }
            if let Some(group) = group_at(board, stone) {
                for point in group.stones {
                    marked[slot(size, point)] = true;
                }
            }
        }
    }

    marked
}

/// 计算双方得分
pub fn calculate_score(board: &Board, prisoners: Prisoners) -> Score {
    let size = board.size();
    let regions = empty_regions(board);
    let seki = seki_stones(board, &regions);

    let mut score = Score {
        black: ScoreBreakdown {
            territory: 0,
            prisoners: prisoners.black,
        },
        white: ScoreBreakdown {
            territory: 0,
            prisoners: prisoners.white,
        },
    };

    for region in &regions {
        let Some(owner) = region.owner() else {
            continue;
        };
        if region.border.iter().any(|p| seki[slot(size, *p)]) {
            continue;
        }
        let territory = region.points.len() as u32;
        match owner {
            Color::Black => score.black.territory += territory,
            Color::White => score.white.territory += territory,
        }
    }

    score
}
