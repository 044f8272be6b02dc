//! 棋子颜色与坐标

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// 执棋方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    /// 黑方（先手）
    Black,
    /// 白方
    White,
}

impl Color {
    /// 获取对方
    pub fn opponent(&self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    /// 协议中的名称
    pub fn as_str(&self) -> &'static str {
        match self {
            Color::Black => "BLACK",
            Color::White => "WHITE",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 交叉点状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoneColor {
    Black,
    White,
    Empty,
}

impl StoneColor {
    /// 棋子所属方，空点返回 None
    pub fn color(&self) -> Option<Color> {
        match self {
            StoneColor::Black => Some(Color::Black),
            StoneColor::White => Some(Color::White),
            StoneColor::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == StoneColor::Empty
    }

    /// 协议中的名称
    pub fn as_str(&self) -> &'static str {
        match self {
            StoneColor::Black => "BLACK",
            StoneColor::White => "WHITE",
            StoneColor::Empty => "EMPTY",
        }
    }
}

impl From<Color> for StoneColor {
    fn from(color: Color) -> Self {
        match color {
            Color::Black => StoneColor::Black,
            Color::White => StoneColor::White,
        }
    }
}

impl fmt::Display for StoneColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoneColor {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BLACK" => Ok(StoneColor::Black),
            "WHITE" => Ok(StoneColor::White),
            "EMPTY" => Ok(StoneColor::Empty),
            other => Err(ProtocolError::InvalidBoard {
                reason: format!("unknown intersection state {other:?}"),
            }),
        }
    }
}

/// 棋盘坐标
///
/// 使用有符号整数，协议中的负坐标可以原样送到规则层并以越界拒绝。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// 列
    pub x: i32,
    /// 行
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// 上下左右四个相邻点（可能越界，由棋盘过滤）
    pub fn neighbors(&self) -> [Point; 4] {
        [
            Point::new(self.x + 1, self.y),
            Point::new(self.x - 1, self.y),
            Point::new(self.x, self.y + 1),
            Point::new(self.x, self.y - 1),
        ]
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
