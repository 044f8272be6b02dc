//! 棋盘状态

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::FIELD_SEPARATOR;
use crate::error::ProtocolError;
use crate::stone::{Point, StoneColor};

/// 棋盘
///
/// `size × size` 的交叉点，索引为 y * size + x。每个交叉点总有确定状态。
/// 棋盘本身不含任何规则知识。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    size: usize,
    cells: Vec<StoneColor>,
}

impl Board {
    /// 创建空棋盘
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![StoneColor::Empty; size * size],
        }
    }

    /// 从快照恢复棋盘
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            size: snapshot.size,
            cells: snapshot.cells.clone(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// 坐标是否在棋盘内
    pub fn contains(&self, point: Point) -> bool {
        point.x >= 0
            && point.y >= 0
            && (point.x as usize) < self.size
            && (point.y as usize) < self.size
    }

    fn index(&self, point: Point) -> Option<usize> {
        if self.contains(point) {
            Some(point.y as usize * self.size + point.x as usize)
        } else {
            None
        }
    }

    /// 获取交叉点状态，越界返回 None
    pub fn get(&self, point: Point) -> Option<StoneColor> {
        self.index(point).map(|i| self.cells[i])
    }

    /// 设置交叉点状态，越界时不做任何事
    pub fn set(&mut self, point: Point, stone: StoneColor) {
        if let Some(i) = self.index(point) {
            self.cells[i] = stone;
        }
    }

    /// 按行优先顺序遍历所有坐标
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        let size = self.size as i32;
        (0..size).flat_map(move |y| (0..size).map(move |x| Point::new(x, y)))
    }

    /// 棋盘内的相邻点
    pub fn neighbors(&self, point: Point) -> impl Iterator<Item = Point> + '_ {
        point.neighbors().into_iter().filter(|p| self.contains(*p))
    }

    /// 统计某种状态的交叉点数量
    pub fn count(&self, stone: StoneColor) -> usize {
        self.cells.iter().filter(|c| **c == stone).count()
    }

    /// 深拷贝当前局面
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            size: self.size,
            cells: self.cells.clone(),
        }
    }

    /// 当前局面是否与快照完全一致
    pub fn matches(&self, snapshot: &Snapshot) -> bool {
        self.size == snapshot.size && self.cells == snapshot.cells
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.size.max(1)) {
            for cell in row {
                let c = match cell {
                    StoneColor::Black => 'X',
                    StoneColor::White => 'O',
                    StoneColor::Empty => '.',
                };
                write!(f, "{c} ")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// 不可变的棋盘快照
///
/// 用于打劫判定和 BOARD 消息。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Snapshot {
    size: usize,
    cells: Vec<StoneColor>,
}

impl Snapshot {
    pub fn size(&self) -> usize {
        self.size
    }

    /// 获取交叉点状态，越界返回 None
    pub fn get(&self, point: Point) -> Option<StoneColor> {
        let size = self.size as i32;
        if point.x < 0 || point.y < 0 || point.x >= size || point.y >= size {
            return None;
        }
        Some(self.cells[point.y as usize * self.size + point.x as usize])
    }

    /// 行优先的全部交叉点
    pub fn cells(&self) -> &[StoneColor] {
        &self.cells
    }
}

/// 行优先、以分号分隔：`EMPTY;BLACK;WHITE;...`
impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cell) in self.cells.iter().enumerate() {
            if i > 0 {
                write!(f, "{FIELD_SEPARATOR}")?;
            }
            f.write_str(cell.as_str())?;
        }
        Ok(())
    }
}

impl FromStr for Snapshot {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cells = s
            .trim()
            .split(FIELD_SEPARATOR)
            .map(|field| field.trim().parse::<StoneColor>())
            .collect::<Result<Vec<_>, _>>()?;

        let size = (cells.len() as f64).sqrt() as usize;
        if size == 0 || size * size != cells.len() {
            return Err(ProtocolError::InvalidBoard {
                reason: format!("{} entries do not form a square board", cells.len()),
            });
        }

        Ok(Self { size, cells })
    }
}
