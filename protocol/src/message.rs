//! 行协议消息定义
//!
//! 客户端每行一条命令（`MOVE x y` / `PASS` / `SURRENDER` / `RESUME` / `QUIT`），
//! 服务端每行一条消息（`COLOR ...` / `BOARD ...` / `MESSAGE ...`）。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::board::Snapshot;
use crate::error::{GoError, ProtocolError};
use crate::score::{GameOutcome, Prisoners, Score};
use crate::stone::{Color, Point};

/// 对局动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// 落子
    Move { x: i32, y: i32 },
    /// 停一手
    Pass,
    /// 认输
    Surrender,
    /// 终局后恢复对局
    Resume,
}

impl Action {
    pub fn point(&self) -> Option<Point> {
        match self {
            Action::Move { x, y } => Some(Point::new(*x, *y)),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Action::Move { .. } => "MOVE",
            Action::Pass => "PASS",
            Action::Surrender => "SURRENDER",
            Action::Resume => "RESUME",
        }
    }
}

impl From<Point> for Action {
    fn from(point: Point) -> Self {
        Action::Move {
            x: point.x,
            y: point.y,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Move { x, y } => write!(f, "MOVE {x} {y}"),
            other => f.write_str(other.keyword()),
        }
    }
}

/// 客户端发送给服务端的命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    /// 对局动作
    Action(Action),
    /// 断开连接，不影响对局
    Quit,
}

impl ClientCommand {
    pub fn keyword(&self) -> &'static str {
        match self {
            ClientCommand::Action(action) => action.keyword(),
            ClientCommand::Quit => "QUIT",
        }
    }
}

fn int_arg(
    token: Option<&str>,
    command: &'static str,
    argument: &'static str,
) -> Result<i32, ProtocolError> {
    let token = token.ok_or(ProtocolError::MissingArgument { command, argument })?;
    token
        .parse::<i32>()
        .map_err(|_| ProtocolError::InvalidInteger(token.to_string()))
}

/// 解析一行命令
///
/// 按 ASCII 空白切分，命令字不区分大小写；除 MOVE 外都不接受参数。
impl FromStr for ClientCommand {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.split_ascii_whitespace();
        let keyword = tokens.next().ok_or(ProtocolError::EmptyCommand)?;

        let command = match keyword.to_ascii_uppercase().as_str() {
            "MOVE" => {
                let x = int_arg(tokens.next(), "MOVE", "x")?;
                let y = int_arg(tokens.next(), "MOVE", "y")?;
                ClientCommand::Action(Action::Move { x, y })
            }
            "PASS" => ClientCommand::Action(Action::Pass),
            "SURRENDER" => ClientCommand::Action(Action::Surrender),
            "RESUME" => ClientCommand::Action(Action::Resume),
            "QUIT" => ClientCommand::Quit,
            _ => return Err(ProtocolError::UnknownCommand(keyword.to_string())),
        };

        if let Some(extra) = tokens.next() {
            return Err(ProtocolError::UnexpectedArgument {
                command: command.keyword(),
                value: extra.to_string(),
            });
        }

        Ok(command)
    }
}

impl fmt::Display for ClientCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientCommand::Action(action) => action.fmt(f),
            ClientCommand::Quit => f.write_str("QUIT"),
        }
    }
}

/// 连接时分配的席位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Seat {
    Player(Color),
    Observer,
}

impl Seat {
    pub fn color(&self) -> Option<Color> {
        match self {
            Seat::Player(color) => Some(*color),
            Seat::Observer => None,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seat::Player(color) => color.fmt(f),
            Seat::Observer => f.write_str("OBSERVER"),
        }
    }
}

impl FromStr for Seat {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BLACK" => Ok(Seat::Player(Color::Black)),
            "WHITE" => Ok(Seat::Player(Color::White)),
            "OBSERVER" => Ok(Seat::Observer),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

/// 终局结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    /// 一方认输
    Resignation { winner: Color },
    /// 双方连续停一手后数子
    Scored(Score),
}

impl GameResult {
    pub fn outcome(&self) -> GameOutcome {
        match self {
            GameResult::Resignation { winner } => GameOutcome::Winner(*winner),
            GameResult::Scored(score) => score.outcome(),
        }
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameResult::Resignation { winner } => {
                write!(f, "{} surrendered. {winner} wins!", winner.opponent())
            }
            GameResult::Scored(score) => {
                write!(f, "Game over. {score}. ")?;
                match score.outcome() {
                    GameOutcome::Winner(color) => write!(f, "{color} wins!"),
                    GameOutcome::Draw => f.write_str("Draw!"),
                }
            }
        }
    }
}

/// 服务端通知（MESSAGE 行的内容）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// 轮到你
    YourTurn { prisoners: Prisoners },
    /// 轮到对手
    OpponentTurn { prisoners: Prisoners },
    /// 观战者看到的回合状态
    ToMove { color: Color, prisoners: Prisoners },
    /// 某方停一手
    Passed { by: Color },
    /// 某方恢复对局
    Resumed { by: Color },
    /// 动作被拒绝
    Rejected(GoError),
    /// 命令格式错误
    Malformed(String),
    /// 对局结束
    GameOver(GameResult),
    /// 某方断开连接
    OpponentDisconnected(Color),
    /// 其他提示
    Info(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::YourTurn { prisoners } => write!(f, "Your move ({prisoners})"),
            Notice::OpponentTurn { prisoners } => write!(f, "Opponent's move ({prisoners})"),
            Notice::ToMove { color, prisoners } => write!(f, "{color} to move ({prisoners})"),
            Notice::Passed { by } => write!(f, "{by} passed"),
            Notice::Resumed { by } => write!(f, "{by} resumed the game"),
            Notice::Rejected(err) => write!(f, "Rejected: {err}"),
            Notice::Malformed(reason) => write!(f, "Malformed command: {reason}"),
            Notice::GameOver(result) => result.fmt(f),
            Notice::OpponentDisconnected(color) => write!(f, "{color} disconnected"),
            Notice::Info(text) => f.write_str(text),
        }
    }
}

/// 服务端发送给客户端的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// 席位分配，连接时发送一次
    Assignment(Seat),
    /// 完整棋盘
    Board(Snapshot),
    /// 文本通知
    Notice(Notice),
}

impl From<Notice> for ServerMessage {
    fn from(notice: Notice) -> Self {
        ServerMessage::Notice(notice)
    }
}

/// 渲染为一行协议文本（不含换行符）
impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Assignment(seat) => write!(f, "COLOR {seat}"),
            ServerMessage::Board(snapshot) => write!(f, "BOARD {snapshot}"),
            ServerMessage::Notice(notice) => {
                let text = notice.to_string().replace(['\r', '\n'], " ");
                write!(f, "MESSAGE {text}")
            }
        }
    }
}

/// 客户端收到的一行服务端消息
///
/// 通知只保留文本，无法还原为 [`Notice`]。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    Color(Seat),
    Board(Snapshot),
    Message(String),
}

impl FromStr for ServerLine {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (keyword, rest) = s.split_once(' ').unwrap_or((s, ""));
        match keyword {
            "COLOR" => Ok(ServerLine::Color(rest.trim().parse()?)),
            "BOARD" => Ok(ServerLine::Board(rest.parse()?)),
            "MESSAGE" => Ok(ServerLine::Message(rest.to_string())),
            "" => Err(ProtocolError::EmptyCommand),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}
