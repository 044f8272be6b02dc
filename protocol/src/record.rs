//! 棋谱记录格式
//!
//! 按顺序记录被接受的动作，以 JSON 交给外部持久化或回放。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::RECORD_VERSION;
use crate::message::{Action, GameResult};
use crate::rules::KoRule;
use crate::stone::Color;

/// 单个动作记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// 从 1 开始的序号
    pub number: u32,
    pub color: Color,
    pub action: Action,
    /// Unix 时间戳（毫秒）
    pub timestamp_ms: i64,
}

/// 完整的棋谱记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    /// 版本号
    pub version: String,
    pub board_size: usize,
    #[serde(default)]
    pub ko_rule: KoRule,
    pub started_at: DateTime<Utc>,
    pub actions: Vec<ActionRecord>,
    /// 最近一次终局结果（RESUME 后不清除）
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub result: Option<GameResult>,
}

impl GameRecord {
    /// 创建新的棋谱记录
    pub fn new(board_size: usize, ko_rule: KoRule) -> Self {
        Self {
            version: RECORD_VERSION.to_string(),
            board_size,
            ko_rule,
            started_at: Utc::now(),
            actions: Vec::new(),
            result: None,
        }
    }

    /// 追加一条动作
    pub fn push(&mut self, color: Color, action: Action) -> &ActionRecord {
        let number = self.actions.len() as u32 + 1;
        self.actions.push(ActionRecord {
            number,
            color,
            action,
            timestamp_ms: Utc::now().timestamp_millis(),
        });
        &self.actions[self.actions.len() - 1]
    }

    /// 设置游戏结果
    pub fn set_result(&mut self, result: GameResult) {
        self.result = Some(result);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// 转换为 JSON 字符串
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 从 JSON 字符串解析
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_record_json() {
        let mut record = GameRecord::new(9, KoRule::Simple);
        record.push(Color::Black, Action::Move { x: 2, y: 2 });
        record.push(Color::White, Action::Pass);
        record.push(Color::Black, Action::Surrender);
        record.set_result(GameResult::Resignation {
            winner: Color::White,
        });

        let json = record.to_json().unwrap();
        assert!(json.contains("\"board_size\": 9"));

        let parsed = GameRecord::from_json(&json).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(parsed.actions[1].action, Action::Pass);
    }

    #[test]
    fn test_actions_are_numbered_in_order() {
        let mut record = GameRecord::new(19, KoRule::Positional);
        assert!(record.is_empty());

        let first = record.push(Color::Black, Action::Move { x: 3, y: 3 }).number;
        let second = record.push(Color::White, Action::Move { x: 15, y: 15 }).number;

        assert_eq!((first, second), (1, 2));
        assert_eq!(record.len(), 2);
        assert!(record.actions[0].timestamp_ms <= record.actions[1].timestamp_ms);
    }

    #[test]
    fn test_missing_optional_fields() {
        let json = r#"{
            "version": "1.0",
            "board_size": 5,
            "started_at": "2024-01-01T00:00:00Z",
            "actions": []
        }"#;
        let record = GameRecord::from_json(json).unwrap();
        assert_eq!(record.ko_rule, KoRule::Simple);
        assert_eq!(record.result, None);
    }
}
