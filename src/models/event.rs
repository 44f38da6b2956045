//! # 실시간 이벤트 페이로드
//!
//! WebSocket으로 각 방(room)에 내보내는 메시지입니다.
//! JSON 모양: `{ "event": "timer_update", "payload": { ... } }`

use serde::{Deserialize, Serialize};

use super::{LeaderboardEntry, TimerSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    TimerUpdate(TimerSnapshot),
    LeaderboardUpdate {
        entries: Vec<LeaderboardEntry>,
    },
    /// 보기별 선택 인원 (퀴즈 모드 대시보드 전용)
    AnswerStatsUpdate {
        question_id: String,
        distribution: Vec<u32>,
    },
}
