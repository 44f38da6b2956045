use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: String,
    pub username: String,
    /// live 세션: 누적 점수, deferred 세션: 가장 좋은 시도의 점수 (둘 다 입장 보너스 포함)
    pub score: f64,
    pub online: bool,
    /// 0부터 시작하는 입장 순서
    pub join_order_rank: u32,
    pub join_order_bonus: f64,
    /// deferred 전용. live 세션에서는 항상 1
    pub attempt_number: u32,
    pub attempt_open: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: String,
    pub username: String,
    pub score: f64,
    pub rank: u32,
}

/// 공개 화면용으로 특정 시점에 얼려 둔 순위표
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardSnapshot {
    pub entries: Vec<LeaderboardEntry>,
    pub taken_at_ms: i64,
}

/// 세션 종료 시 DB에 남기는 최종 순위 한 줄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SessionResult {
    pub access_code: String,
    pub user_id: String,
    pub username: String,
    pub score: f64,
    pub rank: i64,
    pub recorded_at: String,
}
