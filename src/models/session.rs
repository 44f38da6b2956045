//! # 게임 세션 모델 정의
//!
//! 교사가 시작하는 게임 세션(퀴즈/토너먼트/연습)의 데이터 구조체들을 정의합니다.
//! 세션은 짧은 **접속 코드(access code)**로 식별되며, 학생들은 이 코드로 입장합니다.
//!
//! ## 세션 흐름
//! ```text
//! [생성] pending → start → active ⇄ paused → complete → completed
//!                                         └→ archive → archived
//! ```
//! - `active`/`paused` 동안만 엔진(메모리)에 타이머와 점수 상태가 존재합니다.
//! - `completed`/`archived`로 바뀌면 최종 순위를 DB에 기록하고 메모리 상태는 삭제합니다.

use serde::{Deserialize, Serialize};

use super::Question;

/// 게임 진행 방식
///
/// `#[sqlx(type_name = "TEXT", rename_all = "lowercase")]`: DB에는 소문자 문자열로 저장합니다.
/// 예: `PlayMode::Tournament` ↔ `'tournament'`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum PlayMode {
    /// 교사가 문항 흐름을 직접 제어하는 수업용 퀴즈
    Quiz,
    /// 순위 경쟁용 토너먼트 (나중에 deferred 모드로 다시 풀 수 있음)
    Tournament,
    /// 타이머 없는 자율 연습
    Practice,
}

/// 세션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Active,
    Paused,
    Completed,
    Archived,
}

impl SessionStatus {
    /// 엔진에 상태가 올라가 있어야 하는 상태인지 여부
    pub fn is_running(self) -> bool {
        matches!(self, SessionStatus::Active | SessionStatus::Paused)
    }

    /// 더 이상 진행할 수 없는 종료 상태인지 여부
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Archived)
    }
}

/// 게임 세션 엔티티 — DB의 `game_sessions` 테이블 한 행에 대응합니다.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct GameSession {
    /// 학생들이 입력하는 짧은 접속 코드 (기본키)
    pub access_code: String,
    /// 세션을 만든 교사의 사용자 ID — 타이머 제어 권한은 이 사용자에게만 있습니다.
    pub initiator_id: String,
    pub play_mode: PlayMode,
    /// true면 각 학생이 자기 속도로 다시 푸는 deferred 세션
    pub is_deferred: bool,
    pub status: SessionStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// 세션 생성 요청 — `POST /api/v1/sessions`의 요청 본문
///
/// 문항 목록은 외부 문항 은행에서 이미 골라진 상태로 전달됩니다.
/// 이 서버는 문항을 작성하거나 순서를 결정하지 않습니다.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub play_mode: PlayMode,
    /// 생략하면 live 모드(false)
    #[serde(default)]
    pub is_deferred: bool,
    pub questions: Vec<Question>,
}

/// 세션 상태 변경 요청 — `PATCH /api/v1/sessions/{code}`
#[derive(Debug, Deserialize)]
pub struct UpdateSessionStatusRequest {
    pub status: SessionStatus,
}

/// 답안 잠금 요청 — `POST /api/v1/sessions/{code}/lock`
#[derive(Debug, Deserialize)]
pub struct LockAnswersRequest {
    pub locked: bool,
}

/// 세션 입장 요청 — `POST /api/v1/sessions/{code}/join`
#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub username: String,
}
