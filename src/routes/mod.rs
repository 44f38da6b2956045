//! # 라우트 핸들러 모듈
//!
//! HTTP 요청을 처리하는 핸들러 함수들을 모아둔 모듈입니다.
//! Axum에서 핸들러는 HTTP 요청을 받아 응답을 반환하는 async 함수입니다.
//!
//! 각 하위 모듈:
//! - `answers`: 답안 제출
//! - `events`: WebSocket 이벤트 스트림 (대시보드/프로젝션/플레이어 방)
//! - `health`: 서버 상태 확인 (헬스체크)
//! - `leaderboard`: 실시간 순위와 공개 스냅샷
//! - `sessions`: 게임 세션 생성/시작/상태 변경/삭제, 입장/퇴장
//! - `timers`: 문항 타이머 제어와 조회

pub mod answers;
pub mod events;
pub mod health;
pub mod leaderboard;
pub mod sessions;
pub mod timers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;

use crate::services::GameEngine;

// 각 모듈의 핸들러 함수들을 재공개하여
// `routes::submit_answer`처럼 바로 접근 가능하게 합니다.
pub use answers::*;
pub use events::*;
pub use health::*;
pub use leaderboard::*;
pub use sessions::*;
pub use timers::*;

/// 애플리케이션 공유 상태
///
/// 모든 요청 핸들러가 `State(state): State<AppState>`로 접근합니다.
/// `#[derive(Clone)]`: Axum의 State Extractor는 요청마다 AppState를 clone합니다.
/// 풀과 엔진은 내부적으로 `Arc`라서 clone해도 같은 인스턴스를 가리킵니다.
#[derive(Clone)]
pub struct AppState {
    /// SQLite 연결 풀
    pub pool: SqlitePool,
    /// JWT 토큰 검증용 비밀키
    pub jwt_secret: String,
    /// 타이머/채점 엔진 (메모리 상태 전부)
    pub engine: Arc<GameEngine>,
}

/// `/api/v1` 아래에 붙는 모든 API 라우트
///
/// Axum 0.8부터 경로 파라미터는 `{code}`처럼 중괄호로 씁니다.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        // 게임 세션
        .route("/sessions", get(list_sessions).post(create_session))
        .route(
            "/sessions/{code}",
            get(get_session).patch(update_session_status).delete(delete_session),
        )
        .route("/sessions/{code}/start", post(start_session))
        .route("/sessions/{code}/results", get(get_results))
        // 참가자
        .route("/sessions/{code}/join", post(join_session))
        .route("/sessions/{code}/leave", post(leave_session))
        .route("/sessions/{code}/attempts/finish", post(finish_attempt))
        .route("/sessions/{code}/lock", post(lock_answers))
        // 타이머
        .route(
            "/sessions/{code}/questions/{question_id}/timer",
            get(get_timer).post(control_timer),
        )
        // 답안
        .route("/sessions/{code}/answers", post(submit_answer))
        // 순위
        .route("/sessions/{code}/leaderboard", get(get_leaderboard))
        .route(
            "/sessions/{code}/leaderboard/snapshot",
            get(get_leaderboard_snapshot).post(refresh_leaderboard_snapshot),
        )
        // 실시간 이벤트 (WebSocket)
        .route("/sessions/{code}/events/{room}", get(subscribe_events))
        // 헬스체크 API (서버 상태 확인용)
        .route("/health", get(health_check))
        // .with_state(): 이 라우터의 모든 핸들러에서 AppState를 사용할 수 있게 합니다.
        .with_state(state)
}
