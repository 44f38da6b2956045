//! # 타이머 API 라우트 핸들러
//!
//! ## 엔드포인트
//! - `POST /api/v1/sessions/{code}/questions/{question_id}/timer` → 타이머 제어
//!   + `{ "action": "run" | "pause" | "stop" | "edit", "duration_ms": 30000 }`
//! - `GET  /api/v1/sessions/{code}/questions/{question_id}/timer` → 현재 타이머 상태
//!
//! live 세션은 세션을 만든 교사만, deferred 세션은 학생이 자기 시도의 타이머를 제어합니다.
//! 응답은 방(room)으로 브로드캐스트되는 것과 같은 `TimerSnapshot`입니다.

use crate::{error::AppError, middleware::auth::AuthUser, models::*, routes::AppState};
use axum::{
    extract::{Path, State},
    Json,
};

pub async fn control_timer(
    State(state): State<AppState>,
    user: AuthUser,
    Path((code, question_id)): Path<(String, String)>,
    Json(req): Json<ControlTimerRequest>,
) -> Result<Json<TimerSnapshot>, AppError> {
    let snapshot = state
        .engine
        .control_timer(&code, &user.user_id, &question_id, req.action, req.duration_ms)
        .await?;
    Ok(Json(snapshot))
}

pub async fn get_timer(
    State(state): State<AppState>,
    user: AuthUser,
    Path((code, question_id)): Path<(String, String)>,
) -> Result<Json<TimerSnapshot>, AppError> {
    let snapshot = state
        .engine
        .timer_state(&code, &user.user_id, &question_id)
        .await?;
    Ok(Json(snapshot))
}
