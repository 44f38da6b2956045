//! # 순위 API 라우트 핸들러
//!
//! ## 엔드포인트
//! - `GET  /api/v1/sessions/{code}/leaderboard` → 실시간 순위 (교사 전용)
//! - `GET  /api/v1/sessions/{code}/leaderboard/snapshot` → 공개 스냅샷
//! - `POST /api/v1/sessions/{code}/leaderboard/snapshot` → 스냅샷 갱신 (교사 전용)
//!
//! 실시간 순위를 학생에게 보여 주면 누가 방금 맞혔는지 드러나므로,
//! 학생과 공개 화면은 스냅샷만 봅니다.

use crate::{error::AppError, middleware::auth::AuthUser, models::*, routes::AppState};
use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

pub async fn get_leaderboard(
    State(state): State<AppState>,
    user: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<Value>, AppError> {
    let session = state.engine.session(&code)?;
    if !session.is_initiator(&user.user_id) {
        return Err(AppError::Forbidden(
            "the live leaderboard is for the session initiator".to_string(),
        ));
    }

    let entries = state.engine.leaderboard(&code).await?;
    Ok(Json(json!({ "entries": entries })))
}

pub async fn get_leaderboard_snapshot(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<LeaderboardSnapshot>, AppError> {
    let snapshot = state.engine.leaderboard_snapshot(&code).await?;
    Ok(Json(snapshot))
}

pub async fn refresh_leaderboard_snapshot(
    State(state): State<AppState>,
    user: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<LeaderboardSnapshot>, AppError> {
    let snapshot = state
        .engine
        .refresh_snapshot(&code, &user.user_id)
        .await?;
    Ok(Json(snapshot))
}
