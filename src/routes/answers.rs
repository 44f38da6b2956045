//! # 답안 제출 핸들러
//!
//! - `POST /api/v1/sessions/{code}/answers`
//!   + `{ "question_id": "q1", "value": 2, "client_timestamp_ms": 1718000000000 }`
//!
//! 늦은 답안이나 멈춘 문항의 답안도 HTTP 200으로 응답합니다.
//! 거절 여부는 본문의 `accepted`와 `reason`으로 알려 줍니다:
//! `{ "accepted": false, "reason": "late" }`

use crate::{error::AppError, middleware::auth::AuthUser, models::*, routes::AppState};
use axum::{
    extract::{Path, State},
    Json,
};

pub async fn submit_answer(
    State(state): State<AppState>,
    user: AuthUser,
    Path(code): Path<String>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<Json<SubmissionOutcome>, AppError> {
    let outcome = state
        .engine
        .submit_answer(&code, &user.user_id, req)
        .await?;
    Ok(Json(outcome))
}
