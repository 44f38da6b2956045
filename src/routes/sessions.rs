//! # 게임 세션 API 라우트 핸들러
//!
//! 세션의 생성부터 종료까지, 그리고 학생의 입장/퇴장을 처리합니다.
//!
//! ## 엔드포인트 목록
//! | 메서드 | 경로 | 핸들러 | 설명 |
//! |--------|------|--------|------|
//! | GET | /api/v1/sessions | `list_sessions` | 내가 만든 세션 목록 |
//! | POST | /api/v1/sessions | `create_session` | 새 세션 (문항 포함) |
//! | GET | /api/v1/sessions/{code} | `get_session` | 세션 조회 |
//! | PATCH | /api/v1/sessions/{code} | `update_session_status` | 일시정지/재개/종료 |
//! | DELETE | /api/v1/sessions/{code} | `delete_session` | 세션 삭제 |
//! | POST | /api/v1/sessions/{code}/start | `start_session` | 엔진에 올리고 시작 |
//! | GET | /api/v1/sessions/{code}/results | `get_results` | 최종 순위 |
//! | POST | /api/v1/sessions/{code}/join | `join_session` | 학생 입장 |
//! | POST | /api/v1/sessions/{code}/leave | `leave_session` | 학생 퇴장 (점수 유지) |
//! | POST | /api/v1/sessions/{code}/attempts/finish | `finish_attempt` | deferred 시도 마치기 |
//! | POST | /api/v1/sessions/{code}/lock | `lock_answers` | 답안 잠금/해제 |
//!
//! ## 세션 사용 흐름
//! ```text
//! 1. 교사: POST /sessions (문항과 함께 생성, pending)
//! 2. 교사: POST /sessions/{code}/start (active, 엔진에 올라감)
//! 3. 학생: POST /sessions/{code}/join
//! 4. ... 타이머 제어, 답안 제출 ...
//! 5. 교사: PATCH /sessions/{code} { "status": "completed" } (최종 순위 저장, 메모리 정리)
//! ```

use std::collections::HashSet;

use crate::{
    db,
    error::AppError,
    middleware::auth::AuthUser,
    models::*,
    routes::AppState,
    services::{sessions::LiveSession, timers::MAX_DURATION_MS},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

/// 접속 코드 충돌 시 다시 시도하는 횟수
const ACCESS_CODE_ATTEMPTS: usize = 5;

/// 세션을 조회하고, 요청자가 만든 세션인지 확인합니다.
async fn owned_session(
    state: &AppState,
    code: &str,
    user: &AuthUser,
) -> Result<GameSession, AppError> {
    let session = db::get_session(&state.pool, code)
        .await?
        .ok_or(AppError::NotFound)?;
    if session.initiator_id != user.user_id {
        return Err(AppError::Forbidden(
            "only the session initiator may do this".to_string(),
        ));
    }
    Ok(session)
}

/// 6자리 대문자 접속 코드. UUIDv4의 앞부분을 씁니다.
fn new_access_code() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..6].to_uppercase()
}

fn validate_questions(questions: &[Question]) -> Result<(), AppError> {
    if questions.is_empty() {
        return Err(AppError::BadRequest(
            "a session needs at least one question".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for question in questions {
        if question.id.trim().is_empty() {
            return Err(AppError::BadRequest("question id is required".to_string()));
        }
        if !seen.insert(question.id.as_str()) {
            return Err(AppError::BadRequest(format!(
                "duplicate question id '{}'",
                question.id
            )));
        }
        if question.points < 0.0 {
            return Err(AppError::BadRequest(format!(
                "question '{}' has negative points",
                question.id
            )));
        }
        if question
            .time_limit_ms
            .is_some_and(|ms| ms <= 0 || ms > MAX_DURATION_MS)
        {
            return Err(AppError::BadRequest(format!(
                "question '{}' needs a time limit between 1 and {} ms",
                question.id, MAX_DURATION_MS
            )));
        }
    }
    Ok(())
}

/// `GET /api/v1/sessions` → `{ "sessions": [...] }`
pub async fn list_sessions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, AppError> {
    let sessions = db::list_sessions_for_initiator(&state.pool, &user.user_id).await?;
    Ok(Json(json!({ "sessions": sessions })))
}

/// 새 게임 세션을 만듭니다.
///
/// `POST /api/v1/sessions`
/// + `{ "play_mode": "quiz", "is_deferred": false, "questions": [...] }`
///
/// 요청한 사용자가 세션의 initiator가 되어, 이후 타이머 제어 권한을 가집니다.
pub async fn create_session(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<GameSession>), AppError> {
    validate_questions(&req.questions)?;
    if req.is_deferred && req.play_mode == PlayMode::Quiz {
        return Err(AppError::BadRequest(
            "quiz sessions are always live".to_string(),
        ));
    }

    for _ in 0..ACCESS_CODE_ATTEMPTS {
        let code = new_access_code();
        if db::get_session(&state.pool, &code).await?.is_some() {
            continue;
        }

        let session = db::create_session(
            &state.pool,
            &code,
            &user.user_id,
            req.play_mode,
            req.is_deferred,
            &req.questions,
        )
        .await?;
        tracing::info!(session = %code, initiator = %user.user_id, "session created");
        return Ok((StatusCode::CREATED, Json(session)));
    }

    Err(AppError::Conflict(
        "could not allocate a unique access code".to_string(),
    ))
}

/// `GET /api/v1/sessions/{code}` → 세션 행과 엔진 상태
pub async fn get_session(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<Value>, AppError> {
    let session = db::get_session(&state.pool, &code)
        .await?
        .ok_or(AppError::NotFound)?;
    let answers_locked = state
        .engine
        .session(&code)
        .map(|live| live.answers_locked)
        .unwrap_or(false);

    Ok(Json(json!({
        "session": session,
        "running": state.engine.is_running(&code),
        "answers_locked": answers_locked,
    })))
}

/// 세션을 시작합니다.
///
/// `POST /api/v1/sessions/{code}/start`
///
/// DB에서 문항 목록을 한 번 읽어 엔진에 올리고 상태를 `active`로 바꿉니다.
/// `pending` 상태에서만 가능합니다.
pub async fn start_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<GameSession>, AppError> {
    let session = owned_session(&state, &code, &user).await?;
    if session.status != SessionStatus::Pending {
        return Err(AppError::Conflict(format!(
            "session {} is {:?}, not pending",
            code, session.status
        )));
    }

    let questions = db::list_questions(&state.pool, &code).await?;
    state
        .engine
        .open_session(LiveSession::new(&session, questions))?;

    let updated = db::update_status(&state.pool, &code, SessionStatus::Active)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(updated))
}

/// 세션 상태를 바꿉니다.
///
/// `PATCH /api/v1/sessions/{code}` + `{ "status": "paused" | "active" | "completed" | "archived" }`
///
/// - `paused` ⇄ `active`: 엔진 상태는 그대로 두고 표시만 바꿉니다.
/// - `completed`/`archived`: 최종 순위를 기록하고 엔진 메모리를 비웁니다.
pub async fn update_session_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(code): Path<String>,
    Json(req): Json<UpdateSessionStatusRequest>,
) -> Result<Json<GameSession>, AppError> {
    let session = owned_session(&state, &code, &user).await?;
    if session.status.is_terminal() {
        return Err(AppError::Conflict(format!("session {} has ended", code)));
    }

    match req.status {
        SessionStatus::Pending => {
            return Err(AppError::BadRequest(
                "a session cannot go back to pending".to_string(),
            ));
        }
        SessionStatus::Active | SessionStatus::Paused => {
            if !session.status.is_running() {
                return Err(AppError::Conflict(format!(
                    "session {} has not been started",
                    code
                )));
            }
            state.engine.set_status(&code, req.status)?;
        }
        SessionStatus::Completed | SessionStatus::Archived => {
            // 결과와 상태를 먼저 기록하고, 엔진 메모리는 그 다음에 비웁니다.
            if state.engine.is_running(&code) {
                let standings = state.engine.leaderboard(&code).await?;
                db::save_results(&state.pool, &code, &standings).await?;
            }
        }
    }

    let updated = db::update_status(&state.pool, &code, req.status)
        .await?
        .ok_or(AppError::NotFound)?;
    if updated.status.is_terminal() {
        state.engine.close_session(&code).await?;
    }
    Ok(Json(updated))
}

/// 세션을 삭제합니다. 진행 중이면 엔진 상태도 함께 지웁니다.
///
/// `DELETE /api/v1/sessions/{code}` → 204 No Content
pub async fn delete_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(code): Path<String>,
) -> Result<StatusCode, AppError> {
    owned_session(&state, &code, &user).await?;

    if state.engine.is_running(&code) {
        state.engine.close_session(&code).await?;
    }
    db::delete_session(&state.pool, &code).await?;
    tracing::info!(session = %code, "session deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/v1/sessions/{code}/results` → `{ "results": [...] }`
pub async fn get_results(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<Value>, AppError> {
    let results = db::list_results(&state.pool, &code).await?;
    Ok(Json(json!({ "results": results })))
}

/// 학생이 세션에 입장합니다. 이미 입장했던 학생은 같은 레코드로 다시 연결됩니다.
///
/// `POST /api/v1/sessions/{code}/join` + `{ "username": "Alice" }`
pub async fn join_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(code): Path<String>,
    Json(req): Json<JoinRequest>,
) -> Result<Json<Participant>, AppError> {
    let participant = state
        .engine
        .join(&code, &user.user_id, &req.username)
        .await?;
    Ok(Json(participant))
}

/// `POST /api/v1/sessions/{code}/leave` → 204. 점수와 순위는 그대로 남습니다.
pub async fn leave_session(
    State(state): State<AppState>,
    user: AuthUser,
    Path(code): Path<String>,
) -> Result<StatusCode, AppError> {
    state.engine.disconnect(&code, &user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/v1/sessions/{code}/attempts/finish` — deferred 시도를 마칩니다.
pub async fn finish_attempt(
    State(state): State<AppState>,
    user: AuthUser,
    Path(code): Path<String>,
) -> Result<Json<Participant>, AppError> {
    let participant = state.engine.finish_attempt(&code, &user.user_id).await?;
    Ok(Json(participant))
}

/// `POST /api/v1/sessions/{code}/lock` + `{ "locked": true }`
pub async fn lock_answers(
    State(state): State<AppState>,
    user: AuthUser,
    Path(code): Path<String>,
    Json(req): Json<LockAnswersRequest>,
) -> Result<Json<Value>, AppError> {
    state
        .engine
        .set_answers_locked(&code, &user.user_id, req.locked)?;
    Ok(Json(json!({ "locked": req.locked })))
}
