//! # 게임 세션 데이터베이스 쿼리 모듈
//!
//! 게임 세션 행의 생성, 조회, 상태 변경, 삭제를 담당하는 SQL 쿼리 함수들입니다.
//!
//! ## 세션 라이프사이클
//! ```text
//! create_session() → pending ─ start → active ⇄ paused ─ complete → completed
//!                                                      └─ delete_session() → [삭제]
//! ```
//!
//! 플레이 중 상태(타이머, 점수)는 DB에 쓰지 않습니다. DB에는 세션 메타데이터와
//! 문항 목록, 그리고 종료 시점의 최종 순위만 남깁니다.

use super::questions::insert_questions;
use crate::error::AppError;
use crate::models::{GameSession, PlayMode, Question, SessionStatus};
use sqlx::SqlitePool;

/// 새 게임 세션을 문항 목록과 함께 만듭니다.
///
/// 세션 행과 문항 행을 한 트랜잭션으로 씁니다. 중간에 실패하면 아무것도 남지 않습니다.
/// `created_at`, `updated_at`은 DB의 DEFAULT 값으로 자동 설정되고, 상태는 항상 `pending`으로 시작합니다.
pub async fn create_session(
    pool: &SqlitePool,
    access_code: &str,
    initiator_id: &str,
    play_mode: PlayMode,
    is_deferred: bool,
    questions: &[Question],
) -> Result<GameSession, AppError> {
    let mut tx = pool.begin().await?;

    // r#"..."#: 원시 문자열 리터럴. SQL을 이스케이프 없이 쓸 수 있습니다.
    sqlx::query(
        r#"
        INSERT INTO game_sessions (access_code, initiator_id, play_mode, is_deferred, status)
        VALUES (?, ?, ?, ?, 'pending')
        "#,
    )
    .bind(access_code)
    .bind(initiator_id)
    .bind(play_mode) // sqlx::Type 덕분에 'quiz' 같은 소문자 문자열로 저장
    .bind(is_deferred)
    .execute(&mut *tx)
    .await?;

    insert_questions(&mut tx, access_code, questions).await?;
    tx.commit().await?;

    // 생성 직후 다시 읽어 DB가 채운 기본값까지 포함된 객체를 반환
    get_session(pool, access_code)
        .await?
        .ok_or(AppError::Internal(
            "Failed to retrieve created session".to_string(),
        ))
}

/// 접속 코드로 세션 하나를 조회합니다. 없으면 `None`.
pub async fn get_session(
    pool: &SqlitePool,
    access_code: &str,
) -> Result<Option<GameSession>, AppError> {
    let session = sqlx::query_as::<_, GameSession>(
        r#"
        SELECT access_code, initiator_id, play_mode, is_deferred, status,
               created_at, updated_at
        FROM game_sessions
        WHERE access_code = ?
        "#,
    )
    .bind(access_code)
    .fetch_optional(pool) // 0행이면 None, 1행이면 Some
    .await?;

    Ok(session)
}

/// 교사가 만든 세션 목록 (최신순)
pub async fn list_sessions_for_initiator(
    pool: &SqlitePool,
    initiator_id: &str,
) -> Result<Vec<GameSession>, AppError> {
    let sessions = sqlx::query_as::<_, GameSession>(
        r#"
        SELECT access_code, initiator_id, play_mode, is_deferred, status,
               created_at, updated_at
        FROM game_sessions
        WHERE initiator_id = ?
        ORDER BY created_at DESC
        "#,
    )
    .bind(initiator_id)
    .fetch_all(pool)
    .await?;

    Ok(sessions)
}

/// 세션 상태를 바꿉니다.
///
/// ## 반환값
/// - `Ok(Some(GameSession))`: 변경 성공
/// - `Ok(None)`: 해당 코드의 세션이 없음 → 라우트에서 404 처리
pub async fn update_status(
    pool: &SqlitePool,
    access_code: &str,
    status: SessionStatus,
) -> Result<Option<GameSession>, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE game_sessions
        SET status = ?,
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
        WHERE access_code = ?
        "#,
    )
    .bind(status)
    .bind(access_code)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_session(pool, access_code).await
}

/// 세션을 삭제합니다. 문항과 결과는 `ON DELETE CASCADE`로 함께 지워집니다.
///
/// 삭제된 행이 있으면 `true`.
pub async fn delete_session(pool: &SqlitePool, access_code: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM game_sessions WHERE access_code = ?")
        .bind(access_code)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
