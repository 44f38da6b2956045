//! # 세션 문항 쿼리
//!
//! 세션을 만들 때 받은 문항 목록을 순서대로 저장하고, 세션 시작 시 다시 읽습니다.
//! 문항 유형마다 필드가 달라서 본문은 JSON 문자열 하나로 저장합니다.

use crate::error::AppError;
use crate::models::Question;
use sqlx::{Sqlite, SqlitePool, Transaction};

/// 문항 목록을 통째로 저장합니다. 세션 행과 같은 트랜잭션 안에서 호출합니다.
pub async fn insert_questions(
    tx: &mut Transaction<'_, Sqlite>,
    access_code: &str,
    questions: &[Question],
) -> Result<(), AppError> {
    for (position, question) in questions.iter().enumerate() {
        let body = serde_json::to_string(question)
            .map_err(|e| AppError::Internal(format!("Failed to encode question: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO session_questions (access_code, position, question_id, body)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(access_code)
        .bind(position as i64)
        .bind(&question.id)
        .bind(body)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// 저장된 순서대로 문항을 읽습니다.
pub async fn list_questions(
    pool: &SqlitePool,
    access_code: &str,
) -> Result<Vec<Question>, AppError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT body
        FROM session_questions
        WHERE access_code = ?
        ORDER BY position
        "#,
    )
    .bind(access_code)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|(body,)| {
            serde_json::from_str(&body)
                .map_err(|e| AppError::Internal(format!("Corrupt question row: {}", e)))
        })
        .collect()
}
