//! # 최종 순위 쿼리
//!
//! 세션이 끝날 때 엔진의 마지막 순위를 기록합니다. 같은 세션을 다시 기록하면 덮어씁니다.

use crate::error::AppError;
use crate::models::{LeaderboardEntry, SessionResult};
use sqlx::SqlitePool;

pub async fn save_results(
    pool: &SqlitePool,
    access_code: &str,
    entries: &[LeaderboardEntry],
) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM session_results WHERE access_code = ?")
        .bind(access_code)
        .execute(&mut *tx)
        .await?;

    for entry in entries {
        sqlx::query(
            r#"
            INSERT INTO session_results (access_code, user_id, username, score, rank)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(access_code)
        .bind(&entry.user_id)
        .bind(&entry.username)
        .bind(entry.score)
        .bind(entry.rank as i64)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn list_results(
    pool: &SqlitePool,
    access_code: &str,
) -> Result<Vec<SessionResult>, AppError> {
    let results = sqlx::query_as::<_, SessionResult>(
        r#"
        SELECT access_code, user_id, username, score, rank, recorded_at
        FROM session_results
        WHERE access_code = ?
        ORDER BY rank
        "#,
    )
    .bind(access_code)
    .fetch_all(pool)
    .await?;

    Ok(results)
}
