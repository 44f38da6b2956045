//! # 데이터베이스 접근 계층 (Data Access Layer)
//!
//! 데이터베이스와 직접 상호작용하는 함수들을 모아둔 모듈입니다.
//! 라우트 핸들러(routes/)에서 이 모듈의 함수를 호출하여 DB 작업을 수행합니다.
//! 플레이 중의 타이머와 점수는 엔진 메모리에만 있고, 여기서는 다루지 않습니다.
//!
//! 각 하위 모듈:
//! - `sessions`: 게임 세션 행의 생성/조회/상태 변경/삭제
//! - `questions`: 세션에 고정된 문항 목록
//! - `results`: 세션 종료 시점의 최종 순위

pub mod questions;
pub mod results;
pub mod sessions;

// 하위 모듈의 모든 공개 함수를 재공개(re-export)하여
// `crate::db::get_session`처럼 바로 접근할 수 있게 합니다.
pub use questions::*;
pub use results::*;
pub use sessions::*;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LeaderboardEntry, PlayMode, Question, QuestionKind, SessionStatus};
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    /// 마이그레이션까지 적용된 메모리 DB. 연결이 하나여야 같은 DB를 봅니다.
    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn questions() -> Vec<Question> {
        vec![
            Question {
                id: "q1".to_string(),
                kind: QuestionKind::SingleChoice {
                    options: vec!["a".into(), "b".into()],
                    correct: 0,
                },
                points: 1.0,
                time_limit_ms: Some(15_000),
            },
            Question {
                id: "q2".to_string(),
                kind: QuestionKind::Numeric {
                    answer: 42.0,
                    tolerance: 0.5,
                },
                points: 2.0,
                time_limit_ms: None,
            },
        ]
    }

    #[tokio::test]
    async fn session_is_created_pending_with_ordered_questions() {
        let pool = test_pool().await;

        let session = create_session(&pool, "ABC123", "teacher", PlayMode::Quiz, false, &questions())
            .await
            .unwrap();

        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.play_mode, PlayMode::Quiz);
        assert!(!session.is_deferred);
        assert_eq!(list_questions(&pool, "ABC123").await.unwrap(), questions());
    }

    #[tokio::test]
    async fn duplicate_access_code_leaves_no_partial_rows() {
        let pool = test_pool().await;
        create_session(&pool, "ABC123", "teacher", PlayMode::Quiz, false, &questions())
            .await
            .unwrap();

        let again = create_session(&pool, "ABC123", "other", PlayMode::Tournament, true, &[]).await;

        assert!(matches!(again, Err(crate::error::AppError::Database(_))));
        let kept = get_session(&pool, "ABC123").await.unwrap().unwrap();
        assert_eq!(kept.initiator_id, "teacher");
    }

    #[tokio::test]
    async fn status_update_reports_missing_session() {
        let pool = test_pool().await;
        create_session(&pool, "ABC123", "teacher", PlayMode::Tournament, true, &[])
            .await
            .unwrap();

        let active = update_status(&pool, "ABC123", SessionStatus::Active).await.unwrap();
        assert_eq!(active.unwrap().status, SessionStatus::Active);

        let missing = update_status(&pool, "NOPE", SessionStatus::Active).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn results_are_saved_in_rank_order_and_removed_with_session() {
        let pool = test_pool().await;
        create_session(&pool, "ABC123", "teacher", PlayMode::Quiz, false, &questions())
            .await
            .unwrap();

        let entries = vec![
            LeaderboardEntry {
                user_id: "bob".into(),
                username: "Bob".into(),
                score: 1200.0,
                rank: 1,
            },
            LeaderboardEntry {
                user_id: "alice".into(),
                username: "Alice".into(),
                score: 800.0,
                rank: 2,
            },
        ];
        save_results(&pool, "ABC123", &entries).await.unwrap();

        let saved = list_results(&pool, "ABC123").await.unwrap();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[0].user_id, "bob");
        assert_eq!(saved[1].rank, 2);

        assert!(delete_session(&pool, "ABC123").await.unwrap());
        assert!(list_results(&pool, "ABC123").await.unwrap().is_empty());
        assert!(list_questions(&pool, "ABC123").await.unwrap().is_empty());
    }
}
