//! # 헬스체크(Health Check) 핸들러
//!
//! 서버가 정상적으로 동작하는지 확인하는 엔드포인트입니다.
//!
//! ## 엔드포인트
//! - `GET /api/v1/health` → `{ "status": "ok", "database": "ok" }`
//!
//! 로드밸런서나 컨테이너 오케스트레이터의 상태 확인에 씁니다.

use axum::{extract::State, Json}; // JSON 응답 래퍼
use serde_json::{json, Value};    // JSON 생성 유틸리티

use crate::routes::AppState;

/// `GET /health` — 서버와 DB 연결 상태를 확인합니다.
///
/// DB에 `SELECT 1`을 보내 봅니다. 실패해도 에러 응답 대신 `"database": "unavailable"`을
/// 돌려주므로, 이 핸들러 자체는 실패하지 않습니다.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let database = match sqlx::query("SELECT 1").execute(&state.pool).await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!("Health check database probe failed: {}", e);
            "unavailable"
        }
    };

    // 결과: {"status": "ok", "database": "ok"}
    Json(json!({
        "status": "ok",
        "database": database
    }))
}
