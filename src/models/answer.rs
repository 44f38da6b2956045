//! # 답안 모델
//!
//! 학생 답안 제출 요청, 저장되는 답안 레코드, 그리고 제출자에게 돌려주는
//! 수락/거절 결과를 정의합니다. 거절은 서버 오류가 아니라 정상적인 결과이므로
//! `AppError`가 아닌 `SubmissionOutcome`으로 표현합니다.

use serde::{Deserialize, Serialize};

use super::AnswerValue;

/// 답안 제출 요청 — `POST /api/v1/sessions/{code}/answers`
///
/// 사용자 ID는 본문이 아니라 인증 토큰에서 가져옵니다.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: String,
    /// deferred 세션에서만 의미가 있습니다. 생략하면 현재 시도 번호를 씁니다.
    pub attempt_number: Option<u32>,
    pub value: AnswerValue,
    /// 클라이언트가 답을 누른 시각 (epoch ms)
    pub client_timestamp_ms: i64,
}

/// 거절 사유
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectReason {
    /// 제한 시간(+유예 시간)을 넘김
    Late,
    /// 교사가 타이머를 멈춘 문항
    Stopped,
    /// 교사가 답안을 잠금
    Locked,
}

/// 답안 레코드 — `(세션, 사용자, 문항, 시도 번호)`마다 최대 하나
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub user_id: String,
    pub question_id: String,
    pub attempt_number: u32,
    pub value: AnswerValue,
    pub client_timestamp_ms: i64,
    pub server_receive_ms: i64,
    pub accepted: bool,
    /// 타이머 레코드 없이 받아들인 답안
    pub best_effort: bool,
    /// 이 제출로 참가자 점수에 더해진 값
    pub score_delta: f64,
    /// 이 문항에서 지금까지 인정된 최고 점수
    pub points: f64,
}

/// 제출자에게 돌려주는 결과. 모든 제출은 수락 또는 거절 응답을 받습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_delta: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_score: Option<f64>,
}

impl SubmissionOutcome {
    pub fn rejected(reason: RejectReason) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
            score_delta: None,
            total_score: None,
        }
    }

    pub fn accepted(score_delta: f64, total_score: f64) -> Self {
        Self {
            accepted: true,
            reason: None,
            score_delta: Some(score_delta),
            total_score: Some(total_score),
        }
    }
}
