//! # 채점 엔진
//!
//! 수락된 답안 하나의 점수를 계산합니다. 순수 함수라 저장소나 시계에 의존하지 않습니다.
//!
//! ```text
//! base     = base_points × question.points × correctness
//! bonus    = max_rapidity_bonus × (1 - elapsed/duration) / total_questions   (정답일 때만)
//! penalty  = max_time_penalty × min(1, elapsed/duration) × correctness        (deferred만)
//! total    = max(0, base + bonus - penalty), 0.01점 단위로 반올림
//! ```
//! 빨리 낼수록 점수가 높고, 같은 답이라면 늦게 낸 쪽이 더 높아지는 일은 없습니다.

use serde::Serialize;

use crate::models::{AnswerValue, Question, QuestionKind};

/// 점수의 최소 단위. 입장 보너스 단위는 이보다 클 수 없어서 실제 점수 차이를 뒤집지 못합니다.
pub const SCORE_STEP: f64 = 0.01;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub base_points: f64,
    pub max_rapidity_bonus: f64,
    /// deferred 시도에서 시간이 다 됐을 때 깎이는 최대 점수. `base_points`보다 작아야 합니다.
    pub max_time_penalty: f64,
    /// 입장 순서 보너스 단위 (첫 번째 0.01, 두 번째 0.005, ...)
    pub join_bonus_unit: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            base_points: 1000.0,
            max_rapidity_bonus: 500.0,
            max_time_penalty: 500.0,
            join_bonus_unit: 0.01,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub base_score: f64,
    pub rapidity_bonus: f64,
    pub time_penalty: f64,
    pub total: f64,
}

impl ScoreBreakdown {
    pub fn zero() -> Self {
        Self {
            base_score: 0.0,
            rapidity_bonus: 0.0,
            time_penalty: 0.0,
            total: 0.0,
        }
    }
}

impl ScoringConfig {
    /// 음수 설정을 0으로, 벌점 상한을 기본 점수 아래로, 입장 보너스 단위를 `SCORE_STEP` 이하로 맞춥니다.
    pub fn sanitized(self) -> Self {
        let base_points = self.base_points.max(0.0);
        let max_time_penalty = if self.max_time_penalty >= base_points {
            (base_points - 1.0).max(0.0)
        } else {
            self.max_time_penalty.max(0.0)
        };
        Self {
            base_points,
            max_rapidity_bonus: self.max_rapidity_bonus.max(0.0),
            max_time_penalty,
            join_bonus_unit: self.join_bonus_unit.clamp(0.0, SCORE_STEP),
        }
    }

    pub fn score(
        &self,
        question: &Question,
        value: &AnswerValue,
        elapsed_ms: i64,
        duration_ms: i64,
        total_questions: usize,
        deferred: bool,
    ) -> ScoreBreakdown {
        let correctness = correctness(question, value);
        if correctness <= 0.0 {
            return ScoreBreakdown::zero();
        }

        let progress = if duration_ms > 0 {
            (elapsed_ms.max(0) as f64 / duration_ms as f64).min(1.0)
        } else {
            0.0
        };

        let base_score = self.base_points * question.points * correctness;
        let rapidity_bonus =
            self.max_rapidity_bonus * (1.0 - progress) / total_questions.max(1) as f64;
        let time_penalty = if deferred {
            self.max_time_penalty * progress * correctness
        } else {
            0.0
        };
        let total = round_to_step((base_score + rapidity_bonus - time_penalty).max(0.0));

        ScoreBreakdown {
            base_score,
            rapidity_bonus,
            time_penalty,
            total,
        }
    }

    /// 0부터 시작하는 입장 순서 `rank`의 보너스. 처음 입장할 때 한 번만 더합니다.
    pub fn join_order_bonus(&self, rank: u32) -> f64 {
        self.join_bonus_unit / (rank as f64 + 1.0)
    }
}

fn round_to_step(points: f64) -> f64 {
    (points / SCORE_STEP).round() / (1.0 / SCORE_STEP).round()
}

/// 정답 정도 (0.0 ~ 1.0)
pub fn correctness(question: &Question, value: &AnswerValue) -> f64 {
    match &question.kind {
        QuestionKind::SingleChoice { correct, .. } => {
            if value.selected() == [*correct] {
                1.0
            } else {
                0.0
            }
        }
        QuestionKind::MultipleChoice { correct, .. } => {
            if correct.is_empty() {
                return 0.0;
            }
            let picks = value.selected();
            let right = picks.iter().filter(|pick| correct.contains(pick)).count() as f64;
            let wrong = picks.len() as f64 - right;
            ((right - wrong) / correct.len() as f64).clamp(0.0, 1.0)
        }
        QuestionKind::Numeric { answer, tolerance } => match value.as_number() {
            Some(given) if (given - answer).abs() <= tolerance.abs() => 1.0,
            _ => 0.0,
        },
    }
}
