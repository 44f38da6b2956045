//! # 문항 모델
//!
//! 엔진이 채점에 필요한 만큼만 문항을 표현합니다.
//! 문항 본문(텍스트, 이미지 등)은 외부 문항 은행의 몫이고, 여기서는
//! 보기 개수, 정답, 배점 가중치, 제한 시간만 다룹니다.

use serde::{Deserialize, Serialize};

/// 문항 유형과 정답 정보
///
/// `#[serde(tag = "kind")]`: JSON에 `"kind": "single_choice"` 같은 필드로 유형을 구분합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionKind {
    /// 보기 중 하나만 고르는 문항
    SingleChoice { options: Vec<String>, correct: usize },
    /// 정답이 여러 개인 문항 (부분 점수 있음)
    MultipleChoice {
        options: Vec<String>,
        correct: Vec<usize>,
    },
    /// 숫자를 입력하는 문항 — `|입력 - answer| <= tolerance`면 정답
    Numeric {
        answer: f64,
        #[serde(default)]
        tolerance: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
    /// 배점 가중치 (기본 1.0)
    #[serde(default = "default_points")]
    pub points: f64,
    /// 문항별 제한 시간. 없으면 서버 기본값을 사용합니다.
    #[serde(default)]
    pub time_limit_ms: Option<i64>,
}

fn default_points() -> f64 {
    1.0
}

impl Question {
    /// 답안 분포 통계를 낼 보기 개수. 숫자 입력 문항은 0입니다.
    pub fn option_count(&self) -> usize {
        match &self.kind {
            QuestionKind::SingleChoice { options, .. }
            | QuestionKind::MultipleChoice { options, .. } => options.len(),
            QuestionKind::Numeric { .. } => 0,
        }
    }
}

/// 학생이 제출한 답안 값
///
/// `#[serde(untagged)]`: 태그 없이 JSON 모양으로 구분합니다.
/// `2` → `Choice(2)`, `[0, 2]` → `Choices`, `2.5` → `Number(2.5)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Choice(usize),
    Choices(Vec<usize>),
    Number(f64),
}

impl AnswerValue {
    /// 선택한 보기 인덱스 목록 (중복 제거, 정렬됨)
    pub fn selected(&self) -> Vec<usize> {
        let mut picks = match self {
            AnswerValue::Choice(index) => vec![*index],
            AnswerValue::Choices(indices) => indices.clone(),
            AnswerValue::Number(_) => Vec::new(),
        };
        picks.sort_unstable();
        picks.dedup();
        picks
    }

    /// 숫자 입력 문항용 값. 정수로 보낸 답(`3`)도 숫자로 취급합니다.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AnswerValue::Number(value) => Some(*value),
            AnswerValue::Choice(value) => Some(*value as f64),
            AnswerValue::Choices(_) => None,
        }
    }

    /// 같은 답을 다시 냈는지 비교 (복수 선택은 순서 무시)
    pub fn same_as(&self, other: &AnswerValue) -> bool {
        match (self, other) {
            (AnswerValue::Choices(_), _) | (_, AnswerValue::Choices(_)) => {
                self.selected() == other.selected()
            }
            _ => self.as_number() == other.as_number(),
        }
    }
}
