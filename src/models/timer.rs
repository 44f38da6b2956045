//! # 타이머 모델
//!
//! 문항별 **정식 타이머(canonical timer)** 레코드와, 이를 세 청중(대시보드,
//! 프로젝션, 플레이어)에게 보내는 스냅샷 형태를 정의합니다.
//!
//! 상태별로 의미 있는 필드가 하나뿐입니다:
//! - `run`   → `end_date_ms` (절대 종료 시각)
//! - `pause` → `remaining_ms` (멈춘 시점의 남은 시간)
//! - `stop`  → `remaining_ms` = `duration_ms` (다음 시작은 처음부터)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Run,
    Pause,
    Stop,
}

/// 교사(또는 deferred 모드의 학생)가 보내는 타이머 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerAction {
    /// 시작 또는 일시정지에서 재개
    #[serde(alias = "resume", alias = "start")]
    Run,
    Pause,
    Stop,
    /// 제한 시간 변경 (`duration_ms` 필수)
    Edit,
}

/// 타이머 제어 요청 — `POST /api/v1/sessions/{code}/questions/{question_id}/timer`
#[derive(Debug, Deserialize)]
pub struct ControlTimerRequest {
    pub action: TimerAction,
    /// `run`: 새로 시작할 때의 전체 시간(선택), `edit`: 새 제한 시간(필수)
    pub duration_ms: Option<i64>,
}

/// 저장소에 보관되는 정식 타이머 레코드
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerRecord {
    pub question_id: String,
    pub status: TimerStatus,
    pub duration_ms: i64,
    pub end_date_ms: Option<i64>,
    pub remaining_ms: Option<i64>,
    /// 만료 콜백이 멈춘 타이머인지 여부. 교사가 멈춘 것과 구분하기 위해 둡니다.
    pub expired: bool,
}

impl TimerRecord {
    /// 처음 보는 키의 기본 상태: 멈춤, 남은 시간 = 전체 시간
    pub fn stopped(question_id: &str, duration_ms: i64) -> Self {
        Self {
            question_id: question_id.to_string(),
            status: TimerStatus::Stop,
            duration_ms,
            end_date_ms: None,
            remaining_ms: Some(duration_ms),
            expired: false,
        }
    }

    /// `now` 시점의 남은 시간 (0 미만으로 내려가지 않음)
    pub fn remaining_at(&self, now_ms: i64) -> i64 {
        match self.status {
            TimerStatus::Run => self
                .end_date_ms
                .map(|end| (end - now_ms).max(0))
                .unwrap_or(0),
            TimerStatus::Pause | TimerStatus::Stop => {
                self.remaining_ms.unwrap_or(self.duration_ms).max(0)
            }
        }
    }

    /// 문항이 열린 뒤 실제로 흐른 시간 (일시정지 구간은 제외)
    pub fn elapsed_at(&self, now_ms: i64) -> i64 {
        match self.status {
            TimerStatus::Run => self
                .question_start_ms()
                .map(|start| (now_ms - start).max(0))
                .unwrap_or(0),
            TimerStatus::Pause => (self.duration_ms - self.remaining_at(now_ms)).max(0),
            TimerStatus::Stop => 0,
        }
    }

    /// 일시정지 구간을 보정한 "실질적인 문항 시작 시각". `run` 상태에서만 의미가 있습니다.
    pub fn question_start_ms(&self) -> Option<i64> {
        match self.status {
            TimerStatus::Run => self.end_date_ms.map(|end| end - self.duration_ms),
            _ => None,
        }
    }

    pub fn snapshot(&self, now_ms: i64) -> TimerSnapshot {
        TimerSnapshot {
            question_id: self.question_id.clone(),
            status: self.status,
            duration_ms: self.duration_ms,
            end_date_ms: match self.status {
                TimerStatus::Run => self.end_date_ms,
                _ => None,
            },
            remaining_ms: match self.status {
                TimerStatus::Run => None,
                _ => Some(self.remaining_at(now_ms)),
            },
            server_time_ms: now_ms,
        }
    }
}

/// 클라이언트에 보내는 타이머 상태. 세 청중 모두 같은 값을 받습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub question_id: String,
    pub status: TimerStatus,
    pub duration_ms: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<i64>,
    /// 클라이언트가 자기 시계와의 차이를 보정할 때 쓰는 서버 시각
    pub server_time_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(end_date_ms: i64, duration_ms: i64) -> TimerRecord {
        TimerRecord {
            question_id: "q1".to_string(),
            status: TimerStatus::Run,
            duration_ms,
            end_date_ms: Some(end_date_ms),
            remaining_ms: None,
            expired: false,
        }
    }

    #[test]
    fn running_timer_reports_elapsed_from_effective_start() {
        let record = running(25_000, 20_000);

        assert_eq!(record.question_start_ms(), Some(5_000));
        assert_eq!(record.elapsed_at(8_000), 3_000);
        assert_eq!(record.remaining_at(8_000), 17_000);
        assert_eq!(record.remaining_at(30_000), 0);
    }

    #[test]
    fn snapshot_carries_only_the_field_that_matches_status() {
        let run = running(25_000, 20_000).snapshot(8_000);
        assert_eq!(run.end_date_ms, Some(25_000));
        assert_eq!(run.remaining_ms, None);

        let stop = TimerRecord::stopped("q1", 20_000).snapshot(8_000);
        assert_eq!(stop.end_date_ms, None);
        assert_eq!(stop.remaining_ms, Some(20_000));

        let json = serde_json::to_value(&stop).unwrap();
        assert_eq!(json["status"], "stop");
        assert!(json.get("end_date_ms").is_none());
    }

    #[test]
    fn resume_alias_maps_to_run() {
        let req: ControlTimerRequest =
            serde_json::from_str(r#"{"action":"resume"}"#).unwrap();
        assert_eq!(req.action, TimerAction::Run);
    }
}
