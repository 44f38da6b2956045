//! # 답안 수락 판정
//!
//! 제출된 답안을 받을지 말지를 **정식 타이머 레코드만 보고** 결정합니다.
//! 클라이언트 화면의 카운트다운이 아니라 서버가 가진 상태가 기준입니다.
//!
//! ## 판정 규칙
//! | 타이머 상태 | 결과 |
//! |---|---|
//! | 레코드 없음 | 경고 로그 후 수락, 만료된 문항처럼 채점 (빠르기 보너스 없음) |
//! | `stop` | `stopped` 거절 (만료로 멈춘 경우 `late`) |
//! | `pause` | 항상 수락 |
//! | `run` | 서버 경과 ≤ 제한+유예 **그리고** 클라이언트 경과 ≤ 제한이면 수락, 아니면 `late` |
//!
//! 경과 시간은 `question_start = end_date - duration` 기준이라 일시정지 구간이 빠집니다.

use std::sync::Arc;

use super::broadcast::Broadcaster;
use super::participants::ParticipantStore;
use super::scoring::ScoringConfig;
use super::sessions::LiveSession;
use super::timer_key;
use super::timers::TimerService;
use crate::error::AppError;
use crate::models::{
    AnswerRecord, PlayMode, RejectReason, SubmissionOutcome, SubmitAnswerRequest, TimerRecord,
    TimerStatus,
};

/// 판정 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accept {
        /// 채점에 쓰는 경과 시간
        elapsed_ms: i64,
        duration_ms: i64,
        /// 타이머 레코드 없이 받은 경우
        best_effort: bool,
    },
    Reject(RejectReason),
}

/// 타이머 레코드와 도착 시각만으로 판정합니다.
pub fn decide(
    record: Option<&TimerRecord>,
    server_receive_ms: i64,
    client_timestamp_ms: i64,
    grace_ms: i64,
    default_duration_ms: i64,
) -> Admission {
    // 타이머가 시작되기 전의 답안은 제한 시간을 다 쓴 것으로 봅니다.
    let Some(record) = record else {
        return Admission::Accept {
            elapsed_ms: default_duration_ms,
            duration_ms: default_duration_ms,
            best_effort: true,
        };
    };

    match record.status {
        TimerStatus::Stop if record.expired => Admission::Reject(RejectReason::Late),
        TimerStatus::Stop => Admission::Reject(RejectReason::Stopped),
        TimerStatus::Pause => Admission::Accept {
            elapsed_ms: record.elapsed_at(server_receive_ms),
            duration_ms: record.duration_ms,
            best_effort: false,
        },
        TimerStatus::Run => {
            let Some(question_start) = record.question_start_ms() else {
                return Admission::Reject(RejectReason::Stopped);
            };
            let server_elapsed = server_receive_ms - question_start;
            let client_elapsed = client_timestamp_ms - question_start;

            if server_elapsed <= record.duration_ms + grace_ms
                && client_elapsed <= record.duration_ms
            {
                Admission::Accept {
                    elapsed_ms: server_elapsed.clamp(0, record.duration_ms),
                    duration_ms: record.duration_ms,
                    best_effort: false,
                }
            } else {
                Admission::Reject(RejectReason::Late)
            }
        }
    }
}

pub struct AdmissionController {
    timers: Arc<TimerService>,
    participants: Arc<ParticipantStore>,
    events: Arc<Broadcaster>,
    scoring: ScoringConfig,
    grace_ms: i64,
    default_duration_ms: i64,
}

impl AdmissionController {
    pub fn new(
        timers: Arc<TimerService>,
        participants: Arc<ParticipantStore>,
        events: Arc<Broadcaster>,
        scoring: ScoringConfig,
        grace_ms: i64,
        default_duration_ms: i64,
    ) -> Self {
        Self {
            timers,
            participants,
            events,
            scoring,
            grace_ms,
            default_duration_ms,
        }
    }

    /// 답안 하나를 판정하고, 수락되면 저장과 채점까지 끝냅니다.
    ///
    /// 세션 보드 락을 잡은 채로 타이머 조회 → 판정 → 저장 → 점수 반영을 한 번에 합니다.
    pub async fn submit(
        &self,
        session: &LiveSession,
        user_id: &str,
        request: SubmitAnswerRequest,
    ) -> Result<SubmissionOutcome, AppError> {
        let question = session.question(&request.question_id)?;
        let board = self.participants.board(&session.code)?;
        let mut board = board.lock().await;

        let participant = board
            .participant(user_id)
            .cloned()
            .ok_or_else(|| AppError::Forbidden("join the session before answering".to_string()))?;

        if session.answers_locked {
            tracing::debug!(session = %session.code, user_id, "answer rejected, answers locked");
            return Ok(SubmissionOutcome::rejected(RejectReason::Locked));
        }

        let attempt_number = if session.is_deferred {
            let requested = request.attempt_number.unwrap_or(participant.attempt_number);
            if requested != participant.attempt_number || !participant.attempt_open {
                tracing::debug!(user_id, requested, "answer for a closed attempt");
                return Ok(SubmissionOutcome::rejected(RejectReason::Stopped));
            }
            requested
        } else {
            1
        };

        let server_receive_ms = self.timers.now_ms();
        let default_duration_ms = session.duration_for(question, self.default_duration_ms);

        let admission = if session.is_practice() {
            Admission::Accept {
                elapsed_ms: 0,
                duration_ms: default_duration_ms,
                best_effort: false,
            }
        } else {
            let key = timer_key::resolve(
                &session.code,
                &question.id,
                session.is_deferred,
                Some(user_id),
                Some(attempt_number),
            )?;
            let record = self.timers.record(&key).await;
            if record.is_none() {
                tracing::warn!(%key, user_id, "no timer record, accepting answer best-effort");
            }
            decide(
                record.as_ref(),
                server_receive_ms,
                request.client_timestamp_ms,
                self.grace_ms,
                default_duration_ms,
            )
        };

        let (elapsed_ms, duration_ms, best_effort) = match admission {
            Admission::Accept {
                elapsed_ms,
                duration_ms,
                best_effort,
            } => (elapsed_ms, duration_ms, best_effort),
            Admission::Reject(reason) => {
                tracing::debug!(
                    session = %session.code,
                    user_id,
                    question_id = %question.id,
                    ?reason,
                    "answer rejected"
                );
                return Ok(SubmissionOutcome::rejected(reason));
            }
        };

        if let Some(previous) = board.answer(user_id, &question.id, attempt_number) {
            if previous.value.same_as(&request.value) {
                tracing::debug!(user_id, question_id = %question.id, "identical resubmission, not rescored");
                return Ok(SubmissionOutcome::accepted(0.0, participant.score));
            }
        }

        let breakdown = self.scoring.score(
            question,
            &request.value,
            elapsed_ms,
            duration_ms,
            session.questions.len(),
            session.is_deferred,
        );
        let record = AnswerRecord {
            user_id: user_id.to_string(),
            question_id: question.id.clone(),
            attempt_number,
            value: request.value,
            client_timestamp_ms: request.client_timestamp_ms,
            server_receive_ms,
            accepted: true,
            best_effort,
            score_delta: 0.0,
            points: breakdown.total,
        };
        let (score_delta, total_score) = board.record_answer(record, session.is_deferred)?;
        tracing::debug!(
            session = %session.code,
            user_id,
            question_id = %question.id,
            elapsed_ms,
            points = breakdown.total,
            score_delta,
            "answer accepted"
        );

        let distribution = (session.play_mode == PlayMode::Quiz)
            .then(|| board.distribution(&question.id, question.option_count()));
        let leaderboard = board.leaderboard();
        drop(board);

        if let Some(distribution) = distribution {
            self.events
                .answer_stats(&session.code, &question.id, distribution);
        }
        self.events.live_leaderboard(&session.code, leaderboard);

        Ok(SubmissionOutcome::accepted(score_delta, total_score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DURATION: i64 = 20_000;
    const GRACE: i64 = 500;

    fn running_since(start_ms: i64) -> TimerRecord {
        TimerRecord {
            question_id: "q1".to_string(),
            status: TimerStatus::Run,
            duration_ms: DURATION,
            end_date_ms: Some(start_ms + DURATION),
            remaining_ms: None,
            expired: false,
        }
    }

    #[test]
    fn late_boundary_follows_grace_window() {
        let record = running_since(0);

        let just_inside = decide(Some(&record), DURATION + GRACE - 1, DURATION - 1, GRACE, DURATION);
        let on_boundary = decide(Some(&record), DURATION + GRACE, DURATION, GRACE, DURATION);
        let just_outside = decide(Some(&record), DURATION + GRACE + 1, DURATION - 1, GRACE, DURATION);

        assert!(matches!(just_inside, Admission::Accept { .. }));
        assert!(matches!(on_boundary, Admission::Accept { .. }));
        assert_eq!(just_outside, Admission::Reject(RejectReason::Late));
    }

    #[test]
    fn client_timestamp_past_duration_is_late() {
        let record = running_since(0);
        let admission = decide(Some(&record), DURATION, DURATION + 1, GRACE, DURATION);
        assert_eq!(admission, Admission::Reject(RejectReason::Late));
    }

    #[test]
    fn paused_timer_accepts_any_arrival_time() {
        let mut record = running_since(0);
        record.status = TimerStatus::Pause;
        record.end_date_ms = None;
        record.remaining_ms = Some(12_000);

        let admission = decide(Some(&record), 10_000_000, 10_000_000, GRACE, DURATION);

        assert_eq!(
            admission,
            Admission::Accept {
                elapsed_ms: 8_000,
                duration_ms: DURATION,
                best_effort: false
            }
        );
    }

    #[test]
    fn stopped_and_expired_reject_with_different_reasons() {
        let mut stopped = TimerRecord::stopped("q1", DURATION);
        assert_eq!(
            decide(Some(&stopped), 0, 0, GRACE, DURATION),
            Admission::Reject(RejectReason::Stopped)
        );

        stopped.expired = true;
        assert_eq!(
            decide(Some(&stopped), 0, 0, GRACE, DURATION),
            Admission::Reject(RejectReason::Late)
        );
    }

    #[test]
    fn missing_record_is_best_effort_and_scored_as_expired() {
        assert_eq!(
            decide(None, 5_000, 5_000, GRACE, DURATION),
            Admission::Accept {
                elapsed_ms: DURATION,
                duration_ms: DURATION,
                best_effort: true
            }
        );
    }
}
