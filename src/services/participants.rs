//! # 참가자 & 순위표 저장소
//!
//! 세션마다 `SessionBoard` 하나를 두고 `tokio::sync::Mutex`로 감쌉니다.
//! 답안 제출은 이 락 안에서 한 번에 처리되므로 같은 참가자의 점수 갱신이 겹치지 않습니다.
//!
//! ## 점수 규칙
//! - 점수는 수락된 답안으로만 오릅니다. 플레이 중에 덮어쓰거나 깎지 않습니다.
//! - 입장 순서 보너스는 처음 입장할 때 딱 한 번 더합니다.
//! - deferred 세션은 시도별 점수를 따로 보관하고, 참가자 점수는 `가장 좋은 시도 + 입장 보너스`입니다.
//!
//! ## 순위
//! 점수 내림차순 → 입장 보너스 내림차순(먼저 들어온 사람) → 사용자 ID 오름차순.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use super::scoring::ScoringConfig;
use crate::error::AppError;
use crate::models::{AnswerRecord, LeaderboardEntry, LeaderboardSnapshot, Participant};

/// `(사용자, 문항, 시도 번호)`
type AnswerKey = (String, String, u32);

#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub participant: Participant,
    /// 이 세션에 처음 들어온 경우
    pub first_join: bool,
    /// deferred 세션에서 새로 열린 시도 번호
    pub opened_attempt: Option<u32>,
}

#[derive(Debug, Default)]
pub struct SessionBoard {
    participants: HashMap<String, Participant>,
    answers: HashMap<AnswerKey, AnswerRecord>,
    /// deferred 전용: `(사용자, 시도 번호)` → 시도 점수
    attempt_scores: HashMap<(String, u32), f64>,
    snapshot: Option<LeaderboardSnapshot>,
    next_rank: u32,
}

impl SessionBoard {
    /// 입장 또는 재입장. 재입장은 기존 레코드를 그대로 씁니다.
    pub fn join(
        &mut self,
        user_id: &str,
        username: &str,
        deferred: bool,
        scoring: &ScoringConfig,
    ) -> JoinOutcome {
        if let Some(participant) = self.participants.get_mut(user_id) {
            participant.online = true;
            participant.username = username.to_string();

            let mut opened_attempt = None;
            if deferred && !participant.attempt_open {
                participant.attempt_number += 1;
                participant.attempt_open = true;
                opened_attempt = Some(participant.attempt_number);
                self.attempt_scores
                    .insert((user_id.to_string(), participant.attempt_number), 0.0);
            }

            return JoinOutcome {
                participant: participant.clone(),
                first_join: false,
                opened_attempt,
            };
        }

        let rank = self.next_rank;
        self.next_rank += 1;
        let bonus = scoring.join_order_bonus(rank);
        let participant = Participant {
            user_id: user_id.to_string(),
            username: username.to_string(),
            score: bonus,
            online: true,
            join_order_rank: rank,
            join_order_bonus: bonus,
            attempt_number: 1,
            attempt_open: true,
        };
        if deferred {
            self.attempt_scores.insert((user_id.to_string(), 1), 0.0);
        }
        self.participants
            .insert(user_id.to_string(), participant.clone());

        JoinOutcome {
            participant,
            first_join: true,
            opened_attempt: deferred.then_some(1),
        }
    }

    /// 연결만 끊긴 것으로 표시합니다. 점수와 순위는 그대로 남습니다.
    pub fn disconnect(&mut self, user_id: &str) -> Result<(), AppError> {
        let participant = self
            .participants
            .get_mut(user_id)
            .ok_or(AppError::NotFound)?;
        participant.online = false;
        Ok(())
    }

    /// deferred 시도를 닫습니다. 다음 입장 때 새 시도가 열립니다.
    pub fn finish_attempt(&mut self, user_id: &str) -> Result<Participant, AppError> {
        let participant = self
            .participants
            .get_mut(user_id)
            .ok_or(AppError::NotFound)?;
        if !participant.attempt_open {
            return Err(AppError::Conflict(format!(
                "attempt {} is already finished",
                participant.attempt_number
            )));
        }
        participant.attempt_open = false;
        Ok(participant.clone())
    }

    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.get(user_id)
    }

    pub fn answer(&self, user_id: &str, question_id: &str, attempt_number: u32) -> Option<&AnswerRecord> {
        self.answers.get(&(
            user_id.to_string(),
            question_id.to_string(),
            attempt_number,
        ))
    }

    /// 수락된 답안을 저장하고 점수에 반영합니다.
    ///
    /// `record.points`에는 이번 제출의 점수를 넣어 호출합니다. 같은 문항에 이미 점수가 있으면
    /// 더 높아진 만큼만 더하므로 답을 바꿔도 총점은 줄지 않습니다.
    /// 돌려주는 값: `(이번에 더해진 점수, 참가자 총점)`
    pub fn record_answer(
        &mut self,
        mut record: AnswerRecord,
        deferred: bool,
    ) -> Result<(f64, f64), AppError> {
        let key = (
            record.user_id.clone(),
            record.question_id.clone(),
            record.attempt_number,
        );
        let previous_best = self.answers.get(&key).map(|prev| prev.points).unwrap_or(0.0);
        let delta = (record.points - previous_best).max(0.0);
        record.points = record.points.max(previous_best);
        record.score_delta = delta;

        let user_id = record.user_id.clone();
        let attempt_number = record.attempt_number;
        if !self.participants.contains_key(&user_id) {
            return Err(AppError::NotFound);
        }
        self.answers.insert(key, record);

        let total = self.credit(&user_id, attempt_number, delta, deferred);
        Ok((delta, total))
    }

    fn credit(&mut self, user_id: &str, attempt_number: u32, delta: f64, deferred: bool) -> f64 {
        if deferred {
            *self
                .attempt_scores
                .entry((user_id.to_string(), attempt_number))
                .or_insert(0.0) += delta;
        }
        let best_attempt = self.best_attempt_score(user_id);

        let Some(participant) = self.participants.get_mut(user_id) else {
            return 0.0;
        };
        if deferred {
            participant.score = participant.join_order_bonus + best_attempt;
        } else {
            participant.score += delta;
        }
        participant.score
    }

    fn best_attempt_score(&self, user_id: &str) -> f64 {
        self.attempt_scores
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .map(|(_, score)| *score)
            .fold(0.0, f64::max)
    }

    /// deferred 시도 하나의 점수 (다른 시도와 섞이지 않음)
    pub fn attempt_score(&self, user_id: &str, attempt_number: u32) -> Option<f64> {
        self.attempt_scores
            .get(&(user_id.to_string(), attempt_number))
            .copied()
    }

    /// 실시간 순위 — 교사 대시보드와 REST 조회용
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut ordered: Vec<&Participant> = self.participants.values().collect();
        ordered.sort_by(|a, b| compare_standing(a, b));

        ordered
            .into_iter()
            .enumerate()
            .map(|(index, participant)| LeaderboardEntry {
                user_id: participant.user_id.clone(),
                username: participant.username.clone(),
                score: participant.score,
                rank: index as u32 + 1,
            })
            .collect()
    }

    /// 지금의 순위를 스냅샷으로 얼려 이전 것을 통째로 바꿉니다.
    pub fn refresh_snapshot(&mut self, now_ms: i64) -> LeaderboardSnapshot {
        let snapshot = LeaderboardSnapshot {
            entries: self.leaderboard(),
            taken_at_ms: now_ms,
        };
        self.snapshot = Some(snapshot.clone());
        snapshot
    }

    /// 마지막 스냅샷. 아직 없으면 빈 순위표.
    pub fn snapshot(&self) -> LeaderboardSnapshot {
        self.snapshot.clone().unwrap_or(LeaderboardSnapshot {
            entries: Vec::new(),
            taken_at_ms: 0,
        })
    }

    /// 문항의 보기별 선택 인원
    pub fn distribution(&self, question_id: &str, option_count: usize) -> Vec<u32> {
        let mut counts = vec![0u32; option_count];
        for ((_, question, _), record) in &self.answers {
            if question != question_id || !record.accepted {
                continue;
            }
            for pick in record.value.selected() {
                if let Some(count) = counts.get_mut(pick) {
                    *count += 1;
                }
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }
}

fn compare_standing(a: &Participant, b: &Participant) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.join_order_bonus.total_cmp(&a.join_order_bonus))
        .then_with(|| a.user_id.cmp(&b.user_id))
}

#[derive(Debug, Default)]
pub struct ParticipantStore {
    boards: DashMap<String, Arc<Mutex<SessionBoard>>>,
}

impl ParticipantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, session_code: &str) {
        self.boards
            .entry(session_code.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SessionBoard::default())));
    }

    pub fn board(&self, session_code: &str) -> Result<Arc<Mutex<SessionBoard>>, AppError> {
        self.boards
            .get(session_code)
            .map(|entry| entry.value().clone())
            .ok_or(AppError::NotFound)
    }

    pub fn remove(&self, session_code: &str) -> bool {
        self.boards.remove(session_code).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnswerValue;

    fn answer(user_id: &str, question_id: &str, attempt_number: u32, points: f64) -> AnswerRecord {
        AnswerRecord {
            user_id: user_id.to_string(),
            question_id: question_id.to_string(),
            attempt_number,
            value: AnswerValue::Choice(0),
            client_timestamp_ms: 0,
            server_receive_ms: 0,
            accepted: true,
            best_effort: false,
            score_delta: 0.0,
            points,
        }
    }

    #[test]
    fn disconnect_keeps_score_and_rank() {
        let scoring = ScoringConfig::default();
        let mut board = SessionBoard::default();
        board.join("alice", "Alice", false, &scoring);
        board.join("bob", "Bob", false, &scoring);
        board.record_answer(answer("bob", "q1", 1, 900.0), false).unwrap();

        let before = board.leaderboard();
        board.disconnect("bob").unwrap();
        let after = board.leaderboard();

        assert_eq!(before, after);
        assert!(!board.participant("bob").unwrap().online);

        let rejoined = board.join("bob", "Bob", false, &scoring);
        assert!(!rejoined.first_join);
        assert_eq!(rejoined.participant.score, before[0].score);
        assert_eq!(board.len(), 2);
    }

    #[test]
    fn join_bonus_breaks_ties_for_earlier_player() {
        let scoring = ScoringConfig::default();
        let mut board = SessionBoard::default();
        board.join("zed", "Zed", false, &scoring);
        board.join("amy", "Amy", false, &scoring);
        board.record_answer(answer("zed", "q1", 1, 500.0), false).unwrap();
        board.record_answer(answer("amy", "q1", 1, 500.0), false).unwrap();

        let ranks: Vec<_> = board.leaderboard().into_iter().map(|e| (e.user_id, e.rank)).collect();
        assert_eq!(ranks, vec![("zed".to_string(), 1), ("amy".to_string(), 2)]);
    }

    #[test]
    fn join_bonus_never_beats_a_real_point() {
        let scoring = ScoringConfig::default();
        let mut board = SessionBoard::default();
        board.join("first", "First", false, &scoring);
        board.join("second", "Second", false, &scoring);
        board.record_answer(answer("second", "q1", 1, 1.0), false).unwrap();

        assert_eq!(board.leaderboard()[0].user_id, "second");
    }

    #[test]
    fn changed_answer_only_adds_improvement() {
        let scoring = ScoringConfig::default();
        let mut board = SessionBoard::default();
        board.join("alice", "Alice", false, &scoring);

        let (first_delta, _) = board.record_answer(answer("alice", "q1", 1, 0.0), false).unwrap();
        let (second_delta, total) = board.record_answer(answer("alice", "q1", 1, 800.0), false).unwrap();
        let (third_delta, total_after) = board.record_answer(answer("alice", "q1", 1, 300.0), false).unwrap();

        assert_eq!((first_delta, second_delta, third_delta), (0.0, 800.0, 0.0));
        assert_eq!(total, total_after);
        assert_eq!(board.answer("alice", "q1", 1).unwrap().points, 800.0);
    }

    #[test]
    fn snapshot_does_not_move_until_refreshed() {
        let scoring = ScoringConfig::default();
        let mut board = SessionBoard::default();
        board.join("alice", "Alice", false, &scoring);
        board.join("bob", "Bob", false, &scoring);
        let frozen = board.refresh_snapshot(1_000);

        board.record_answer(answer("bob", "q1", 1, 1000.0), false).unwrap();

        assert_eq!(board.snapshot(), frozen);
        assert_eq!(board.leaderboard()[0].user_id, "bob");
        assert_eq!(board.snapshot().entries[0].user_id, "alice");

        let refreshed = board.refresh_snapshot(2_000);
        assert_eq!(refreshed.entries[0].user_id, "bob");
    }

    #[test]
    fn deferred_attempts_keep_separate_scores() {
        let scoring = ScoringConfig::default();
        let mut board = SessionBoard::default();

        let first = board.join("alice", "Alice", true, &scoring);
        assert_eq!(first.opened_attempt, Some(1));
        board.record_answer(answer("alice", "q1", 1, 700.0), true).unwrap();

        // 열린 시도 중 재입장은 같은 시도로 다시 연결
        assert_eq!(board.join("alice", "Alice", true, &scoring).opened_attempt, None);

        board.finish_attempt("alice").unwrap();
        let second = board.join("alice", "Alice", true, &scoring);
        assert_eq!(second.opened_attempt, Some(2));
        assert_eq!(board.attempt_score("alice", 2), Some(0.0));

        board.record_answer(answer("alice", "q1", 2, 400.0), true).unwrap();
        assert_eq!(board.attempt_score("alice", 1), Some(700.0));
        assert_eq!(board.attempt_score("alice", 2), Some(400.0));

        let participant = board.participant("alice").unwrap();
        assert_eq!(participant.score, 700.0 + participant.join_order_bonus);
        assert_eq!(board.answer("alice", "q1", 2).unwrap().score_delta, 400.0);
    }

    #[test]
    fn distribution_counts_each_selected_option() {
        let scoring = ScoringConfig::default();
        let mut board = SessionBoard::default();
        board.join("alice", "Alice", false, &scoring);
        board.join("bob", "Bob", false, &scoring);

        let mut multi = answer("alice", "q1", 1, 0.0);
        multi.value = AnswerValue::Choices(vec![0, 2]);
        board.record_answer(multi, false).unwrap();
        board.record_answer(answer("bob", "q1", 1, 0.0), false).unwrap();

        assert_eq!(board.distribution("q1", 3), vec![2, 0, 1]);
        assert_eq!(board.distribution("q2", 3), vec![0, 0, 0]);
    }

    #[tokio::test]
    async fn store_reports_missing_session() {
        let store = ParticipantStore::new();
        assert!(matches!(store.board("NOPE"), Err(AppError::NotFound)));

        store.open("ABC");
        store.board("ABC").unwrap().lock().await.join("a", "A", false, &ScoringConfig::default());
        assert!(store.remove("ABC"));
    }
}
