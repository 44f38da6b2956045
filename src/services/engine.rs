//! # 게임 엔진
//!
//! 타이머, 답안 판정, 채점, 참가자, 브로드캐스트를 하나로 묶는 진입점입니다.
//! HTTP 핸들러는 이 타입의 메서드만 부르고, 내부 저장소에는 직접 손대지 않습니다.
//!
//! ```text
//! routes ──▶ GameEngine ──┬─▶ TimerService ──▶ TimerStore
//!                         ├─▶ AdmissionController ──▶ ParticipantStore
//!                         └─▶ Broadcaster ──▶ WebSocket 방
//! ```
//!
//! 모든 상태는 이 구조체가 소유하고 `Arc`로 나눠 줍니다. 전역 변수는 없습니다.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::admission::AdmissionController;
use super::broadcast::Broadcaster;
use super::clock::Clock;
use super::participants::ParticipantStore;
use super::sessions::{LiveSession, SessionRegistry};
use super::timer_key::{self, TimerKey};
use super::timer_store::TimerStore;
use super::timers::TimerService;
use crate::config::EngineConfig;
use crate::error::AppError;
use crate::models::{
    LeaderboardEntry, LeaderboardSnapshot, Participant, SessionStatus, SubmissionOutcome,
    SubmitAnswerRequest, TimerAction, TimerSnapshot,
};

pub struct GameEngine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    sessions: SessionRegistry,
    timers: Arc<TimerService>,
    participants: Arc<ParticipantStore>,
    events: Arc<Broadcaster>,
    admission: AdmissionController,
}

impl GameEngine {
    /// 엔진을 만들고 타이머 만료를 받아 스냅샷을 갱신하는 작업을 띄웁니다.
    /// tokio 런타임 안에서 호출해야 합니다.
    pub fn new(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let config = config.sanitized();
        let events = Arc::new(Broadcaster::new(config.event_channel_capacity));
        let participants = Arc::new(ParticipantStore::new());
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();

        let timers = Arc::new(
            TimerService::new(
                Arc::new(TimerStore::new()),
                Arc::clone(&clock),
                Arc::clone(&events),
                config.grace_ms,
            )
            .with_expiry_listener(expired_tx),
        );
        let admission = AdmissionController::new(
            Arc::clone(&timers),
            Arc::clone(&participants),
            Arc::clone(&events),
            config.scoring.clone(),
            config.grace_ms,
            config.default_duration_ms,
        );

        tokio::spawn(watch_expirations(
            expired_rx,
            Arc::clone(&participants),
            Arc::clone(&events),
            Arc::clone(&clock),
        ));

        Self {
            config,
            clock,
            sessions: SessionRegistry::new(),
            timers,
            participants,
            events,
            admission,
        }
    }

    pub fn events(&self) -> &Arc<Broadcaster> {
        &self.events
    }

    pub fn session(&self, code: &str) -> Result<LiveSession, AppError> {
        self.sessions.get(code)
    }

    pub fn is_running(&self, code: &str) -> bool {
        self.sessions.contains(code)
    }

    // ── 세션 ──────────────────────────────────────────────

    pub fn open_session(&self, session: LiveSession) -> Result<(), AppError> {
        let code = session.code.clone();
        tracing::info!(
            session = %code,
            mode = ?session.play_mode,
            deferred = session.is_deferred,
            questions = session.questions.len(),
            "session opened"
        );
        self.sessions.insert(session)?;
        self.participants.open(&code);
        Ok(())
    }

    /// 세션의 메모리 상태를 모두 지우고 마지막 순위를 돌려줍니다.
    pub async fn close_session(&self, code: &str) -> Result<Vec<LeaderboardEntry>, AppError> {
        let mut final_standings = Vec::new();
        if let Ok(board) = self.participants.board(code) {
            final_standings = board.lock().await.leaderboard();
        }

        let timers = self.timers.store().purge_session(code).await;
        self.participants.remove(code);
        self.events.close_session(code);
        let removed = self.sessions.remove(code).is_some();
        tracing::info!(session = %code, timers, removed, "session closed");

        Ok(final_standings)
    }

    pub fn set_status(&self, code: &str, status: SessionStatus) -> Result<(), AppError> {
        self.sessions.set_status(code, status)?;
        tracing::info!(session = %code, ?status, "session status changed");
        Ok(())
    }

    pub fn set_answers_locked(&self, code: &str, actor: &str, locked: bool) -> Result<(), AppError> {
        let session = self.sessions.get(code)?;
        require_initiator(&session, actor)?;
        self.sessions.set_answers_locked(code, locked)?;
        tracing::info!(session = %code, locked, "answer lock changed");
        Ok(())
    }

    // ── 참가자 ────────────────────────────────────────────

    pub async fn join(&self, code: &str, user_id: &str, username: &str) -> Result<Participant, AppError> {
        let session = self.sessions.get(code)?;
        if user_id.is_empty() || username.trim().is_empty() {
            return Err(AppError::BadRequest("username is required".to_string()));
        }

        let board = self.participants.board(code)?;
        let mut board = board.lock().await;
        let outcome = board.join(user_id, username.trim(), session.is_deferred, &self.config.scoring);
        let leaderboard = board.leaderboard();
        drop(board);

        tracing::info!(
            session = %code,
            user_id,
            first_join = outcome.first_join,
            attempt = ?outcome.opened_attempt,
            "participant joined"
        );
        self.events.live_leaderboard(code, leaderboard);
        Ok(outcome.participant)
    }

    pub async fn disconnect(&self, code: &str, user_id: &str) -> Result<(), AppError> {
        let board = self.participants.board(code)?;
        board.lock().await.disconnect(user_id)?;
        tracing::info!(session = %code, user_id, "participant disconnected");
        Ok(())
    }

    /// deferred 시도를 마칩니다. 그 시도의 타이머는 지우고 점수는 남깁니다.
    pub async fn finish_attempt(&self, code: &str, user_id: &str) -> Result<Participant, AppError> {
        let session = self.sessions.get(code)?;
        if !session.is_deferred {
            return Err(AppError::BadRequest(
                "attempts exist only in deferred sessions".to_string(),
            ));
        }

        let board = self.participants.board(code)?;
        let participant = board.lock().await.finish_attempt(user_id)?;
        let purged = self
            .timers
            .store()
            .purge_attempt(code, user_id, participant.attempt_number)
            .await;
        tracing::info!(
            session = %code,
            user_id,
            attempt = participant.attempt_number,
            purged,
            "attempt finished"
        );
        Ok(participant)
    }

    // ── 타이머 ────────────────────────────────────────────

    /// 타이머 제어.
    ///
    /// live 세션은 세션을 만든 교사만, deferred 세션은 각 학생이 자기 시도의 타이머만 제어합니다.
    pub async fn control_timer(
        &self,
        code: &str,
        actor: &str,
        question_id: &str,
        action: TimerAction,
        duration_ms: Option<i64>,
    ) -> Result<TimerSnapshot, AppError> {
        let session = self.sessions.get(code)?;
        if session.is_practice() {
            return Err(AppError::BadRequest(
                "practice sessions have no timers".to_string(),
            ));
        }
        let question = session.question(question_id)?;
        let default_duration_ms = session.duration_for(question, self.config.default_duration_ms);

        let key = if session.is_deferred {
            self.attempt_key(&session, question_id, actor).await?
        } else {
            require_initiator(&session, actor)?;
            timer_key::resolve(code, question_id, false, None, None)?
        };

        let snapshot = self
            .timers
            .apply(&key, action, duration_ms, default_duration_ms)
            .await?;

        if action == TimerAction::Stop && !key.is_deferred() {
            checkpoint(&self.participants, &self.events, self.clock.as_ref(), code).await;
        }
        Ok(snapshot)
    }

    /// 현재 타이머 상태. deferred 세션에서는 조회하는 학생의 현재 시도 타이머입니다.
    pub async fn timer_state(
        &self,
        code: &str,
        viewer: &str,
        question_id: &str,
    ) -> Result<TimerSnapshot, AppError> {
        let session = self.sessions.get(code)?;
        let question = session.question(question_id)?;
        let default_duration_ms = session.duration_for(question, self.config.default_duration_ms);

        let key = if session.is_deferred {
            self.attempt_key(&session, question_id, viewer).await?
        } else {
            timer_key::resolve(code, question_id, false, None, None)?
        };
        Ok(self.timers.snapshot(&key, default_duration_ms).await)
    }

    async fn attempt_key(
        &self,
        session: &LiveSession,
        question_id: &str,
        user_id: &str,
    ) -> Result<TimerKey, AppError> {
        let board = self.participants.board(&session.code)?;
        let attempt = board
            .lock()
            .await
            .participant(user_id)
            .filter(|participant| participant.attempt_open)
            .map(|participant| participant.attempt_number);
        let Some(attempt) = attempt else {
            return Err(AppError::Forbidden(
                "no open attempt for this user".to_string(),
            ));
        };
        timer_key::resolve(&session.code, question_id, true, Some(user_id), Some(attempt))
    }

    // ── 답안 ──────────────────────────────────────────────

    pub async fn submit_answer(
        &self,
        code: &str,
        user_id: &str,
        request: SubmitAnswerRequest,
    ) -> Result<SubmissionOutcome, AppError> {
        let session = self.sessions.get(code)?;
        self.admission.submit(&session, user_id, request).await
    }

    // ── 순위 ──────────────────────────────────────────────

    pub async fn leaderboard(&self, code: &str) -> Result<Vec<LeaderboardEntry>, AppError> {
        let board = self.participants.board(code)?;
        let entries = board.lock().await.leaderboard();
        Ok(entries)
    }

    pub async fn leaderboard_snapshot(&self, code: &str) -> Result<LeaderboardSnapshot, AppError> {
        let board = self.participants.board(code)?;
        let snapshot = board.lock().await.snapshot();
        Ok(snapshot)
    }

    /// 교사가 직접 공개 순위표를 갱신합니다.
    pub async fn refresh_snapshot(&self, code: &str, actor: &str) -> Result<LeaderboardSnapshot, AppError> {
        let session = self.sessions.get(code)?;
        require_initiator(&session, actor)?;
        checkpoint(&self.participants, &self.events, self.clock.as_ref(), code)
            .await
            .ok_or(AppError::NotFound)
    }
}

fn require_initiator(session: &LiveSession, actor: &str) -> Result<(), AppError> {
    if session.is_initiator(actor) {
        Ok(())
    } else {
        tracing::warn!(session = %session.code, actor, "control action from non-initiator");
        Err(AppError::Forbidden(
            "only the session initiator may do this".to_string(),
        ))
    }
}

/// 스냅샷 갱신 지점: 공개 순위표를 새로 얼리고 공개 방에 보냅니다.
async fn checkpoint(
    participants: &ParticipantStore,
    events: &Broadcaster,
    clock: &dyn Clock,
    code: &str,
) -> Option<LeaderboardSnapshot> {
    let board = participants.board(code).ok()?;
    let snapshot = board.lock().await.refresh_snapshot(clock.now_ms());
    events.snapshot_leaderboard(code, &snapshot);
    tracing::debug!(session = %code, entries = snapshot.entries.len(), "leaderboard snapshot refreshed");
    Some(snapshot)
}

/// live 문항이 자연 만료되면 스냅샷을 갱신합니다. deferred 시도의 만료는 공개 화면과 무관합니다.
async fn watch_expirations(
    mut expired: mpsc::UnboundedReceiver<TimerKey>,
    participants: Arc<ParticipantStore>,
    events: Arc<Broadcaster>,
    clock: Arc<dyn Clock>,
) {
    while let Some(key) = expired.recv().await {
        if key.is_deferred() {
            continue;
        }
        checkpoint(&participants, &events, clock.as_ref(), &key.session_code).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AnswerValue, GameSession, PlayMode, Question, QuestionKind, RejectReason, ServerEvent,
        TimerStatus,
    };
    use crate::services::broadcast::Room;
    use crate::services::clock::ManualClock;

    const TEACHER: &str = "teacher";

    fn question(id: &str, time_limit_ms: i64) -> Question {
        Question {
            id: id.to_string(),
            kind: QuestionKind::SingleChoice {
                options: vec!["a".into(), "b".into(), "c".into()],
                correct: 1,
            },
            points: 1.0,
            time_limit_ms: Some(time_limit_ms),
        }
    }

    fn live_session(code: &str, play_mode: PlayMode, is_deferred: bool) -> LiveSession {
        let row = GameSession {
            access_code: code.to_string(),
            initiator_id: TEACHER.to_string(),
            play_mode,
            is_deferred,
            status: SessionStatus::Active,
            created_at: String::new(),
            updated_at: String::new(),
        };
        LiveSession::new(&row, vec![question("q1", 20_000), question("q2", 20_000)])
    }

    fn engine(clock: Arc<ManualClock>) -> GameEngine {
        GameEngine::new(EngineConfig::default(), clock)
    }

    fn answer(question_id: &str, choice: usize, client_timestamp_ms: i64) -> SubmitAnswerRequest {
        SubmitAnswerRequest {
            question_id: question_id.to_string(),
            attempt_number: None,
            value: AnswerValue::Choice(choice),
            client_timestamp_ms,
        }
    }

    #[tokio::test]
    async fn twenty_second_question_scores_fast_players_and_rejects_late_one() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let engine = engine(clock.clone());
        engine.open_session(live_session("ABC", PlayMode::Tournament, false)).unwrap();
        for user in ["a", "b", "c"] {
            engine.join("ABC", user, user).await.unwrap();
        }

        engine
            .control_timer("ABC", TEACHER, "q1", TimerAction::Run, None)
            .await
            .unwrap();
        let start = clock.now_ms();

        clock.set(start + 1_000);
        let a = engine.submit_answer("ABC", "a", answer("q1", 1, start + 1_000)).await.unwrap();
        clock.set(start + 5_000);
        let b = engine.submit_answer("ABC", "b", answer("q1", 1, start + 5_000)).await.unwrap();
        clock.set(start + 20_600);
        let c = engine.submit_answer("ABC", "c", answer("q1", 1, start + 19_900)).await.unwrap();

        assert!(a.accepted && b.accepted);
        assert!(a.score_delta.unwrap() > b.score_delta.unwrap());
        assert_eq!(c.reason, Some(RejectReason::Late));

        let board = engine.leaderboard("ABC").await.unwrap();
        let order: Vec<_> = board.iter().map(|entry| entry.user_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn pause_keeps_accepting_answers() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock.clone());
        engine.open_session(live_session("ABC", PlayMode::Quiz, false)).unwrap();
        engine.join("ABC", "a", "A").await.unwrap();

        engine.control_timer("ABC", TEACHER, "q1", TimerAction::Run, None).await.unwrap();
        clock.advance(5_000);
        engine.control_timer("ABC", TEACHER, "q1", TimerAction::Pause, None).await.unwrap();
        clock.advance(10 * 60_000);

        let outcome = engine.submit_answer("ABC", "a", answer("q1", 1, clock.now_ms())).await.unwrap();
        assert!(outcome.accepted);
    }

    #[tokio::test]
    async fn teacher_stop_rejects_answers_as_stopped() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock.clone());
        engine.open_session(live_session("ABC", PlayMode::Quiz, false)).unwrap();
        engine.join("ABC", "a", "A").await.unwrap();

        engine.control_timer("ABC", TEACHER, "q1", TimerAction::Run, None).await.unwrap();
        engine.control_timer("ABC", TEACHER, "q1", TimerAction::Stop, None).await.unwrap();

        let outcome = engine.submit_answer("ABC", "a", answer("q1", 1, 0)).await.unwrap();
        assert_eq!(outcome.reason, Some(RejectReason::Stopped));
    }

    #[tokio::test]
    async fn only_initiator_controls_live_timer() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock);
        engine.open_session(live_session("ABC", PlayMode::Quiz, false)).unwrap();
        engine.join("ABC", "a", "A").await.unwrap();

        let result = engine.control_timer("ABC", "a", "q1", TimerAction::Run, None).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn practice_session_has_no_timer_but_accepts_answers() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock);
        engine.open_session(live_session("ABC", PlayMode::Practice, false)).unwrap();
        engine.join("ABC", "a", "A").await.unwrap();

        let control = engine.control_timer("ABC", TEACHER, "q1", TimerAction::Run, None).await;
        assert!(matches!(control, Err(AppError::BadRequest(_))));

        let outcome = engine.submit_answer("ABC", "a", answer("q1", 1, 0)).await.unwrap();
        assert!(outcome.accepted);
        assert!(outcome.score_delta.unwrap() > 0.0);
    }

    #[tokio::test]
    async fn locked_answers_are_rejected() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock);
        engine.open_session(live_session("ABC", PlayMode::Quiz, false)).unwrap();
        engine.join("ABC", "a", "A").await.unwrap();
        engine.control_timer("ABC", TEACHER, "q1", TimerAction::Run, None).await.unwrap();

        engine.set_answers_locked("ABC", TEACHER, true).unwrap();
        let outcome = engine.submit_answer("ABC", "a", answer("q1", 1, 0)).await.unwrap();
        assert_eq!(outcome.reason, Some(RejectReason::Locked));
    }

    #[tokio::test]
    async fn identical_resubmission_is_not_rescored() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock.clone());
        engine.open_session(live_session("ABC", PlayMode::Quiz, false)).unwrap();
        engine.join("ABC", "a", "A").await.unwrap();
        engine.control_timer("ABC", TEACHER, "q1", TimerAction::Run, None).await.unwrap();

        clock.advance(2_000);
        let first = engine.submit_answer("ABC", "a", answer("q1", 1, 2_000)).await.unwrap();
        clock.advance(1_000);
        let again = engine.submit_answer("ABC", "a", answer("q1", 1, 3_000)).await.unwrap();

        assert!(again.accepted);
        assert_eq!(again.score_delta, Some(0.0));
        assert_eq!(again.total_score, first.total_score);
    }

    #[tokio::test]
    async fn quiz_answers_push_distribution_to_dashboard_only() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock);
        engine.open_session(live_session("ABC", PlayMode::Quiz, false)).unwrap();
        engine.join("ABC", "a", "A").await.unwrap();
        engine.control_timer("ABC", TEACHER, "q1", TimerAction::Run, None).await.unwrap();

        let mut dashboard = engine.events().subscribe("ABC", Room::Dashboard);
        let mut projection = engine.events().subscribe("ABC", Room::Projection);
        engine.submit_answer("ABC", "a", answer("q1", 2, 0)).await.unwrap();

        let mut saw_stats = false;
        while let Ok(event) = dashboard.try_recv() {
            if let ServerEvent::AnswerStatsUpdate { distribution, .. } = event {
                assert_eq!(distribution, vec![0, 0, 1]);
                saw_stats = true;
            }
        }
        assert!(saw_stats);
        assert!(projection.try_recv().is_err());
    }

    #[tokio::test]
    async fn projection_sees_scores_only_after_checkpoint() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock.clone());
        engine.open_session(live_session("ABC", PlayMode::Quiz, false)).unwrap();
        engine.join("ABC", "a", "A").await.unwrap();
        engine.join("ABC", "b", "B").await.unwrap();
        engine.refresh_snapshot("ABC", TEACHER).await.unwrap();

        engine.control_timer("ABC", TEACHER, "q1", TimerAction::Run, None).await.unwrap();
        clock.advance(1_000);
        engine.submit_answer("ABC", "b", answer("q1", 1, 1_000)).await.unwrap();

        let frozen = engine.leaderboard_snapshot("ABC").await.unwrap();
        assert_eq!(frozen.entries[0].user_id, "a");

        engine.control_timer("ABC", TEACHER, "q1", TimerAction::Stop, None).await.unwrap();
        let refreshed = engine.leaderboard_snapshot("ABC").await.unwrap();
        assert_eq!(refreshed.entries[0].user_id, "b");
    }

    #[tokio::test]
    async fn deferred_attempts_have_independent_timers_and_scores() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock.clone());
        engine.open_session(live_session("ABC", PlayMode::Tournament, true)).unwrap();
        engine.join("ABC", "a", "A").await.unwrap();

        engine.control_timer("ABC", "a", "q1", TimerAction::Run, None).await.unwrap();
        clock.advance(2_000);
        let first = engine.submit_answer("ABC", "a", answer("q1", 1, 2_000)).await.unwrap();
        assert!(first.accepted);

        engine.finish_attempt("ABC", "a").await.unwrap();
        let rejoined = engine.join("ABC", "a", "A").await.unwrap();
        assert_eq!(rejoined.attempt_number, 2);

        // 새 시도의 타이머는 아직 시작 전
        let timer = engine.timer_state("ABC", "a", "q1").await.unwrap();
        assert_eq!(timer.status, TimerStatus::Stop);

        engine.control_timer("ABC", "a", "q1", TimerAction::Run, None).await.unwrap();
        clock.advance(10_000);
        let second = engine.submit_answer("ABC", "a", answer("q1", 1, clock.now_ms())).await.unwrap();
        assert!(second.accepted);
        assert!(second.score_delta.unwrap() < first.score_delta.unwrap());
        // 첫 시도가 더 좋았으므로 참가자 점수는 그대로
        assert_eq!(second.total_score, first.total_score);
    }

    #[tokio::test]
    async fn answer_before_timer_start_never_beats_a_timed_answer() {
        for deferred in [false, true] {
            let clock = Arc::new(ManualClock::new(0));
            let engine = engine(clock.clone());
            engine.open_session(live_session("ABC", PlayMode::Tournament, deferred)).unwrap();
            engine.join("ABC", "early", "Early").await.unwrap();
            engine.join("ABC", "fair", "Fair").await.unwrap();

            let early = engine.submit_answer("ABC", "early", answer("q1", 1, 0)).await.unwrap();

            let controller = if deferred { "fair" } else { TEACHER };
            engine
                .control_timer("ABC", controller, "q1", TimerAction::Run, None)
                .await
                .unwrap();
            clock.advance(1_000);
            let fair = engine
                .submit_answer("ABC", "fair", answer("q1", 1, clock.now_ms()))
                .await
                .unwrap();

            assert!(early.accepted && fair.accepted);
            assert!(
                early.score_delta.unwrap() < fair.score_delta.unwrap(),
                "deferred = {}",
                deferred
            );
            let board = engine.leaderboard("ABC").await.unwrap();
            assert_eq!(board[0].user_id, "fair");
        }
    }

    #[tokio::test]
    async fn concurrent_answers_add_up_to_the_final_score() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = Arc::new(engine(clock.clone()));
        engine.open_session(live_session("ABC", PlayMode::Quiz, false)).unwrap();

        let mut join_bonus = std::collections::HashMap::new();
        for index in 0..16 {
            let user = format!("user-{}", index);
            let participant = engine.join("ABC", &user, &user).await.unwrap();
            join_bonus.insert(user, participant.join_order_bonus);
        }
        for question_id in ["q1", "q2"] {
            engine
                .control_timer("ABC", TEACHER, question_id, TimerAction::Run, None)
                .await
                .unwrap();
        }
        clock.advance(1_000);

        let mut tasks = Vec::new();
        for user in join_bonus.keys().cloned() {
            for question_id in ["q1", "q2"] {
                let engine = Arc::clone(&engine);
                let user = user.clone();
                tasks.push(tokio::spawn(async move {
                    let outcome = engine
                        .submit_answer("ABC", &user, answer(question_id, 1, 1_000))
                        .await
                        .unwrap();
                    (user, outcome)
                }));
            }
        }

        let mut credited = std::collections::HashMap::new();
        for task in tasks {
            let (user, outcome) = task.await.unwrap();
            assert!(outcome.accepted);
            *credited.entry(user).or_insert(0.0) += outcome.score_delta.unwrap();
        }

        let board = engine.leaderboard("ABC").await.unwrap();
        assert_eq!(board.len(), 16);
        for entry in board {
            let expected = join_bonus[&entry.user_id] + credited[&entry.user_id];
            assert!(
                (entry.score - expected).abs() < 1e-6,
                "{}: {} != {}",
                entry.user_id,
                entry.score,
                expected
            );
        }
    }

    #[tokio::test]
    async fn natural_expiry_refreshes_the_projection_snapshot() {
        let clock = Arc::new(ManualClock::new(0));
        let config = EngineConfig {
            grace_ms: 0,
            ..EngineConfig::default()
        };
        let engine = GameEngine::new(config, clock.clone());
        let row = GameSession {
            access_code: "ABC".to_string(),
            initiator_id: TEACHER.to_string(),
            play_mode: PlayMode::Quiz,
            is_deferred: false,
            status: SessionStatus::Active,
            created_at: String::new(),
            updated_at: String::new(),
        };
        engine
            .open_session(LiveSession::new(&row, vec![question("q1", 200)]))
            .unwrap();
        engine.join("ABC", "a", "A").await.unwrap();
        engine.join("ABC", "b", "B").await.unwrap();
        engine.refresh_snapshot("ABC", TEACHER).await.unwrap();

        let mut projection = engine.events().subscribe("ABC", Room::Projection);
        engine.control_timer("ABC", TEACHER, "q1", TimerAction::Run, None).await.unwrap();
        clock.advance(50);
        let outcome = engine.submit_answer("ABC", "b", answer("q1", 1, 50)).await.unwrap();
        assert!(outcome.accepted);
        assert_eq!(engine.leaderboard_snapshot("ABC").await.unwrap().entries[0].user_id, "a");

        let entries = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                if let Ok(ServerEvent::LeaderboardUpdate { entries }) = projection.recv().await {
                    return entries;
                }
            }
        })
        .await
        .expect("expiry should refresh the snapshot");

        assert_eq!(entries[0].user_id, "b");
        assert_eq!(engine.leaderboard_snapshot("ABC").await.unwrap().entries[0].user_id, "b");
        let timer = engine.timer_state("ABC", TEACHER, "q1").await.unwrap();
        assert_eq!(timer.status, TimerStatus::Stop);
    }

    #[tokio::test]
    async fn closing_session_purges_state_and_returns_standings() {
        let clock = Arc::new(ManualClock::new(0));
        let engine = engine(clock);
        engine.open_session(live_session("ABC", PlayMode::Quiz, false)).unwrap();
        engine.join("ABC", "a", "A").await.unwrap();
        engine.control_timer("ABC", TEACHER, "q1", TimerAction::Run, None).await.unwrap();

        let standings = engine.close_session("ABC").await.unwrap();

        assert_eq!(standings.len(), 1);
        assert!(!engine.is_running("ABC"));
        assert!(matches!(engine.leaderboard("ABC").await, Err(AppError::NotFound)));
    }
}
