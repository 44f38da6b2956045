//! 진행 중인 세션의 메모리 레지스트리.
//!
//! DB의 `game_sessions` 행과 문항 목록을 시작 시점에 한 번 읽어 올려 두고,
//! 답안 잠금 같은 플레이 중 상태만 여기서 바꿉니다.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::AppError;
use crate::models::{GameSession, PlayMode, Question, SessionStatus};

#[derive(Debug, Clone)]
pub struct LiveSession {
    pub code: String,
    pub initiator_id: String,
    pub play_mode: PlayMode,
    pub is_deferred: bool,
    pub status: SessionStatus,
    pub questions: Arc<Vec<Question>>,
    pub answers_locked: bool,
}

impl LiveSession {
    pub fn new(session: &GameSession, questions: Vec<Question>) -> Self {
        Self {
            code: session.access_code.clone(),
            initiator_id: session.initiator_id.clone(),
            play_mode: session.play_mode,
            is_deferred: session.is_deferred,
            status: SessionStatus::Active,
            questions: Arc::new(questions),
            answers_locked: false,
        }
    }

    pub fn question(&self, question_id: &str) -> Result<&Question, AppError> {
        self.questions
            .iter()
            .find(|question| question.id == question_id)
            .ok_or(AppError::NotFound)
    }

    pub fn is_initiator(&self, user_id: &str) -> bool {
        self.initiator_id == user_id
    }

    pub fn is_practice(&self) -> bool {
        self.play_mode == PlayMode::Practice
    }

    /// 문항 제한 시간, 없으면 서버 기본값
    pub fn duration_for(&self, question: &Question, default_ms: i64) -> i64 {
        question.time_limit_ms.filter(|ms| *ms > 0).unwrap_or(default_ms)
    }
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, LiveSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: LiveSession) -> Result<(), AppError> {
        match self.sessions.entry(session.code.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "session {} is already running",
                session.code
            ))),
            Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    /// 현재 상태의 복사본. 문항 목록은 `Arc`라 복사 비용이 작습니다.
    pub fn get(&self, code: &str) -> Result<LiveSession, AppError> {
        self.sessions
            .get(code)
            .map(|entry| entry.value().clone())
            .ok_or(AppError::NotFound)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.sessions.contains_key(code)
    }

    pub fn remove(&self, code: &str) -> Option<LiveSession> {
        self.sessions.remove(code).map(|(_, session)| session)
    }

    pub fn set_status(&self, code: &str, status: SessionStatus) -> Result<(), AppError> {
        let mut session = self.sessions.get_mut(code).ok_or(AppError::NotFound)?;
        session.status = status;
        Ok(())
    }

    pub fn set_answers_locked(&self, code: &str, locked: bool) -> Result<(), AppError> {
        let mut session = self.sessions.get_mut(code).ok_or(AppError::NotFound)?;
        session.answers_locked = locked;
        Ok(())
    }
}
