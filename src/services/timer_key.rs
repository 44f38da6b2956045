//! # 타이머 키 결정
//!
//! (세션 코드, 문항 ID, live/deferred, 사용자 ID, 시도 번호) → 타이머 키.
//!
//! - live: 같은 세션의 같은 문항은 모든 참가자가 **하나의** 타이머를 공유합니다.
//! - deferred: 사용자와 시도 번호까지 키에 들어가므로, 각 시도가 독립된 카운트다운을 가집니다.
//!
//! 타이머 저장소에 접근하는 모든 코드는 이 함수를 거칩니다. 세션끼리 키가 섞이는 일을 막습니다.

use std::fmt;

use crate::error::AppError;

/// deferred 타이머의 소유자
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttemptScope {
    pub user_id: String,
    pub attempt_number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub session_code: String,
    pub question_id: String,
    /// `None`이면 live 타이머
    pub attempt: Option<AttemptScope>,
}

impl TimerKey {
    pub fn is_deferred(&self) -> bool {
        self.attempt.is_some()
    }

    /// 같은 세션에 속한 키인지
    pub fn belongs_to(&self, session_code: &str) -> bool {
        self.session_code == session_code
    }

    /// 같은 deferred 시도에 속한 키인지
    pub fn belongs_to_attempt(&self, session_code: &str, user_id: &str, attempt_number: u32) -> bool {
        self.session_code == session_code
            && self.attempt.as_ref().is_some_and(|scope| {
                scope.user_id == user_id && scope.attempt_number == attempt_number
            })
    }
}

/// 사람이 읽을 수 있는 키 형태. 로그에 씁니다.
///
/// - live: `timer:{code}:{question}`
/// - deferred: `timer:{code}:{question}:user:{user}:attempt:{n}`
impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer:{}:{}", self.session_code, self.question_id)?;
        if let Some(scope) = &self.attempt {
            write!(f, ":user:{}:attempt:{}", scope.user_id, scope.attempt_number)?;
        }
        Ok(())
    }
}

/// 타이머 키를 만듭니다.
///
/// # 에러
/// deferred인데 `user_id`나 `attempt_number`가 없으면 `AppError::InvalidKeyConstruction`.
/// live 모드에서는 두 값이 주어져도 무시합니다.
pub fn resolve(
    session_code: &str,
    question_id: &str,
    is_deferred: bool,
    user_id: Option<&str>,
    attempt_number: Option<u32>,
) -> Result<TimerKey, AppError> {
    let attempt = if is_deferred {
        match (user_id, attempt_number) {
            (Some(user_id), Some(attempt_number)) if !user_id.is_empty() => Some(AttemptScope {
                user_id: user_id.to_string(),
                attempt_number,
            }),
            _ => {
                return Err(AppError::InvalidKeyConstruction(format!(
                    "deferred timer for {}/{} requires user id and attempt number",
                    session_code, question_id
                )))
            }
        }
    } else {
        None
    };

    Ok(TimerKey {
        session_code: session_code.to_string(),
        question_id: question_id.to_string(),
        attempt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn live_key_ignores_user_and_attempt() {
        let a = resolve("ABC123", "q1", false, Some("alice"), Some(1)).unwrap();
        let b = resolve("ABC123", "q1", false, Some("bob"), Some(7)).unwrap();

        assert_eq!(a, b);
        assert!(!a.is_deferred());
        assert_eq!(a.to_string(), "timer:ABC123:q1");
    }

    #[test]
    fn deferred_keys_are_isolated_per_user_and_attempt() {
        let first = resolve("ABC123", "q1", true, Some("alice"), Some(1)).unwrap();
        let second = resolve("ABC123", "q1", true, Some("alice"), Some(2)).unwrap();
        let other_user = resolve("ABC123", "q1", true, Some("bob"), Some(1)).unwrap();

        assert_ne!(first, second);
        assert_ne!(first, other_user);
        assert_eq!(first.to_string(), "timer:ABC123:q1:user:alice:attempt:1");
        assert!(first.belongs_to_attempt("ABC123", "alice", 1));
        assert!(!second.belongs_to_attempt("ABC123", "alice", 1));
    }

    #[test]
    fn deferred_key_without_identifiers_is_rejected() {
        let missing_attempt = resolve("ABC123", "q1", true, Some("alice"), None);
        let missing_user = resolve("ABC123", "q1", true, None, Some(1));
        let empty_user = resolve("ABC123", "q1", true, Some(""), Some(1));

        for result in [missing_attempt, missing_user, empty_user] {
            assert!(matches!(result, Err(AppError::InvalidKeyConstruction(_))));
        }
    }
}
