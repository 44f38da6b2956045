//! # 데이터 모델 모듈
//!
//! 애플리케이션에서 사용하는 데이터 구조체(struct)들을 정의합니다.
//! 각 하위 모듈은 특정 도메인의 데이터 타입을 담당합니다:
//! - `answer`: 답안 제출 요청, 답안 레코드, 수락/거절 결과
//! - `event`: WebSocket으로 내보내는 실시간 이벤트
//! - `participant`: 참가자와 순위표
//! - `question`: 문항과 답안 값
//! - `session`: 게임 세션
//! - `timer`: 정식 타이머 레코드와 스냅샷
//!
//! `pub use X::*;`로 재공개하여 `crate::models::TimerRecord`처럼 짧게 접근합니다.

pub mod answer;
pub mod event;
pub mod participant;
pub mod question;
pub mod session;
pub mod timer;

pub use answer::*;
pub use event::*;
pub use participant::*;
pub use question::*;
pub use session::*;
pub use timer::*;
