//! # 서비스 계층 (타이머 & 채점 엔진)
//!
//! HTTP와 DB를 모르는 순수한 게임 로직입니다. 라우트 핸들러는 `engine::GameEngine`만 씁니다.
//! - `timer_key`: 타이머 키 결정
//! - `timer_store`: 정식 타이머 저장소
//! - `timers`: 타이머 생명주기 (시작/일시정지/정지/변경, 만료 예약)
//! - `admission`: 답안 수락 판정
//! - `scoring`: 점수 계산
//! - `participants`: 참가자와 순위표, 스냅샷
//! - `broadcast`: 방(room)별 이벤트 채널
//! - `sessions`: 진행 중인 세션 레지스트리
//! - `clock`: 서버 시각

pub mod admission;
pub mod broadcast;
pub mod clock;
pub mod engine;
pub mod participants;
pub mod scoring;
pub mod sessions;
pub mod timer_key;
pub mod timer_store;
pub mod timers;

pub use engine::GameEngine;
