//! # 정식 타이머 저장소 (Canonical Timer Store)
//!
//! "남은 시간이 얼마인가"에 대한 유일한 진실 공급원입니다.
//! 대시보드, 프로젝션, 플레이어 화면과 답안 판정이 모두 여기서 읽습니다.
//!
//! ## 구조
//! ```text
//! DashMap<TimerKey, Arc<Mutex<TimerSlot>>>
//!            │                   └─ 키 하나의 레코드 + 만료 작업 핸들 (원자적 읽기-수정-쓰기)
//!            └─ 샤딩된 맵: 서로 다른 세션은 같은 락을 두고 경쟁하지 않음
//! ```
//! 쓰기는 `services::timers::TimerService`만 합니다. 다른 모듈은 `get()`으로 복사본을 읽습니다.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::timer_key::TimerKey;
use crate::models::TimerRecord;

/// 키 하나의 상태
#[derive(Debug, Default)]
pub struct TimerSlot {
    pub(super) record: Option<TimerRecord>,
    expiry: Option<JoinHandle<()>>,
    /// 상태가 바뀔 때마다 증가. 이미 깨어난 만료 작업이 낡은 예약인지 가려냅니다.
    generation: u64,
}

impl TimerSlot {
    pub(super) fn generation(&self) -> u64 {
        self.generation
    }

    /// 예약된 만료 작업을 취소하고 새 세대 번호를 돌려줍니다.
    pub(super) fn cancel_expiry(&mut self) -> u64 {
        if let Some(handle) = self.expiry.take() {
            handle.abort();
        }
        self.generation += 1;
        self.generation
    }

    pub(super) fn arm_expiry(&mut self, handle: JoinHandle<()>) {
        if let Some(previous) = self.expiry.replace(handle) {
            previous.abort();
        }
    }

    /// 만료 작업이 스스로 끝날 때 핸들만 치웁니다 (abort 하지 않음).
    pub(super) fn clear_fired_expiry(&mut self) {
        self.expiry = None;
    }

    pub fn has_pending_expiry(&self) -> bool {
        self.expiry.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

#[derive(Debug, Default)]
pub struct TimerStore {
    slots: DashMap<TimerKey, Arc<Mutex<TimerSlot>>>,
}

impl TimerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 키의 슬롯을 가져오거나 빈 슬롯을 만듭니다.
    ///
    /// DashMap의 참조는 `.await`를 넘어 들고 있으면 안 되므로 `Arc`만 복제해서 돌려줍니다.
    pub(super) fn slot(&self, key: &TimerKey) -> Arc<Mutex<TimerSlot>> {
        self.slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(TimerSlot::default())))
            .clone()
    }

    /// 이미 있는 슬롯만. 정리된 키에 대해 빈 슬롯을 다시 만들지 않습니다.
    pub(super) fn existing_slot(&self, key: &TimerKey) -> Option<Arc<Mutex<TimerSlot>>> {
        self.slots.get(key).map(|entry| entry.value().clone())
    }

    /// 현재 레코드의 복사본. 한 번도 쓰인 적 없는 키면 `None`.
    pub async fn get(&self, key: &TimerKey) -> Option<TimerRecord> {
        let slot = self.slots.get(key).map(|entry| entry.value().clone())?;
        let guard = slot.lock().await;
        guard.record.clone()
    }

    pub async fn has_pending_expiry(&self, key: &TimerKey) -> bool {
        let Some(slot) = self.slots.get(key).map(|entry| entry.value().clone()) else {
            return false;
        };
        let guard = slot.lock().await;
        guard.has_pending_expiry()
    }

    /// 세션의 모든 타이머(live + 모든 deferred 시도)를 지우고 만료 작업을 취소합니다.
    pub async fn purge_session(&self, session_code: &str) -> usize {
        self.purge_where(|key| key.belongs_to(session_code)).await
    }

    /// deferred 시도 하나의 타이머만 지웁니다. 다른 시도는 건드리지 않습니다.
    pub async fn purge_attempt(&self, session_code: &str, user_id: &str, attempt_number: u32) -> usize {
        self.purge_where(|key| key.belongs_to_attempt(session_code, user_id, attempt_number))
            .await
    }

    async fn purge_where(&self, matches: impl Fn(&TimerKey) -> bool) -> usize {
        let keys: Vec<TimerKey> = self
            .slots
            .iter()
            .filter(|entry| matches(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for key in keys {
            if let Some((_, slot)) = self.slots.remove(&key) {
                slot.lock().await.cancel_expiry();
                removed += 1;
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::timer_key::resolve;

    #[tokio::test]
    async fn purge_attempt_leaves_other_attempts_and_sessions() {
        let store = TimerStore::new();
        let keys = [
            resolve("ABC", "q1", true, Some("alice"), Some(1)).unwrap(),
            resolve("ABC", "q1", true, Some("alice"), Some(2)).unwrap(),
            resolve("XYZ", "q1", false, None, None).unwrap(),
        ];
        for key in &keys {
            store.slot(key).lock().await.record = Some(TimerRecord::stopped("q1", 1_000));
        }

        assert_eq!(store.purge_attempt("ABC", "alice", 1).await, 1);
        assert!(store.get(&keys[0]).await.is_none());
        assert!(store.get(&keys[1]).await.is_some());

        assert_eq!(store.purge_session("ABC").await, 1);
        assert!(store.get(&keys[2]).await.is_some());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn cancel_expiry_aborts_scheduled_task() {
        let store = TimerStore::new();
        let key = resolve("ABC", "q1", false, None, None).unwrap();
        let slot = store.slot(&key);

        let handle = tokio::spawn(async {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        });
        let mut guard = slot.lock().await;
        guard.arm_expiry(handle);
        assert!(guard.has_pending_expiry());

        let before = guard.generation();
        let after = guard.cancel_expiry();
        assert_eq!(after, before + 1);
        assert!(!guard.has_pending_expiry());
    }
}
