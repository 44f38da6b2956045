//! # 타이머 생명주기 서비스
//!
//! 정식 타이머 저장소의 **유일한 쓰기 주체**입니다.
//! 시작/일시정지/재개/정지/시간 변경을 처리하고, 바뀔 때마다 브로드캐스트 계층에 알립니다.
//!
//! ## 상태 전이
//! ```text
//!            start                pause
//!   stop ───────────▶ run ─────────────────▶ pause
//!    ▲                 │ ▲                     │
//!    │      stop       │ └───── start ─────────┘  (남은 시간 그대로 재개)
//!    └─────────────────┘
//!    ▲
//!    └── 만료 콜백 (end_date + grace 시점, expired = true)
//! ```
//!
//! ## 만료 예약
//! 키마다 `tokio::spawn`으로 잠들어 있는 작업 하나를 두고, 그 `JoinHandle`을 레코드 옆에 보관합니다.
//! 어떤 변경이든 먼저 기존 작업을 abort 한 뒤에 새 작업을 예약합니다.
//! 이미 깨어나 락을 기다리던 작업은 세대 번호가 달라서 아무것도 하지 않습니다.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::broadcast::Broadcaster;
use super::clock::Clock;
use super::timer_key::TimerKey;
use super::timer_store::{TimerSlot, TimerStore};
use crate::error::AppError;
use crate::models::{TimerAction, TimerRecord, TimerSnapshot, TimerStatus};

/// 한 문항 타이머의 최대 길이 (24시간)
pub const MAX_DURATION_MS: i64 = 24 * 60 * 60 * 1000;

pub struct TimerService {
    store: Arc<TimerStore>,
    clock: Arc<dyn Clock>,
    events: Arc<Broadcaster>,
    grace_ms: i64,
    /// 자연 만료된 타이머 키를 받아 갈 곳 (스냅샷 갱신 등)
    expirations: Option<mpsc::UnboundedSender<TimerKey>>,
}

impl TimerService {
    pub fn new(
        store: Arc<TimerStore>,
        clock: Arc<dyn Clock>,
        events: Arc<Broadcaster>,
        grace_ms: i64,
    ) -> Self {
        Self {
            store,
            clock,
            events,
            grace_ms: grace_ms.max(0),
            expirations: None,
        }
    }

    pub fn with_expiry_listener(mut self, listener: mpsc::UnboundedSender<TimerKey>) -> Self {
        self.expirations = Some(listener);
        self
    }

    pub fn store(&self) -> &Arc<TimerStore> {
        &self.store
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// 제어 동작 하나를 적용합니다.
    ///
    /// `default_duration_ms`는 처음 보는 키를 초기화할 때 쓰는 전체 시간(보통 문항 제한 시간)입니다.
    pub async fn apply(
        self: &Arc<Self>,
        key: &TimerKey,
        action: TimerAction,
        duration_ms: Option<i64>,
        default_duration_ms: i64,
    ) -> Result<TimerSnapshot, AppError> {
        match action {
            TimerAction::Run => self.start(key, duration_ms, default_duration_ms).await,
            TimerAction::Pause => Ok(self.pause(key, default_duration_ms).await),
            TimerAction::Stop => Ok(self.stop(key, default_duration_ms).await),
            TimerAction::Edit => {
                let duration_ms = duration_ms.ok_or_else(|| {
                    AppError::BadRequest("edit requires duration_ms".to_string())
                })?;
                self.edit(key, duration_ms).await
            }
        }
    }

    /// 시작 또는 재개.
    ///
    /// - 레코드 없음 / `stop` → 전체 시간으로 새로 시작
    /// - `pause` → 저장된 `remaining_ms`로 재개 (전체 시간으로 되돌리지 않음)
    /// - `run` → 상태는 그대로, 만료 예약만 다시 함
    pub async fn start(
        self: &Arc<Self>,
        key: &TimerKey,
        requested_duration_ms: Option<i64>,
        default_duration_ms: i64,
    ) -> Result<TimerSnapshot, AppError> {
        if let Some(duration) = requested_duration_ms {
            validate_duration(duration)?;
        }

        let slot = self.store.slot(key);
        let mut guard = slot.lock().await;
        let now = self.clock.now_ms();
        let generation = guard.cancel_expiry();

        let record = guard
            .record
            .get_or_insert_with(|| TimerRecord::stopped(&key.question_id, default_duration_ms));

        match record.status {
            TimerStatus::Stop => {
                let full = requested_duration_ms.unwrap_or(record.duration_ms);
                record.duration_ms = full;
                record.status = TimerStatus::Run;
                record.end_date_ms = Some(now.saturating_add(full));
                record.remaining_ms = None;
                tracing::info!(%key, duration_ms = full, "timer started");
            }
            TimerStatus::Pause => {
                let remaining = record.remaining_ms.unwrap_or(record.duration_ms).max(0);
                record.status = TimerStatus::Run;
                record.end_date_ms = Some(now.saturating_add(remaining));
                record.remaining_ms = None;
                tracing::info!(%key, remaining_ms = remaining, "timer resumed");
            }
            TimerStatus::Run => {
                tracing::debug!(%key, "timer already running, expiry rescheduled");
            }
        }
        record.expired = false;

        let end_date_ms = record.end_date_ms.unwrap_or(now);
        let snapshot = record.snapshot(now);
        self.schedule_expiry(key, &mut guard, generation, end_date_ms, now);
        drop(guard);

        self.events.timer_update(key, &snapshot);
        Ok(snapshot)
    }

    /// 일시정지. `run`에서만 의미가 있고, 이미 멈춘 상태면 로그만 남깁니다.
    pub async fn pause(&self, key: &TimerKey, default_duration_ms: i64) -> TimerSnapshot {
        let slot = self.store.slot(key);
        let mut guard = slot.lock().await;
        let now = self.clock.now_ms();

        let created = guard.record.is_none();
        let status = guard
            .record
            .get_or_insert_with(|| TimerRecord::stopped(&key.question_id, default_duration_ms))
            .status;

        let changed = match status {
            TimerStatus::Run => {
                guard.cancel_expiry();
                if let Some(record) = guard.record.as_mut() {
                    let remaining = record.remaining_at(now);
                    record.status = TimerStatus::Pause;
                    record.end_date_ms = None;
                    record.remaining_ms = Some(remaining);
                    tracing::info!(%key, remaining_ms = remaining, "timer paused");
                }
                true
            }
            TimerStatus::Pause | TimerStatus::Stop => {
                tracing::info!(%key, ?status, "pause ignored, timer not running");
                created
            }
        };

        let snapshot = snapshot_of(&guard, key, default_duration_ms, now);
        drop(guard);

        if changed {
            self.events.timer_update(key, &snapshot);
        }
        snapshot
    }

    /// 정지. 남은 시간을 전체 시간으로 되돌려 다음 시작이 처음부터 되게 합니다.
    pub async fn stop(&self, key: &TimerKey, default_duration_ms: i64) -> TimerSnapshot {
        let slot = self.store.slot(key);
        let mut guard = slot.lock().await;
        let now = self.clock.now_ms();
        guard.cancel_expiry();

        let record = guard
            .record
            .get_or_insert_with(|| TimerRecord::stopped(&key.question_id, default_duration_ms));
        record.status = TimerStatus::Stop;
        record.end_date_ms = None;
        record.remaining_ms = Some(record.duration_ms);
        record.expired = false;
        tracing::info!(%key, "timer stopped");

        let snapshot = record.snapshot(now);
        drop(guard);

        self.events.timer_update(key, &snapshot);
        snapshot
    }

    /// 제한 시간 변경. 이미 흐른 시간은 그대로 두고 끝나는 시각만 다시 계산합니다.
    /// 이미 받아들인 답안에는 영향이 없습니다.
    pub async fn edit(
        self: &Arc<Self>,
        key: &TimerKey,
        new_duration_ms: i64,
    ) -> Result<TimerSnapshot, AppError> {
        validate_duration(new_duration_ms)?;

        let slot = self.store.slot(key);
        let mut guard = slot.lock().await;
        let now = self.clock.now_ms();
        let generation = guard.cancel_expiry();

        let record = guard
            .record
            .get_or_insert_with(|| TimerRecord::stopped(&key.question_id, new_duration_ms));
        let elapsed = record.elapsed_at(now);
        record.duration_ms = new_duration_ms;

        let reschedule_at = match record.status {
            TimerStatus::Run => {
                let end = now.saturating_add((new_duration_ms - elapsed).max(0));
                record.end_date_ms = Some(end);
                Some(end)
            }
            TimerStatus::Pause => {
                record.remaining_ms = Some((new_duration_ms - elapsed).max(0));
                None
            }
            TimerStatus::Stop => {
                record.remaining_ms = Some(new_duration_ms);
                None
            }
        };
        tracing::info!(%key, duration_ms = new_duration_ms, elapsed_ms = elapsed, "timer duration edited");

        let snapshot = record.snapshot(now);
        if let Some(end_date_ms) = reschedule_at {
            self.schedule_expiry(key, &mut guard, generation, end_date_ms, now);
        }
        drop(guard);

        self.events.timer_update(key, &snapshot);
        Ok(snapshot)
    }

    /// 현재 레코드. 한 번도 제어되지 않은 키면 `None`.
    pub async fn record(&self, key: &TimerKey) -> Option<TimerRecord> {
        self.store.get(key).await
    }

    /// 읽기 전용 스냅샷. 레코드가 없으면 저장하지 않고 기본 정지 상태를 보여 줍니다.
    pub async fn snapshot(&self, key: &TimerKey, default_duration_ms: i64) -> TimerSnapshot {
        let now = self.clock.now_ms();
        self.store
            .get(key)
            .await
            .unwrap_or_else(|| TimerRecord::stopped(&key.question_id, default_duration_ms))
            .snapshot(now)
    }

    /// `end_date + grace` 시점에 깨어나는 만료 작업을 예약합니다.
    /// 호출자는 먼저 `cancel_expiry()`로 얻은 세대 번호를 넘겨야 합니다.
    fn schedule_expiry(
        self: &Arc<Self>,
        key: &TimerKey,
        slot: &mut TimerSlot,
        generation: u64,
        end_date_ms: i64,
        now_ms: i64,
    ) {
        let delay_ms = end_date_ms
            .saturating_add(self.grace_ms)
            .saturating_sub(now_ms)
            .max(0) as u64;
        let service = Arc::clone(self);
        let task_key = key.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            service.expire(task_key, generation).await;
        });
        slot.arm_expiry(handle);
        tracing::debug!(%key, delay_ms, generation, "expiry scheduled");
    }

    async fn expire(&self, key: TimerKey, generation: u64) {
        let Some(slot) = self.store.existing_slot(&key) else {
            return;
        };
        let mut guard = slot.lock().await;
        if guard.generation() != generation {
            tracing::warn!(%key, generation, current = guard.generation(), "stale expiry ignored");
            return;
        }
        guard.clear_fired_expiry();

        let now = self.clock.now_ms();
        let Some(record) = guard.record.as_mut() else {
            return;
        };
        if record.status != TimerStatus::Run {
            return;
        }
        record.status = TimerStatus::Stop;
        record.end_date_ms = None;
        record.remaining_ms = Some(record.duration_ms);
        record.expired = true;
        let snapshot = record.snapshot(now);
        drop(guard);

        tracing::info!(%key, "timer expired");
        self.events.timer_update(&key, &snapshot);
        if let Some(listener) = &self.expirations {
            let _ = listener.send(key);
        }
    }
}

pub fn validate_duration(duration_ms: i64) -> Result<(), AppError> {
    if duration_ms <= 0 || duration_ms > MAX_DURATION_MS {
        return Err(AppError::BadRequest(format!(
            "duration_ms must be between 1 and {}, got {}",
            MAX_DURATION_MS, duration_ms
        )));
    }
    Ok(())
}

fn snapshot_of(slot: &TimerSlot, key: &TimerKey, default_duration_ms: i64, now_ms: i64) -> TimerSnapshot {
    match &slot.record {
        Some(record) => record.snapshot(now_ms),
        None => TimerRecord::stopped(&key.question_id, default_duration_ms).snapshot(now_ms),
    }
}
