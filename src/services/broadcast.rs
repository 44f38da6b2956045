//! # 브로드캐스트 / 스냅샷 계층
//!
//! 세션마다 세 개의 논리적인 방(room)으로 이벤트를 내보냅니다:
//! - `Dashboard`: 교사 대시보드 — 실시간 순위, 답안 분포까지 모두 받음
//! - `Projection`: 교실 앞 공개 화면 — 순위는 **스냅샷**만 받음
//! - `Players`: 학생 화면 — 타이머와 스냅샷 순위
//!
//! deferred 시도의 타이머는 그 학생의 개인 방(`Player(user_id)`)과 대시보드로만 갑니다.
//!
//! ## 스냅샷 분리
//! 공개 화면을 실시간으로 지켜보는 학생이 점수 변화로 "누가 방금 맞혔는지"
//! 알아낼 수 없어야 합니다. 그래서 `Projection`/`Players`로 가는 순위는
//! `LeaderboardSnapshot` 타입으로만 받을 수 있게 메서드를 나눴습니다.

use std::fmt;
use std::str::FromStr;

use dashmap::DashMap;
use tokio::sync::broadcast;

use super::timer_key::TimerKey;
use crate::models::{LeaderboardEntry, LeaderboardSnapshot, ServerEvent, TimerSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    Dashboard,
    Projection,
    Players,
    /// deferred 학생 한 명의 개인 방
    Player(String),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Dashboard => write!(f, "dashboard"),
            Room::Projection => write!(f, "projection"),
            Room::Players => write!(f, "players"),
            Room::Player(user_id) => write!(f, "player:{}", user_id),
        }
    }
}

/// URL 경로의 방 이름. 개인 방은 토큰으로 정해지므로 여기서 파싱하지 않습니다.
impl FromStr for Room {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "dashboard" => Ok(Room::Dashboard),
            "projection" => Ok(Room::Projection),
            "players" | "player" => Ok(Room::Players),
            other => Err(format!("unknown room '{}'", other)),
        }
    }
}

#[derive(Debug)]
pub struct Broadcaster {
    channels: DashMap<(String, Room), broadcast::Sender<ServerEvent>>,
    capacity: usize,
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, session_code: &str, room: Room) -> broadcast::Sender<ServerEvent> {
        self.channels
            .entry((session_code.to_string(), room))
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    pub fn subscribe(&self, session_code: &str, room: Room) -> broadcast::Receiver<ServerEvent> {
        self.sender(session_code, room).subscribe()
    }

    /// 이벤트를 방에 보내고, 받은 구독자 수를 돌려줍니다.
    /// 구독자가 없는 것은 정상이므로 0을 돌려줄 뿐 에러로 취급하지 않습니다.
    pub fn publish(&self, session_code: &str, room: Room, event: ServerEvent) -> usize {
        let receivers = self.sender(session_code, room.clone()).send(event).unwrap_or(0);
        tracing::debug!(session_code, %room, receivers, "event published");
        receivers
    }

    /// 같은 타이머 레코드에서 만든 하나의 스냅샷을 모든 대상 방에 보냅니다.
    pub fn timer_update(&self, key: &TimerKey, snapshot: &TimerSnapshot) {
        let rooms = match &key.attempt {
            None => vec![Room::Dashboard, Room::Projection, Room::Players],
            Some(scope) => vec![Room::Dashboard, Room::Player(scope.user_id.clone())],
        };
        for room in rooms {
            self.publish(
                &key.session_code,
                room,
                ServerEvent::TimerUpdate(snapshot.clone()),
            );
        }
    }

    /// 실시간 순위 — 교사 대시보드 전용
    pub fn live_leaderboard(&self, session_code: &str, entries: Vec<LeaderboardEntry>) {
        self.publish(
            session_code,
            Room::Dashboard,
            ServerEvent::LeaderboardUpdate { entries },
        );
    }

    /// 스냅샷 순위 — 공개 화면과 학생 화면
    pub fn snapshot_leaderboard(&self, session_code: &str, snapshot: &LeaderboardSnapshot) {
        for room in [Room::Projection, Room::Players] {
            self.publish(
                session_code,
                room,
                ServerEvent::LeaderboardUpdate {
                    entries: snapshot.entries.clone(),
                },
            );
        }
    }

    pub fn answer_stats(&self, session_code: &str, question_id: &str, distribution: Vec<u32>) {
        self.publish(
            session_code,
            Room::Dashboard,
            ServerEvent::AnswerStatsUpdate {
                question_id: question_id.to_string(),
                distribution,
            },
        );
    }

    /// 세션 종료 시 채널을 모두 닫습니다. 구독자는 `RecvError::Closed`를 받습니다.
    pub fn close_session(&self, session_code: &str) {
        self.channels.retain(|(code, _), _| code != session_code);
    }
}
