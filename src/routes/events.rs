//! # 실시간 이벤트 스트림 (WebSocket)
//!
//! `GET /api/v1/sessions/{code}/events/{room}?token=...`
//!
//! | room | 누가 | 받는 것 |
//! |---|---|---|
//! | `dashboard` | 세션을 만든 교사 | 타이머, 실시간 순위, 답안 분포, deferred 타이머 전부 |
//! | `projection` | 교실 공개 화면 | 타이머, 스냅샷 순위 |
//! | `players` | 입장한 학생 | 타이머, 스냅샷 순위, 자기 deferred 타이머 |
//!
//! 브라우저는 WebSocket 핸드셰이크에 헤더를 붙일 수 없어서 토큰을 쿼리로 받습니다.
//! 학생의 연결이 끊기면 참가자를 오프라인으로 표시합니다 (점수는 유지).

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use tokio::sync::broadcast::{self, error::RecvError};

use crate::{
    error::AppError,
    middleware::auth::AuthUser,
    models::ServerEvent,
    routes::AppState,
    services::broadcast::Room,
};

pub async fn subscribe_events(
    State(state): State<AppState>,
    user: AuthUser,
    Path((code, room)): Path<(String, String)>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let room: Room = room.parse().map_err(AppError::BadRequest)?;
    let session = state.engine.session(&code)?;

    if room == Room::Dashboard && !session.is_initiator(&user.user_id) {
        return Err(AppError::Forbidden(
            "the dashboard is for the session initiator".to_string(),
        ));
    }

    let events = state.engine.events();
    let shared = events.subscribe(&code, room.clone());
    let personal = (room == Room::Players)
        .then(|| events.subscribe(&code, Room::Player(user.user_id.clone())));

    // 공개 화면과 학생은 연결 즉시 마지막 스냅샷을 받아 빈 화면으로 시작하지 않게 합니다.
    let greeting = match room {
        Room::Dashboard => None,
        _ => Some(ServerEvent::LeaderboardUpdate {
            entries: state.engine.leaderboard_snapshot(&code).await?.entries,
        }),
    };

    tracing::info!(session = %code, %room, user_id = %user.user_id, "event stream opened");
    Ok(ws.on_upgrade(move |socket| {
        stream_events(socket, state, code, room, user, shared, personal, greeting)
    }))
}

#[allow(clippy::too_many_arguments)]
async fn stream_events(
    mut socket: WebSocket,
    state: AppState,
    code: String,
    room: Room,
    user: AuthUser,
    mut shared: broadcast::Receiver<ServerEvent>,
    mut personal: Option<broadcast::Receiver<ServerEvent>>,
    greeting: Option<ServerEvent>,
) {
    if let Some(event) = greeting {
        if send_event(&mut socket, &event).await.is_err() {
            return;
        }
    }

    loop {
        let received = tokio::select! {
            event = shared.recv() => event,
            event = recv_personal(&mut personal) => event,
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // 클라이언트 → 서버 메시지는 쓰지 않습니다. 제어는 REST로 합니다.
                Some(Ok(_)) => continue,
            },
        };

        match received {
            Ok(event) => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(session = %code, %room, skipped, "slow subscriber skipped events");
            }
            Err(RecvError::Closed) => break,
        }
    }

    tracing::info!(session = %code, %room, user_id = %user.user_id, "event stream closed");
    if room == Room::Players {
        // 세션이 이미 끝났거나 입장하지 않은 사용자면 할 일이 없습니다.
        let _ = state.engine.disconnect(&code, &user.user_id).await;
    }
}

/// 개인 방이 없으면 영원히 기다립니다 (`select!`에서 이 가지가 선택되지 않음).
async fn recv_personal(
    personal: &mut Option<broadcast::Receiver<ServerEvent>>,
) -> Result<ServerEvent, RecvError> {
    match personal {
        Some(receiver) => receiver.recv().await,
        None => std::future::pending().await,
    }
}

async fn send_event(socket: &mut WebSocket, event: &ServerEvent) -> Result<(), axum::Error> {
    let text = serde_json::to_string(event).map_err(axum::Error::new)?;
    socket.send(Message::Text(text.into())).await
}
