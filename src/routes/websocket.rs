use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::{
    error::AppError,
    middleware::auth::decode_access_token,
    models::{auth::AuthenticatedUser, realtime::ChangeEvent},
    routes::server_clock,
    services::{
        consoles::ConsoleService,
        realtime::{RealtimeService, CHANGES_CHANNEL},
    },
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct WsQueryParams {
    pub token: String,
}

/// GET /ws?token=…: live console feed. Admins get the admin view, everyone else their own.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsQueryParams>,
) -> Result<Response, AppError> {
    let user = decode_access_token(&params.token, &state.config.jwt_secret)
        .map_err(|_| AppError::auth("unauthorized", "Invalid or expired token"))?;

    info!("WebSocket connected: user={} role={}", user.user_id, user.role);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

/// Whether a change event can alter what this connection is showing.
fn should_refresh(event: Option<&ChangeEvent>, user: &AuthenticatedUser) -> bool {
    match event {
        Some(ChangeEvent::Order { user_id, .. }) => user.is_admin() || *user_id == user.user_id,
        _ => true,
    }
}

async fn build_view(state: &AppState, user: &AuthenticatedUser) -> anyhow::Result<Value> {
    let (date, now) = server_clock();
    let view = if user.is_admin() {
        serde_json::to_value(ConsoleService::admin_view(&state.store, state.policy, date).await?)?
    } else {
        serde_json::to_value(
            ConsoleService::user_view(&state.store, state.policy, user.user_id, date, now).await?,
        )?
    };
    Ok(view)
}

/// Sends the current view unless it matches what the client already has.
/// Returns false once the socket is gone.
async fn push_snapshot(
    sender: &mut SplitSink<WebSocket, Message>,
    state: &AppState,
    user: &AuthenticatedUser,
    reason: &str,
    last_sent: &mut Option<Value>,
) -> bool {
    let view = match build_view(state, user).await {
        Ok(v) => v,
        Err(e) => {
            warn!("WebSocket snapshot failed for {}: {}", user.user_id, e);
            return true;
        }
    };
    if last_sent.as_ref() == Some(&view) {
        return true;
    }

    let msg = json!({ "type": "snapshot", "reason": reason, "role": user.role, "view": view });
    if sender
        .send(Message::Text(msg.to_string().into()))
        .await
        .is_err()
    {
        return false;
    }
    *last_sent = Some(view);
    true
}

async fn handle_socket(socket: WebSocket, state: AppState, user: AuthenticatedUser) {
    let (mut sender, mut receiver) = socket.split();

    // Dedicated pub/sub connection per socket
    let mut pubsub = match state.redis_client.get_async_pubsub().await {
        Ok(c) => c,
        Err(e) => {
            error!("Redis pubsub error: {}", e);
            return;
        }
    };
    if let Err(e) = pubsub.subscribe(CHANGES_CHANNEL).await {
        error!("Redis subscribe error: {}", e);
        return;
    }
    let mut events = pubsub.on_message();

    let period = Duration::from_secs(state.config.reconcile_interval_secs.max(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_sent = None;
    if !push_snapshot(&mut sender, &state, &user, "connect", &mut last_sent).await {
        return;
    }

    loop {
        tokio::select! {
            msg = events.next() => {
                let Some(msg) = msg else {
                    warn!("Change feed closed for {}", user.user_id);
                    break;
                };
                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(_) => continue,
                };
                if !should_refresh(RealtimeService::parse(&payload).as_ref(), &user) {
                    continue;
                }
                if !push_snapshot(&mut sender, &state, &user, "change", &mut last_sent).await {
                    break;
                }
            }
            _ = ticker.tick() => {
                if !push_snapshot(&mut sender, &state, &user, "reconcile", &mut last_sent).await {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) if text.as_str() == "refresh" => {
                        last_sent = None;
                        if !push_snapshot(&mut sender, &state, &user, "refresh", &mut last_sent).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    info!("WebSocket disconnected: user={}", user.user_id);
}
