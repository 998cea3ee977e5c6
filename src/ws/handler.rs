//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::runner::{SessionCommand, SessionHandle};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.session))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, session: SessionHandle) {
    // Only used to tell connections apart in the logs
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "New HUD connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        session_id: session.info().session_id,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(conn_id = %conn_id, error = %e, "Failed to send welcome");
        return;
    }

    run_connection(conn_id, ws_sink, ws_stream, session).await;

    info!(conn_id = %conn_id, "HUD connection closed");
}

/// What to do with one parsed client message
#[derive(Debug)]
enum Dispatch {
    /// Forward to the session task
    Command(SessionCommand),
    /// Answer this connection only
    Reply(ServerMsg),
}

fn dispatch(msg: ClientMsg) -> Dispatch {
    match msg {
        ClientMsg::Drive { throttle, steer } => Dispatch::Command(SessionCommand::Drive {
            throttle: throttle.clamp(-1.0, 1.0),
            steer: steer.clamp(-1.0, 1.0),
        }),
        ClientMsg::Restart => Dispatch::Command(SessionCommand::Restart),
        ClientMsg::Ping { t } => Dispatch::Reply(ServerMsg::Pong { t }),
    }
}

/// Parse one text frame; malformed input is answered with an error reply
fn dispatch_text(text: &str) -> Dispatch {
    match serde_json::from_str::<ClientMsg>(text) {
        Ok(msg) => dispatch(msg),
        Err(e) => Dispatch::Reply(ServerMsg::Error {
            code: "bad_message".to_string(),
            message: e.to_string(),
        }),
    }
}

/// Run the connection with read/write split
async fn run_connection(
    conn_id: Uuid,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    session: SessionHandle,
) {
    let rate_limiter = ConnectionRateLimiter::new();
    let mut hud_rx = session.subscribe();
    let (reply_tx, mut reply_rx) = mpsc::channel::<ServerMsg>(16);

    // Writer task: HUD broadcasts and direct replies -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                received = hud_rx.recv() => match received {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(conn_id = %conn_id, lagged_count = n, "Client lagged, skipping {} HUD messages", n);
                        // Continue - don't disconnect for lag
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(conn_id = %conn_id, "HUD channel closed");
                        break;
                    }
                },
                Some(reply) = reply_rx.recv() => reply,
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> session task
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(conn_id = %conn_id, "Rate limited HUD message");
                    continue;
                }

                let dispatched = dispatch_text(&text);
                if let Dispatch::Reply(ServerMsg::Error { message, .. }) = &dispatched {
                    warn!(conn_id = %conn_id, error = %message, "Failed to parse client message");
                }

                match dispatched {
                    Dispatch::Command(command) => {
                        if !session.send(command).await {
                            debug!(conn_id = %conn_id, "Session command channel closed");
                            break;
                        }
                    }
                    Dispatch::Reply(reply) => {
                        if reply_tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
