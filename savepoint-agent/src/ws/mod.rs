//! WebSocket stream of backup notices.
//!
//! Every notice emitted by a job is logged and fanned out to all connected
//! clients as a JSON [`NoticeFrame`]. Clients only listen; inbound messages
//! other than close are ignored.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use savepoint_core::notice::{Audience, Notice, Notifier};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Maximum number of queued notices per subscriber
const BROADCAST_CAPACITY: usize = 256;

/// Wire format of one notice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeFrame {
    pub audience: Audience,
    pub message: String,
    pub notice: Notice,
}

impl From<Notice> for NoticeFrame {
    fn from(notice: Notice) -> Self {
        Self {
            audience: notice.audience(),
            message: notice.to_string(),
            notice,
        }
    }
}

#[derive(Clone)]
pub struct NoticeBroadcaster {
    tx: broadcast::Sender<NoticeFrame>,
}

impl NoticeBroadcaster {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NoticeFrame> {
        self.tx.subscribe()
    }
}

impl Default for NoticeBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for NoticeBroadcaster {
    fn notify(&self, notice: Notice) {
        let frame = NoticeFrame::from(notice);
        match frame.audience {
            Audience::Everyone => info!("{}", frame.message),
            Audience::Operators => info!("[ops] {}", frame.message),
        }

        // No connected clients is the normal case
        if let Ok(count) = self.tx.send(frame) {
            debug!("Broadcast notice to {} client(s)", count);
        }
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<crate::api::AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state.notices))
}

async fn handle_socket(socket: WebSocket, notices: NoticeBroadcaster) {
    info!("Notice subscriber connected");

    let (mut sender, mut receiver) = socket.split();
    let mut rx = notices.subscribe();

    let mut send_task = tokio::spawn(async move {
        loop {
            let frame = match rx.recv().await {
                Ok(frame) => frame,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Notice subscriber lagging, dropped notices");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            match serde_json::to_string(&frame) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => error!("Failed to serialize notice: {:?}", e),
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    info!("Notice subscriber disconnected");
}
