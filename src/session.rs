// Event loop for one live chat session, independent of the transport.
//
// The web server feeds it frames decoded from a WebSocket; tests feed it
// plain channels. The session owns its conversation outright.

use anyhow::{Context, Result};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::collaborator::{Collaborator, CollaboratorError};
use crate::conversation::{request_reply, take_changes, Conversation};
use crate::render::Templates;

/// Frames sent by the browser.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Submit { text: String },
}

/// Frames sent to the browser. The whole transcript is redrawn each time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Transcript { html: String, pending: bool },
}

pub struct SessionContext {
    pub collaborator: Arc<dyn Collaborator>,
    pub templates: Arc<Templates>,
    pub timeout: Duration,
}

/// Drive one session until `incoming` ends or the peer stops listening.
pub async fn run_session<S>(
    mut incoming: S,
    outgoing: mpsc::Sender<ServerFrame>,
    ctx: SessionContext,
) -> Result<()>
where
    S: Stream<Item = ClientFrame> + Unpin,
{
    let mut conversation = Conversation::with_timeout(ctx.timeout);
    let mut events = conversation.subscribe();
    let (reply_tx, mut reply_rx) = mpsc::channel::<Result<String, CollaboratorError>>(1);
    let mut in_flight: Option<JoinHandle<()>> = None;

    // Initial draw: the seeded greeting.
    if !redraw(&conversation, &ctx.templates, &outgoing).await? {
        return Ok(());
    }

    loop {
        tokio::select! {
            frame = incoming.next() => {
                let Some(ClientFrame::Submit { text }) = frame else {
                    info!("Chat client went away");
                    break;
                };
                if let Some(payload) = conversation.begin(&text) {
                    let collaborator = Arc::clone(&ctx.collaborator);
                    let reply_tx = reply_tx.clone();
                    let timeout = conversation.timeout();
                    in_flight = Some(tokio::spawn(async move {
                        let result = request_reply(collaborator.as_ref(), &payload, timeout).await;
                        // The receiver only disappears when the session is over.
                        let _ = reply_tx.send(result).await;
                    }));
                }
            }
            Some(result) = reply_rx.recv() => {
                in_flight = None;
                conversation.resolve(result);
            }
        }

        if take_changes(&mut events) && !redraw(&conversation, &ctx.templates, &outgoing).await? {
            break;
        }
    }

    if let Some(handle) = in_flight {
        debug!("Aborting chat backend request for closed session");
        handle.abort();
    }
    Ok(())
}

/// Send the current transcript. Returns `false` once the peer is gone.
async fn redraw(
    conversation: &Conversation,
    templates: &Templates,
    outgoing: &mpsc::Sender<ServerFrame>,
) -> Result<bool> {
    let html = templates
        .render_transcript(conversation.transcript(), conversation.is_pending())
        .context("Failed to render transcript")?;
    let frame = ServerFrame::Transcript {
        html,
        pending: conversation.is_pending(),
    };
    if outgoing.send(frame).await.is_err() {
        warn!("Chat client stopped receiving updates");
        return Ok(false);
    }
    Ok(true)
}
