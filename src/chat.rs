// Interactive chat in the terminal: one line in, one reply out.
//
// Runs the same loop shape as the web session: input and the backend reply
// are awaited together, and the screen is redrawn from the transcript.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::collaborator::{Collaborator, CollaboratorError};
use crate::constants::{BUSY_NOTICE, TYPING_INDICATOR};
use crate::conversation::{request_reply, take_changes, Conversation};
use crate::render::render_terminal_line;

/// Lines that end the session instead of being sent.
const EXIT_WORDS: [&str; 2] = ["exit", "quit"];

/// How much of the conversation is already on screen.
#[derive(Default)]
struct Screen {
    printed: usize,
    showed_typing: bool,
}

impl Screen {
    /// Write every message not printed yet, then the typing indicator if a
    /// reply has just become pending.
    async fn draw<W>(&mut self, conversation: &Conversation, output: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let messages = conversation.transcript().messages();
        for message in &messages[self.printed..] {
            write_line(output, &render_terminal_line(message)).await?;
        }
        self.printed = messages.len();

        let pending = conversation.is_pending();
        if pending && !self.showed_typing {
            write_line(output, TYPING_INDICATOR).await?;
        }
        self.showed_typing = pending;
        Ok(())
    }
}

/// Run a chat session reading user lines from `input` and drawing the
/// transcript on `output`. Lines typed while a reply is pending are not sent.
/// Ends on `exit`, `quit` or end of input (after any pending reply has
/// arrived), and hands the writer back.
pub async fn run_terminal_chat<R, W>(
    input: R,
    mut output: W,
    collaborator: Arc<dyn Collaborator>,
    timeout: Duration,
) -> Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("Starting terminal chat session...");
    let mut conversation = Conversation::with_timeout(timeout);
    let mut events = conversation.subscribe();
    let mut screen = Screen::default();
    let (reply_tx, mut reply_rx) = mpsc::channel::<Result<String, CollaboratorError>>(1);
    let mut in_flight: Option<JoinHandle<()>> = None;
    let mut closing = false;

    screen.draw(&conversation, &mut output).await?;

    let mut lines = input.lines();
    loop {
        tokio::select! {
            line = lines.next_line(), if !closing => {
                let line = line.context("Failed to read from input")?;
                let Some(line) = line.filter(|l| !EXIT_WORDS.contains(&l.trim().to_lowercase().as_str())) else {
                    closing = true;
                    if !conversation.is_pending() {
                        break;
                    }
                    debug!("Waiting for the pending reply before closing");
                    continue;
                };
                if conversation.is_pending() {
                    if !line.trim().is_empty() {
                        write_line(&mut output, BUSY_NOTICE).await?;
                    }
                    continue;
                }
                conversation.set_input(line);
                let text = conversation.input().to_string();
                if let Some(payload) = conversation.begin(&text) {
                    let collaborator = Arc::clone(&collaborator);
                    let reply_tx = reply_tx.clone();
                    in_flight = Some(tokio::spawn(async move {
                        let result = request_reply(collaborator.as_ref(), &payload, timeout).await;
                        let _ = reply_tx.send(result).await;
                    }));
                }
            }
            Some(result) = reply_rx.recv() => {
                in_flight = None;
                conversation.resolve(result);
            }
        }

        if take_changes(&mut events) {
            screen.draw(&conversation, &mut output).await?;
        }
        if closing && !conversation.is_pending() {
            break;
        }
    }

    if let Some(handle) = in_flight {
        handle.abort();
    }
    output.flush().await.context("Failed to flush output")?;
    info!("Terminal chat session finished.");
    Ok(output)
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> Result<()> {
    output
        .write_all(format!("{}\n", line).as_bytes())
        .await
        .context("Failed to write to output")?;
    output.flush().await.context("Failed to flush output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{FALLBACK_REPLY, GREETING};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Collaborator for Echo {
        async fn reply(&self, message: &str) -> Result<String, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("You said: {}", message))
        }
    }

    struct Down;

    #[async_trait]
    impl Collaborator for Down {
        async fn reply(&self, _message: &str) -> Result<String, CollaboratorError> {
            Err(CollaboratorError::Malformed("backend down".to_string()))
        }
    }

    /// Echoes, but only once the gate is opened.
    #[derive(Default)]
    struct Gated {
        gate: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Collaborator for Gated {
        async fn reply(&self, message: &str) -> Result<String, CollaboratorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(format!("You said: {}", message))
        }
    }

    async fn run(script: &str, collaborator: Arc<dyn Collaborator>) -> Vec<String> {
        let output = run_terminal_chat(script.as_bytes(), Vec::new(), collaborator, Duration::from_secs(5))
            .await
            .unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Read output lines until one satisfies `done`, returning all of them.
    async fn read_until<R>(lines: &mut tokio::io::Lines<R>, done: impl Fn(&str) -> bool) -> Vec<String>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut seen = Vec::new();
        loop {
            let line = tokio::time::timeout(Duration::from_secs(2), lines.next_line())
                .await
                .expect("chat did not print in time")
                .unwrap()
                .expect("chat output closed");
            let finished = done(&line);
            seen.push(line);
            if finished {
                return seen;
            }
        }
    }

    #[tokio::test]
    async fn test_greeting_only_on_empty_input() {
        let lines = run("", Arc::new(Echo::default())).await;

        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with(&format!("AI Therapist: {}", GREETING)));
    }

    #[tokio::test]
    async fn test_exchange_is_printed_in_order() {
        let echo = Arc::new(Echo::default());
        let lines = run("I feel anxious\n", echo.clone()).await;

        assert_eq!(lines.len(), 4);
        assert!(lines[1].ends_with("You: I feel anxious"));
        assert_eq!(lines[2], TYPING_INDICATOR);
        assert!(lines[3].ends_with("AI Therapist: You said: I feel anxious"));
        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_lines_are_skipped() {
        let echo = Arc::new(Echo::default());
        let lines = run("\n   \nhello\n", echo.clone()).await;

        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
        assert_eq!(lines.len(), 4);
    }

    #[tokio::test]
    async fn test_exit_word_stops_session_after_pending_reply() {
        let echo = Arc::new(Echo::default());
        let lines = run("first\nQuit\nnever sent\n", echo.clone()).await;

        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
        assert!(lines.last().unwrap().ends_with("AI Therapist: You said: first"));
        assert!(!lines.iter().any(|l| l.contains("never sent")));
    }

    #[tokio::test]
    async fn test_failure_prints_fallback() {
        let lines = run("hello\n", Arc::new(Down)).await;

        assert!(lines.last().unwrap().ends_with(&format!("AI Therapist: {}", FALLBACK_REPLY)));
    }

    #[tokio::test]
    async fn test_long_session_prints_every_message() {
        let (mut user, chat_in) = tokio::io::duplex(4096);
        let (chat_out, screen) = tokio::io::duplex(64 * 1024);
        let echo = Arc::new(Echo::default());
        let session = tokio::spawn(run_terminal_chat(
            BufReader::new(chat_in),
            chat_out,
            echo.clone(),
            Duration::from_secs(5),
        ));
        let mut screen = BufReader::new(screen).lines();

        let mut printed = read_until(&mut screen, |l| l.contains(GREETING)).await;
        for i in 0..40 {
            user.write_all(format!("msg{}\n", i).as_bytes()).await.unwrap();
            let reply = format!("AI Therapist: You said: msg{}", i);
            printed.extend(read_until(&mut screen, |l| l.ends_with(&reply)).await);
        }
        user.write_all(b"exit\n").await.unwrap();
        session.await.unwrap().unwrap();

        assert_eq!(printed.len(), 1 + 40 * 3);
        for i in 0..40 {
            let user_line = format!("You: msg{}", i);
            assert_eq!(printed.iter().filter(|l| l.ends_with(&user_line)).count(), 1);
        }
        assert_eq!(echo.calls.load(Ordering::SeqCst), 40);
    }

    #[tokio::test]
    async fn test_lines_typed_while_pending_are_not_sent() {
        let (mut user, chat_in) = tokio::io::duplex(4096);
        let (chat_out, screen) = tokio::io::duplex(64 * 1024);
        let gated = Arc::new(Gated::default());
        let session = tokio::spawn(run_terminal_chat(
            BufReader::new(chat_in),
            chat_out,
            gated.clone(),
            Duration::from_secs(5),
        ));
        let mut screen = BufReader::new(screen).lines();
        read_until(&mut screen, |l| l.contains(GREETING)).await;

        user.write_all(b"first\n").await.unwrap();
        read_until(&mut screen, |l| l == TYPING_INDICATOR).await;
        user.write_all(b"second\n").await.unwrap();
        read_until(&mut screen, |l| l == BUSY_NOTICE).await;

        gated.gate.notify_one();
        let after = read_until(&mut screen, |l| l.contains("You said:")).await;
        user.write_all(b"exit\n").await.unwrap();
        session.await.unwrap().unwrap();

        assert!(after.last().unwrap().ends_with("AI Therapist: You said: first"));
        assert!(!after.iter().any(|l| l.contains("second")));
        assert_eq!(gated.calls.load(Ordering::SeqCst), 1);
    }
}
