use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::{ChatBackend, ChatRequest, Frame, StreamEvent};
use crate::models::message::{STOPPED_MESSAGE, STREAM_ERROR_MESSAGE};
use crate::models::Message;
use crate::services::conversation::ConversationManager;
use crate::services::settings::AppSettings;
use crate::services::typing::Typewriter;

/// What a view needs to know while a turn is in flight.
#[derive(Debug)]
pub enum ChatUpdate<'a> {
    /// The placeholder bot message was created.
    Started(&'a Message),
    /// The message changed or the typewriter revealed more text.
    Progress {
        message: &'a Message,
        displayed: &'a str,
    },
    Finished(&'a Message),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnEnd {
    Completed,
    Failed,
    Stopped,
}

/// Apply one stream frame to the bot message being built.
pub fn apply_frame(message: &mut Message, frame: Frame) -> FrameOutcome {
    if frame.carries_content() {
        message.is_thinking = false;
    }
    match frame {
        Frame::Text(text) => message.content = text,
        Frame::Table(table) => message.table = Some(table),
        Frame::Chart(chart) => message.chart = Some(chart),
        Frame::Evidence(evidence) => message.evidence = Some(evidence),
        Frame::Thinking(_) => message.is_thinking = true,
        Frame::Error(error) => {
            tracing::error!("Server reported a stream error: {}", error);
            return FrameOutcome::Failed;
        }
        Frame::Done => {
            message.finish();
            return FrameOutcome::Completed;
        }
    }
    FrameOutcome::Continue
}

/// Drives one question/answer turn: stores the user message, streams the
/// answer into a placeholder and animates its text.
pub struct ChatPipeline {
    backend: Arc<dyn ChatBackend>,
    settings: AppSettings,
}

impl ChatPipeline {
    pub fn new(backend: Arc<dyn ChatBackend>, settings: AppSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: AppSettings) {
        self.settings = settings;
    }

    /// Run a full turn and return the final bot message.
    pub async fn send_message<F>(
        &self,
        manager: &mut ConversationManager,
        text: &str,
        cancel: CancellationToken,
        mut on_update: F,
    ) -> Result<Message>
    where
        F: FnMut(ChatUpdate<'_>),
    {
        let text = text.trim();
        if text.is_empty() {
            bail!("Message is empty");
        }

        let request = ChatRequest::new(text, manager.messages());

        manager.add_message(Message::user("", text)).await;

        let mut working = manager.add_message(Message::placeholder("")).await;
        on_update(ChatUpdate::Started(&working));

        // One animator per turn; the previous turn's ticker is gone with its loop.
        let mut typewriter = Typewriter::new(self.settings.typing_enabled);
        typewriter.reset();

        let (tx, mut rx) = mpsc::channel::<StreamEvent>(64);
        let backend = self.backend.clone();
        let stream_handle = tokio::spawn(async move {
            if let Err(e) = backend.stream_chat(request, tx.clone()).await {
                let _ = tx.send(StreamEvent::Failed(e.to_string())).await;
            }
        });

        let mut ticker = tokio::time::interval(self.settings.typing_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let end = loop {
            tokio::select! {
                _ = cancel.cancelled() => break TurnEnd::Stopped,
                event = rx.recv() => {
                    match event {
                        Some(StreamEvent::Frame(frame)) => {
                            match apply_frame(&mut working, frame) {
                                FrameOutcome::Continue => {
                                    manager.patch_message(&working);
                                    typewriter.update(&working.content, working.is_streaming);
                                    on_update(ChatUpdate::Progress {
                                        message: &working,
                                        displayed: typewriter.displayed(),
                                    });
                                }
                                FrameOutcome::Completed => break TurnEnd::Completed,
                                FrameOutcome::Failed => break TurnEnd::Failed,
                            }
                        }
                        Some(StreamEvent::Failed(error)) => {
                            tracing::error!("Chat stream failed: {}", error);
                            break TurnEnd::Failed;
                        }
                        // Reader finished without a terminal event.
                        None => break TurnEnd::Completed,
                    }
                }
                _ = ticker.tick(), if typewriter.is_behind() => {
                    if typewriter.tick() {
                        on_update(ChatUpdate::Progress {
                            message: &working,
                            displayed: typewriter.displayed(),
                        });
                    }
                }
            }
        };

        stream_handle.abort();

        match end {
            TurnEnd::Completed => working.finish(),
            TurnEnd::Failed => working.fail(STREAM_ERROR_MESSAGE),
            TurnEnd::Stopped => {
                let has_payload = working.table.is_some()
                    || working.chart.is_some()
                    || working.evidence.is_some();
                if working.content.trim().is_empty() && !has_payload {
                    working.fail(STOPPED_MESSAGE);
                } else {
                    working.finish();
                }
            }
        }

        typewriter.update(&working.content, false);
        on_update(ChatUpdate::Progress {
            message: &working,
            displayed: typewriter.displayed(),
        });

        if let Err(e) = manager.update_message(&working).await {
            tracing::error!("Failed to save bot message: {}", e);
        }
        on_update(ChatUpdate::Finished(&working));

        Ok(working)
    }
}
