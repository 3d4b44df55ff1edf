//! Abstract LLM host interface
//!
//! The host owns the chat state, the prompt slots, and macro substitution.
//! This crate never assumes a concrete host — it only consumes this trait,
//! so any conversational front-end can plug in an implementation without
//! touching the retrieval pipeline.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::ChatMessage;

/// A named prompt slot's current contents, as read back for injection
/// verification.
#[derive(Debug, Clone, Default)]
pub struct PromptSlot {
    pub value: String,
    pub position: i32,
    pub depth: i32,
}

/// The capabilities the retrieval pipeline and sync engine consume from the
/// conversational host. Abstract by design: the pipeline never throws
/// to the host, so implementations should prefer returning `Ok(None)`
/// / empty collections over errors where the distinction doesn't matter.
#[async_trait]
pub trait ChatHost: Send + Sync {
    /// The id of the currently active chat, if any.
    async fn current_chat_id(&self) -> Option<String>;

    /// A stable identifier for the chat's content (e.g. a content-addressed
    /// UUID), used to build the chat's `CollectionId`.
    async fn chat_integrity_id(&self) -> Option<String>;

    /// The live, ordered message list for the current chat.
    async fn chat_messages(&self) -> Vec<ChatMessage>;

    /// Whether a generation is currently in progress (used by the sync
    /// engine to back off).
    async fn send_pressed(&self) -> bool;

    /// Write `text` into the named prompt slot.
    async fn set_prompt(&self, tag: &str, text: &str, position: i32, depth: i32) -> Result<()>;

    /// Read back a named prompt slot, for injection verification.
    async fn get_prompt(&self, tag: &str) -> Result<Option<PromptSlot>>;

    /// Expand host macros (`{{user}}`, `{{char}}`, etc.) in `text`.
    async fn substitute_macros(&self, text: &str) -> String;
}

/// Deterministic, dependency-free reference host used by tests, the demo
/// binary, and the scenarios.
#[derive(Default)]
pub struct InMemoryChatHost {
    chat_id: Mutex<Option<String>>,
    messages: Mutex<Vec<ChatMessage>>,
    send_pressed: Mutex<bool>,
    prompts: Mutex<HashMap<String, PromptSlot>>,
}

impl InMemoryChatHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chat_id(self, id: impl Into<String>) -> Self {
        *self.chat_id.lock().unwrap() = Some(id.into());
        self
    }

    pub fn with_messages(self, messages: Vec<ChatMessage>) -> Self {
        *self.messages.lock().unwrap() = messages;
        self
    }

    pub fn set_send_pressed(&self, pressed: bool) {
        *self.send_pressed.lock().unwrap() = pressed;
    }
}

#[async_trait]
impl ChatHost for InMemoryChatHost {
    async fn current_chat_id(&self) -> Option<String> {
        self.chat_id.lock().unwrap().clone()
    }

    async fn chat_integrity_id(&self) -> Option<String> {
        self.chat_id.lock().unwrap().clone()
    }

    async fn chat_messages(&self) -> Vec<ChatMessage> {
        self.messages.lock().unwrap().clone()
    }

    async fn send_pressed(&self) -> bool {
        *self.send_pressed.lock().unwrap()
    }

    async fn set_prompt(&self, tag: &str, text: &str, position: i32, depth: i32) -> Result<()> {
        self.prompts.lock().unwrap().insert(
            tag.to_string(),
            PromptSlot {
                value: text.to_string(),
                position,
                depth,
            },
        );
        Ok(())
    }

    async fn get_prompt(&self, tag: &str) -> Result<Option<PromptSlot>> {
        Ok(self.prompts.lock().unwrap().get(tag).map(|s| PromptSlot {
                    value: s.value.clone(),
                    position: s.position,
                    depth: s.depth,
                }))
    }

    async fn substitute_macros(&self, text: &str) -> String {
        text.replace("{{user}}", "User").replace("{{char}}", "Character")
    }
}
