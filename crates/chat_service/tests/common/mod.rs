//! Shared test doubles for the service tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use branch_manager::ChatMessage;
use chat_service::{ChatService, ProducerError, TextProducer, TextStream};
use futures_util::StreamExt;
use message_store::MemoryNodeStore;

/// Producer that replays a fixed script of deltas and records every
/// context it was handed.
pub struct ScriptedProducer {
    deltas: Vec<Result<String, String>>,
    pub contexts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProducer {
    pub fn new<I, T>(deltas: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            deltas: deltas.into_iter().map(|delta| Ok(delta.into())).collect(),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// Script that fails after emitting the given deltas.
    pub fn failing_after<I, T>(deltas: I, error: &str) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut script: Vec<Result<String, String>> =
            deltas.into_iter().map(|delta| Ok(delta.into())).collect();
        script.push(Err(error.to_string()));
        Self {
            deltas: script,
            contexts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TextProducer for ScriptedProducer {
    async fn produce(&self, context: Vec<ChatMessage>) -> Result<TextStream, ProducerError> {
        self.contexts.lock().unwrap().push(context);
        let items: Vec<Result<String, ProducerError>> = self
            .deltas
            .clone()
            .into_iter()
            .map(|delta| delta.map_err(ProducerError))
            .collect();
        Ok(futures::stream::iter(items).boxed())
    }
}

/// Producer whose connection attempt itself fails.
pub struct OfflineProducer;

#[async_trait]
impl TextProducer for OfflineProducer {
    async fn produce(&self, _context: Vec<ChatMessage>) -> Result<TextStream, ProducerError> {
        Err(ProducerError("model offline".to_string()))
    }
}

pub fn service_with(
    producer: Arc<dyn TextProducer>,
) -> (ChatService<MemoryNodeStore>, Arc<MemoryNodeStore>) {
    let store = Arc::new(MemoryNodeStore::new());
    (ChatService::new(Arc::clone(&store), producer), store)
}
