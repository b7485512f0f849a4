//! Shared fixtures for transfer engine integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use holdline_transfer_engine::prelude::*;
use holdline_transfer_engine::AttemptToken;
use parking_lot::Mutex;

/// Provider that records every request and fails according to a script.
#[derive(Default)]
pub struct ScriptedProvider {
    failures: Mutex<VecDeque<ProviderError>>,
    requests: Mutex<Vec<TransferRequest>>,
    cancels: Mutex<Vec<CallId>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `initiate_transfer` call fail with `error`.
    pub fn fail_next(&self, error: ProviderError) {
        self.failures.lock().push_back(error);
    }

    pub fn requests(&self) -> Vec<TransferRequest> {
        self.requests.lock().clone()
    }

    pub fn cancels(&self) -> Vec<CallId> {
        self.cancels.lock().clone()
    }

    /// Cancellations are fire-and-forget; poll until `count` have landed.
    pub async fn wait_for_cancels(&self, count: usize) -> Vec<CallId> {
        for _ in 0..100 {
            if self.cancels.lock().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.cancels()
    }
}

#[async_trait]
impl TelephonyProvider for ScriptedProvider {
    async fn initiate_transfer(&self, request: &TransferRequest) -> std::result::Result<AttemptToken, ProviderError> {
        self.requests.lock().push(request.clone());
        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }
        Ok(AttemptToken(format!("attempt-{}-{}", request.call_id, request.attempt)))
    }

    async fn fetch_call_info(&self, call_id: &CallId) -> std::result::Result<CallInfo, ProviderError> {
        Ok(CallInfo {
            call_id: call_id.clone(),
            status: "in-progress".to_string(),
            from: Some("+15551230000".to_string()),
            to: None,
            duration_secs: Some(42),
        })
    }

    async fn cancel_transfer(&self, call_id: &CallId) -> std::result::Result<(), ProviderError> {
        self.cancels.lock().push(call_id.clone());
        Ok(())
    }
}

pub fn test_config(max_attempts: u32) -> EngineConfig {
    EngineConfig {
        max_attempts,
        status_callback_url: "https://holdline.test/voice/transfer".to_string(),
        caller_id: Some("+15550001111".to_string()),
        ..EngineConfig::default()
    }
}

pub fn create_test_engine(max_attempts: u32) -> (Arc<QueueEngine>, Arc<ScriptedProvider>) {
    let provider = ScriptedProvider::new();
    let engine = QueueEngine::builder()
        .with_config(test_config(max_attempts))
        .with_provider(provider.clone())
        .build()
        .expect("engine should build");
    (engine, provider)
}

pub fn id(s: &str) -> CallId {
    CallId::from(s)
}
