// SPDX-License-Identifier: Apache-2.0
//! In-memory mock engine for scheduler and lifecycle tests.
//!
//! The mock records every `configure` and `execute` call in a shared log so
//! tests can assert execution order and the variant-mapping policy without a
//! real engine library.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::backend::{BackendConfig, BackendLoader, SimulatorBackend};
use crate::error::{Result, SimError};

/// Shared record of the calls a [`MockBackend`] has received.
#[derive(Debug, Default)]
pub struct CallLog {
    pub configures: Vec<BackendConfig>,
    /// Program text of each `execute` call, in call order.
    pub executes: Vec<String>,
}

#[derive(Debug, Clone)]
enum MockMode {
    /// Produce a single all-ones bitstring of the configured qubit width,
    /// with the shot count read back out of the config blob.
    AllOnes,
    /// Return a fixed result text verbatim.
    Canned(String),
    /// Fail every `execute`.
    Failing,
}

/// A deterministic in-memory engine.
#[derive(Debug, Clone)]
pub struct MockBackend {
    mode: MockMode,
    latency: Option<Duration>,
    configured: Option<BackendConfig>,
    log: Arc<Mutex<CallLog>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            mode: MockMode::AllOnes,
            latency: None,
            configured: None,
            log: Arc::new(Mutex::new(CallLog::default())),
        }
    }

    /// Return `text` verbatim from every `execute`.
    pub fn with_response(text: impl Into<String>) -> Self {
        Self {
            mode: MockMode::Canned(text.into()),
            ..Self::new()
        }
    }

    /// Fail every `execute`.
    pub fn failing() -> Self {
        Self {
            mode: MockMode::Failing,
            ..Self::new()
        }
    }

    /// Sleep for `latency` inside each `execute`, simulating a slow engine.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Handle on the shared call log; survives the backend being moved into
    /// the worker thread.
    pub fn call_log(&self) -> Arc<Mutex<CallLog>> {
        Arc::clone(&self.log)
    }

    fn all_ones_response(&self, config_json: &str) -> String {
        let width = self.configured.as_ref().map_or(0, |c| c.num_qubits);
        let shots = serde_json::from_str::<serde_json::Value>(config_json)
            .ok()
            .and_then(|v| v.get("shots").and_then(serde_json::Value::as_u64))
            .unwrap_or(0);
        let bits = "1".repeat(width);
        format!("{{\"time_taken\": 0.0, \"counts\": {{\"{bits}\": {shots}}}}}")
    }
}

impl SimulatorBackend for MockBackend {
    fn configure(&mut self, config: &BackendConfig) -> Result<()> {
        self.log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .configures
            .push(config.clone());
        self.configured = Some(config.clone());
        Ok(())
    }

    fn execute(&mut self, program: &str, config_json: &str) -> Result<String> {
        self.log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .executes
            .push(program.to_string());

        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }

        match &self.mode {
            MockMode::AllOnes => Ok(self.all_ones_response(config_json)),
            MockMode::Canned(text) => Ok(text.clone()),
            MockMode::Failing => Err(SimError::Execute("injected mock failure".into())),
        }
    }
}

/// Loader that hands out clones of a template [`MockBackend`], or fails.
#[derive(Debug)]
pub struct MockLoader {
    template: Option<MockBackend>,
}

impl MockLoader {
    pub fn new(backend: MockBackend) -> Self {
        Self {
            template: Some(backend),
        }
    }

    /// Simulate an engine that cannot be loaded.
    pub fn failing() -> Self {
        Self { template: None }
    }
}

impl BackendLoader for MockLoader {
    fn load(&self) -> Result<Box<dyn SimulatorBackend>> {
        match &self.template {
            Some(backend) => Ok(Box::new(backend.clone())),
            None => Err(SimError::LoadFailed {
                path: "<mock>".into(),
                cause: "injected load failure".into(),
            }),
        }
    }
}
