//! Operator confirmation gates.
//!
//! The sweep stops twice and waits for the operator: once to block all light
//! before the dark pass, once to switch the light on before the exposure sweep.
//! Declining either gate aborts the sweep. Gates have no timeout.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::hardware::mock::MockCamera;

/// The two points where the sweep waits for the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gate {
    /// Before the dark pass: all light must be blocked
    Dark,
    /// Before the exposure sweep: light must reach the camera
    Light,
}

impl Gate {
    /// Instruction shown to the operator.
    pub fn prompt(&self) -> &'static str {
        match self {
            Gate::Dark => "Prevent all light going to the camera. Press OK when ready",
            Gate::Light => {
                "Now switch on the light, and make sure it can reach the camera. Press OK when ready"
            }
        }
    }

    /// Lower-case name used in logs and reports.
    pub fn name(&self) -> &'static str {
        match self {
            Gate::Dark => "dark",
            Gate::Light => "light",
        }
    }
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Something that can ask the operator to confirm a gate.
#[async_trait]
pub trait OperatorGate: Send + Sync {
    /// Block until the operator answers; `false` means cancel.
    async fn confirm(&self, gate: Gate) -> bool;
}

/// Confirms every gate immediately (unattended runs, `--yes`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoConfirm;

#[async_trait]
impl OperatorGate for AutoConfirm {
    async fn confirm(&self, gate: Gate) -> bool {
        info!(%gate, "auto-confirming gate");
        true
    }
}

/// Asks on the terminal. Enter, `y`, `yes` or `ok` confirm; anything else cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinPrompt;

fn is_affirmative(answer: &str) -> bool {
    matches!(
        answer.trim().to_lowercase().as_str(),
        "" | "y" | "yes" | "ok"
    )
}

#[async_trait]
impl OperatorGate for StdinPrompt {
    async fn confirm(&self, gate: Gate) -> bool {
        let prompt = gate.prompt();
        let answer = tokio::task::spawn_blocking(move || -> std::io::Result<Option<String>> {
            let mut stdout = std::io::stdout().lock();
            write!(stdout, "PTC Tools: {prompt} [Enter=OK, c=Cancel] ")?;
            stdout.flush()?;
            let mut line = String::new();
            let read = std::io::stdin().lock().read_line(&mut line)?;
            Ok((read > 0).then_some(line))
        })
        .await;

        match answer {
            Ok(Ok(Some(line))) => is_affirmative(&line),
            Ok(Ok(None)) => {
                warn!(%gate, "stdin closed, treating as cancel");
                false
            }
            Ok(Err(e)) => {
                warn!(%gate, error = %e, "failed to read answer, treating as cancel");
                false
            }
            Err(e) => {
                warn!(%gate, error = %e, "prompt task failed, treating as cancel");
                false
            }
        }
    }
}

/// Replays fixed answers and records which gates were asked.
///
/// Once the answers run out every further gate is declined.
#[derive(Debug, Default)]
pub struct ScriptedGate {
    answers: Mutex<VecDeque<bool>>,
    asked: Mutex<Vec<Gate>>,
}

impl ScriptedGate {
    /// Gate answering with `answers` in order.
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Gates asked so far.
    pub fn asked(&self) -> Vec<Gate> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl OperatorGate for ScriptedGate {
    async fn confirm(&self, gate: Gate) -> bool {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(gate);
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front())
            .unwrap_or(false)
    }
}

/// Operates the simulated light path once the wrapped gate confirms.
///
/// Lets the mock camera produce genuinely dark frames for the dark pass.
pub struct MockLightGate {
    inner: Arc<dyn OperatorGate>,
    camera: Arc<MockCamera>,
}

impl MockLightGate {
    /// Wrap `inner`, switching `camera`'s light path on confirmation.
    pub fn new(inner: Arc<dyn OperatorGate>, camera: Arc<MockCamera>) -> Self {
        Self { inner, camera }
    }
}

#[async_trait]
impl OperatorGate for MockLightGate {
    async fn confirm(&self, gate: Gate) -> bool {
        let confirmed = self.inner.confirm(gate).await;
        if confirmed {
            self.camera.set_illumination(gate == Gate::Light);
        }
        confirmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affirmative_answers() {
        for yes in ["", "\n", "y", "YES\n", " ok "] {
            assert!(is_affirmative(yes), "{yes:?}");
        }
        for no in ["c", "cancel", "n", "no\n"] {
            assert!(!is_affirmative(no), "{no:?}");
        }
    }

    #[tokio::test]
    async fn scripted_gate_replays_then_declines() {
        let gate = ScriptedGate::new([true, false]);
        assert!(gate.confirm(Gate::Dark).await);
        assert!(!gate.confirm(Gate::Light).await);
        assert!(!gate.confirm(Gate::Dark).await);
        assert_eq!(gate.asked(), vec![Gate::Dark, Gate::Light, Gate::Dark]);
    }

    #[tokio::test]
    async fn mock_light_gate_switches_light_path() {
        let camera = Arc::new(MockCamera::new(2, 2));
        let gate = MockLightGate::new(Arc::new(AutoConfirm), Arc::clone(&camera));

        assert!(camera.is_illuminated());
        assert!(gate.confirm(Gate::Dark).await);
        assert!(!camera.is_illuminated());
        assert!(gate.confirm(Gate::Light).await);
        assert!(camera.is_illuminated());
    }

    #[tokio::test]
    async fn declined_gate_leaves_light_alone() {
        let camera = Arc::new(MockCamera::new(2, 2));
        let gate = MockLightGate::new(Arc::new(ScriptedGate::new([false])), Arc::clone(&camera));
        assert!(!gate.confirm(Gate::Dark).await);
        assert!(camera.is_illuminated());
    }
}
