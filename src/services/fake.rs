//! Recording `ServiceControl` for unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::error::{CommandErrorKind, DeployError, DeployResult};

use super::traits::ServiceControl;

/// Records every call. `is_active` answers from a queue (an empty queue
/// answers `false`); actions listed in `failing` return an error.
#[derive(Default)]
pub(crate) struct FakeControl {
    pub calls: RefCell<Vec<String>>,
    pub answers: RefCell<VecDeque<bool>>,
    pub failing: Vec<&'static str>,
}

impl FakeControl {
    pub fn answering(answers: &[bool]) -> Self {
        Self {
            answers: RefCell::new(answers.iter().copied().collect()),
            ..Default::default()
        }
    }

    pub fn failing(mut self, action: &'static str) -> Self {
        self.failing.push(action);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn record(&self, action: &'static str, name: &str) -> DeployResult<()> {
        self.calls.borrow_mut().push(format!("{} {}", action, name).trim_end().to_string());
        if self.failing.contains(&action) {
            return Err(DeployError::Command {
                kind: CommandErrorKind::ExecutionFailed {
                    message: format!("{} failed", action),
                },
            });
        }
        Ok(())
    }
}

impl ServiceControl for FakeControl {
    fn start(&self, name: &str) -> DeployResult<()> {
        self.record("start", name)
    }

    fn stop(&self, name: &str) -> DeployResult<()> {
        self.record("stop", name)
    }

    fn restart(&self, name: &str) -> DeployResult<()> {
        self.record("restart", name)
    }

    fn enable(&self, name: &str) -> DeployResult<()> {
        self.record("enable", name)
    }

    fn is_active(&self, name: &str) -> DeployResult<bool> {
        self.record("is-active", name)?;
        Ok(self.answers.borrow_mut().pop_front().unwrap_or(false))
    }

    fn reload_definitions(&self) -> DeployResult<()> {
        self.record("daemon-reload", "")
    }

    fn ensure_available(&self) -> DeployResult<()> {
        Ok(())
    }
}
