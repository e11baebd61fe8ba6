use serde::{Deserialize, Serialize};

use super::step_data::StepData;

/// Progress through one quest slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestProgress {
    pub(crate) started: bool,
    pub(crate) completed: bool,
    pub(crate) step: u32,
    pub(crate) started_at: i64,
    pub(crate) completed_at: i64,
    pub(crate) data: StepData,
}

impl QuestProgress {
    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    /// Epoch millis of the first start, 0 if never started.
    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    /// Epoch millis of completion, 0 if not completed.
    pub fn completed_at(&self) -> i64 {
        self.completed_at
    }

    pub fn data(&self) -> &StepData {
        &self.data
    }

    pub(crate) fn mark_started(&mut self, now: i64) {
        self.started = true;
        if self.started_at == 0 {
            self.started_at = now;
        }
    }

    pub(crate) fn mark_completed(&mut self, now: i64) {
        self.mark_started(now);
        self.completed = true;
        if self.completed_at == 0 {
            self.completed_at = now;
        }
    }

    pub(crate) fn increment_step(&mut self) {
        self.step = self.step.saturating_add(1);
    }

    pub(crate) fn data_mut(&mut self) -> &mut StepData {
        &mut self.data
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
