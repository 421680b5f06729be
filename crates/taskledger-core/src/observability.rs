//! Status views for dashboards and smoke checks.

use serde::{Deserialize, Serialize};

use crate::domain::TaskStatus;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub started: usize,
    pub success: usize,
    pub failure: usize,
    pub retry: usize,
    pub revoked: usize,
}

impl StatusCounts {
    pub fn bump(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Started => self.started += 1,
            TaskStatus::Success => self.success += 1,
            TaskStatus::Failure => self.failure += 1,
            TaskStatus::Retry => self.retry += 1,
            TaskStatus::Revoked => self.revoked += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pending + self.started + self.success + self.failure + self.retry + self.revoked
    }
}
