//! Lifecycle of one bulk run

use serde::Serialize;

/// Bulk run phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkPhase {
    /// Nothing started yet
    Idle,

    /// Sites are being processed
    Running,

    /// Every site has been visited
    Complete,
}

/// Bulk run event
#[derive(Debug, Clone)]
pub enum BulkEvent {
    /// Start event recorded, first site about to run
    Start { sites: usize },

    /// One site finished (successfully or not)
    SiteDone,

    /// Completion event recorded
    Finish,
}

/// Tracks where a bulk run is and how many sites it has visited
#[derive(Debug, Clone)]
pub struct BulkPhaseFsm {
    phase: BulkPhase,
    total: usize,
    done: usize,
}

impl BulkPhaseFsm {
    pub fn new() -> Self {
        Self {
            phase: BulkPhase::Idle,
            total: 0,
            done: 0,
        }
    }

    pub fn phase(&self) -> BulkPhase {
        self.phase
    }

    /// Sites visited so far and the total
    pub fn progress(&self) -> (usize, usize) {
        (self.done, self.total)
    }

    /// Process an event and transition
    pub fn process(&mut self, event: BulkEvent) -> Result<(), String> {
        let next = match (self.phase, &event) {
            (BulkPhase::Idle, BulkEvent::Start { sites }) => {
                self.total = *sites;
                self.done = 0;
                BulkPhase::Running
            }
            (BulkPhase::Running, BulkEvent::SiteDone) if self.done < self.total => {
                self.done += 1;
                BulkPhase::Running
            }
            (BulkPhase::Running, BulkEvent::Finish) if self.done == self.total => {
                BulkPhase::Complete
            }
            _ => {
                return Err(format!(
                    "Invalid bulk transition from {:?} on {:?} ({}/{})",
                    self.phase, event, self.done, self.total
                ));
            }
        };

        self.phase = next;
        Ok(())
    }
}

impl Default for BulkPhaseFsm {
    fn default() -> Self {
        Self::new()
    }
}
