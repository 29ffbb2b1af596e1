use std::collections::BTreeMap;
use std::collections::VecDeque;

use super::SelectionPolicy;
use crate::config::SchedulingPolicy;
use crate::process::Process;
use crate::Pid;

/// Fixed time slice over a FIFO ready queue.
///
/// A process whose slice ran out goes back to the tail of the ready queue, behind the
/// arrivals admitted on the same tick.
#[derive(Debug, Clone, Copy)]
pub struct RoundRobin {
    quantum: u32,
}

impl RoundRobin {
    pub fn new(quantum: u32) -> Self {
        Self {
            quantum: quantum.max(1),
        }
    }

    pub fn quantum(&self) -> u32 {
        self.quantum
    }
}

impl SelectionPolicy for RoundRobin {
    fn kind(&self) -> SchedulingPolicy {
        SchedulingPolicy::RoundRobin
    }

    fn keeps_running(&self, slice_used: u32) -> bool {
        slice_used < self.quantum
    }

    fn pick(&self, ready: &VecDeque<Pid>, _table: &BTreeMap<Pid, Process>) -> Option<usize> {
        if ready.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}
