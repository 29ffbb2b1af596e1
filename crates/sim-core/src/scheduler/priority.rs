use std::collections::BTreeMap;
use std::collections::VecDeque;

use super::SelectionPolicy;
use crate::config::SchedulingPolicy;
use crate::process::Process;
use crate::Pid;

/// Lowest priority value first, non-preemptive within a slice.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityFirst;

impl SelectionPolicy for PriorityFirst {
    fn kind(&self) -> SchedulingPolicy {
        SchedulingPolicy::Priority
    }

    fn pick(&self, ready: &VecDeque<Pid>, table: &BTreeMap<Pid, Process>) -> Option<usize> {
        super::min_by_key(ready, table, Process::priority)
    }
}
