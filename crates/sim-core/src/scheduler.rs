use std::collections::BTreeMap;
use std::collections::VecDeque;

use crate::config::SchedulingPolicy;
use crate::process::Process;
use crate::Pid;

mod engine;
pub mod priority;
mod report;
pub mod round_robin;
pub mod shortest_remaining;

pub use engine::Scheduler;
pub use engine::SchedulerMetrics;
pub use report::FrameSlot;
pub use report::SimulationReport;

/// Trait for CPU selection policies
pub trait SelectionPolicy: Send + Sync {
    /// Policy this implementation stands for
    fn kind(&self) -> SchedulingPolicy;

    /// Whether the running process keeps the CPU after `slice_used` ticks of its slice
    fn keeps_running(&self, slice_used: u32) -> bool {
        let _ = slice_used;
        true
    }

    /// Index into `ready` of the next process to dispatch
    fn pick(&self, ready: &VecDeque<Pid>, table: &BTreeMap<Pid, Process>) -> Option<usize>;
}

/// Builds the selection policy for `kind`.
pub fn policy_for(kind: SchedulingPolicy, quantum: u32) -> Box<dyn SelectionPolicy> {
    match kind {
        SchedulingPolicy::RoundRobin => Box::new(round_robin::RoundRobin::new(quantum)),
        SchedulingPolicy::ShortestRemainingFirst => {
            Box::new(shortest_remaining::ShortestRemainingFirst)
        }
        SchedulingPolicy::Priority => Box::new(priority::PriorityFirst),
    }
}

/// Stable linear scan for the ready entry with the smallest key; ties keep queue order.
pub(crate) fn min_by_key<K, F>(
    ready: &VecDeque<Pid>,
    table: &BTreeMap<Pid, Process>,
    key: F,
) -> Option<usize>
where
    K: Ord,
    F: Fn(&Process) -> K,
{
    ready
        .iter()
        .enumerate()
        .filter_map(|(index, pid)| table.get(pid).map(|process| (index, key(process))))
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map(|(index, _)| index)
}
