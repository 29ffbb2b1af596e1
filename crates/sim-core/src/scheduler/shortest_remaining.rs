use std::collections::BTreeMap;
use std::collections::VecDeque;

use super::SelectionPolicy;
use crate::config::SchedulingPolicy;
use crate::process::Process;
use crate::Pid;

/// Smallest remaining burst first. The running process is never preempted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortestRemainingFirst;

impl SelectionPolicy for ShortestRemainingFirst {
    fn kind(&self) -> SchedulingPolicy {
        SchedulingPolicy::ShortestRemainingFirst
    }

    fn pick(&self, ready: &VecDeque<Pid>, table: &BTreeMap<Pid, Process>) -> Option<usize> {
        super::min_by_key(ready, table, Process::remaining_burst)
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;
    use crate::process::ProcessSpec;

    fn table(bursts: &[(Pid, u32)]) -> BTreeMap<Pid, Process> {
        bursts
            .iter()
            .map(|&(pid, burst)| (pid, Process::new(ProcessSpec::new(pid, burst))))
            .collect()
    }

    #[test]
    fn picks_smallest_remaining() {
        let table = table(&[(1, 8), (2, 3), (3, 5)]);
        let ready = VecDeque::from([1, 2, 3]);
        assert_eq!(ShortestRemainingFirst.pick(&ready, &table), Some(1));
    }

    #[test]
    fn ties_keep_queue_order() {
        let table = table(&[(1, 4), (2, 4), (3, 4)]);
        let ready = VecDeque::from([3, 1, 2]);
        assert_eq!(ShortestRemainingFirst.pick(&ready, &table), Some(0));
    }

    #[test]
    fn never_preempts() {
        assert!(ShortestRemainingFirst.keeps_running(u32::MAX));
    }
}
