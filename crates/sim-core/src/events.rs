//! Structured simulation events and the execution timeline.

use std::fmt;

use serde::Serialize;

use crate::Pid;
use crate::Tick;

/// Event tags drivers render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    Admission,
    Dispatch,
    PageFault,
    Replacement,
    MemoryAllocated,
    MemoryReleased,
    ResourceGrant,
    ResourceConflict,
    ResourceRelease,
    Block,
    Unblock,
    Termination,
    Error,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Admission => "admission",
            Self::Dispatch => "dispatch",
            Self::PageFault => "page-fault",
            Self::Replacement => "replacement",
            Self::MemoryAllocated => "memory-allocated",
            Self::MemoryReleased => "memory-released",
            Self::ResourceGrant => "resource-grant",
            Self::ResourceConflict => "resource-conflict",
            Self::ResourceRelease => "resource-release",
            Self::Block => "block",
            Self::Unblock => "unblock",
            Self::Termination => "termination",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// One log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimEvent {
    pub tick: Tick,
    pub kind: EventKind,
    pub pid: Option<Pid>,
    pub detail: String,
}

impl fmt::Display for SimEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pid {
            Some(pid) => write!(f, "T{}: [{}] P{} {}", self.tick, self.kind, pid, self.detail),
            None => write!(f, "T{}: [{}] {}", self.tick, self.kind, self.detail),
        }
    }
}

/// Append-only event log in emission order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventLog {
    events: Vec<SimEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tick: Tick, kind: EventKind, pid: Option<Pid>, detail: impl Into<String>) {
        let event = SimEvent {
            tick,
            kind,
            pid,
            detail: detail.into(),
        };
        tracing::debug!(target: "sim.events", "{}", event);
        self.events.push(event);
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }

    pub fn of_kind(&self, kind: EventKind) -> impl Iterator<Item = &SimEvent> {
        self.events.iter().filter(move |e| e.kind == kind)
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.of_kind(kind).count()
    }

    /// The last `n` events, oldest first.
    pub fn tail(&self, n: usize) -> &[SimEvent] {
        let start = self.events.len().saturating_sub(n);
        &self.events[start..]
    }
}

/// A run of consecutive ticks executed by the same process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GanttInterval {
    pub start: Tick,
    /// Inclusive
    pub end: Tick,
    pub pid: Pid,
}

impl GanttInterval {
    /// Number of ticks covered.
    pub fn duration(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Execution history as `(tick, pid)` pairs, one per executed tick.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Timeline {
    entries: Vec<(Tick, Pid)>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tick: Tick, pid: Pid) {
        self.entries.push((tick, pid));
    }

    pub fn entries(&self) -> &[(Tick, Pid)] {
        &self.entries
    }

    /// Collapses the history into intervals; a new interval starts when the pid changes
    /// or the CPU was idle in between.
    pub fn intervals(&self) -> Vec<GanttInterval> {
        let mut intervals: Vec<GanttInterval> = Vec::new();
        for &(tick, pid) in &self.entries {
            match intervals.last_mut() {
                Some(last) if last.pid == pid && last.end + 1 == tick => last.end = tick,
                _ => intervals.push(GanttInterval {
                    start: tick,
                    end: tick,
                    pid,
                }),
            }
        }
        intervals
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;

    #[test]
    fn timeline_collapses_consecutive_ticks() {
        let mut timeline = Timeline::new();
        for (tick, pid) in [(1, 1), (2, 1), (3, 1), (4, 2), (5, 2), (6, 1), (7, 1)] {
            timeline.push(tick, pid);
        }

        assert_eq!(
            timeline.intervals(),
            vec![
                GanttInterval { start: 1, end: 3, pid: 1 },
                GanttInterval { start: 4, end: 5, pid: 2 },
                GanttInterval { start: 6, end: 7, pid: 1 },
            ]
        );
    }

    #[test]
    fn idle_gap_splits_interval() {
        let mut timeline = Timeline::new();
        timeline.push(1, 3);
        timeline.push(2, 3);
        timeline.push(5, 3);

        let intervals = timeline.intervals();
        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].duration(), 2);
        assert_eq!(intervals[1], GanttInterval { start: 5, end: 5, pid: 3 });
    }

    #[test]
    fn empty_timeline_has_no_intervals() {
        assert!(Timeline::new().intervals().is_empty());
    }

    #[test]
    fn event_log_filters_and_tails() {
        let mut log = EventLog::new();
        log.record(1, EventKind::Admission, Some(1), "arrived");
        log.record(1, EventKind::Dispatch, Some(1), "dispatched");
        log.record(2, EventKind::PageFault, Some(1), "page 0 -> frame 0");

        assert_eq!(log.events().len(), 3);
        assert_eq!(log.count(EventKind::Dispatch), 1);
        assert_eq!(log.tail(2)[0].kind, EventKind::Dispatch);
        assert_eq!(log.tail(10).len(), 3);
        assert_eq!(log.events()[2].to_string(), "T2: [page-fault] P1 page 0 -> frame 0");
    }
}
