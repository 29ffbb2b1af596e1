use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;
use crate::error::SimError;
use crate::PageId;
use crate::Pid;
use crate::Tick;

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessState {
    /// Registered, waiting for its arrival tick
    New,
    /// In the ready queue
    Ready,
    /// Holding the CPU
    Running,
    /// Waiting on a resource or blocked by the driver
    Blocked,
    /// Finished, terminal
    Terminated,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "NEW",
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::Blocked => "BLOCKED",
            Self::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}

/// Externally supplied description of a process, as produced by a workload generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub id: Pid,
    /// Lower value wins under the priority policy
    #[serde(default)]
    pub priority: i32,
    /// CPU time units needed
    pub burst: u32,
    #[serde(default)]
    pub arrival: Tick,
    /// Pages allocated on first execution
    #[serde(default = "default_pages")]
    pub pages: usize,
    /// Resources acquired, used and released in this order
    #[serde(default)]
    pub resources: Vec<String>,
}

fn default_pages() -> usize {
    1
}

impl ProcessSpec {
    pub fn new(id: Pid, burst: u32) -> Self {
        Self {
            id,
            priority: 0,
            burst,
            arrival: 0,
            pages: 1,
            resources: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_arrival(mut self, arrival: Tick) -> Self {
        self.arrival = arrival;
        self
    }

    pub fn with_pages(mut self, pages: usize) -> Self {
        self.pages = pages;
        self
    }

    pub fn with_resources<I, S>(mut self, resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resources = resources.into_iter().map(Into::into).collect();
        self
    }

    /// Rejects specs the simulation cannot run to completion.
    pub fn validate(&self) -> Result<()> {
        if self.burst == 0 {
            return Err(error_stack::report!(SimError::invalid_process(
                self.id,
                "burst must be positive"
            )));
        }
        if self.pages == 0 {
            return Err(error_stack::report!(SimError::invalid_process(
                self.id,
                "at least one page is required"
            )));
        }
        // every resource needs its own demand point strictly inside the burst
        if self.resources.len() >= self.burst as usize {
            return Err(error_stack::report!(SimError::invalid_process(
                self.id,
                format!(
                    "{} resources do not fit in a burst of {}",
                    self.resources.len(),
                    self.burst
                )
            )));
        }
        Ok(())
    }
}

/// Process control block.
///
/// Only the scheduler mutates a process; the memory manager records page ids through
/// [`Process::set_assigned_pages`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Process {
    id: Pid,
    state: ProcessState,
    priority: i32,
    total_burst: u32,
    remaining_burst: u32,
    arrival_time: Tick,
    start_time: Option<Tick>,
    completion_time: Option<Tick>,
    waiting_time: u64,
    turnaround_time: Option<u64>,
    memory_pages_required: usize,
    assigned_page_ids: BTreeSet<PageId>,
    required_resources: Vec<String>,
    used_resources: Vec<String>,
    pending_resource: Option<String>,
    held_resource: Option<String>,
    hold_units_left: u32,
}

impl Process {
    pub fn new(spec: ProcessSpec) -> Self {
        Self {
            id: spec.id,
            state: ProcessState::New,
            priority: spec.priority,
            total_burst: spec.burst,
            remaining_burst: spec.burst,
            arrival_time: spec.arrival,
            start_time: None,
            completion_time: None,
            waiting_time: 0,
            turnaround_time: None,
            memory_pages_required: spec.pages,
            assigned_page_ids: BTreeSet::new(),
            required_resources: spec.resources,
            used_resources: Vec::new(),
            pending_resource: None,
            held_resource: None,
            hold_units_left: 0,
        }
    }

    pub fn id(&self) -> Pid {
        self.id
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn total_burst(&self) -> u32 {
        self.total_burst
    }

    pub fn remaining_burst(&self) -> u32 {
        self.remaining_burst
    }

    pub fn arrival_time(&self) -> Tick {
        self.arrival_time
    }

    pub fn start_time(&self) -> Option<Tick> {
        self.start_time
    }

    pub fn completion_time(&self) -> Option<Tick> {
        self.completion_time
    }

    pub fn waiting_time(&self) -> u64 {
        self.waiting_time
    }

    pub fn turnaround_time(&self) -> Option<u64> {
        self.turnaround_time
    }

    pub fn memory_pages_required(&self) -> usize {
        self.memory_pages_required
    }

    pub fn assigned_page_ids(&self) -> &BTreeSet<PageId> {
        &self.assigned_page_ids
    }

    pub fn required_resources(&self) -> &[String] {
        &self.required_resources
    }

    pub fn used_resources(&self) -> &[String] {
        &self.used_resources
    }

    pub fn pending_resource(&self) -> Option<&str> {
        self.pending_resource.as_deref()
    }

    pub fn held_resource(&self) -> Option<&str> {
        self.held_resource.as_deref()
    }

    pub fn is_terminated(&self) -> bool {
        self.state == ProcessState::Terminated
    }

    /// CPU units consumed so far.
    pub fn executed(&self) -> u32 {
        self.total_burst - self.remaining_burst
    }

    /// The next resource in the declared order, if any remain.
    pub fn next_resource(&self) -> Option<&str> {
        self.required_resources
            .get(self.used_resources.len())
            .map(String::as_str)
    }

    /// Executed units after which resource `index` is needed.
    fn demand_point(&self, index: usize) -> u32 {
        let slots = self.required_resources.len() as u64 + 1;
        ((index as u64 + 1) * self.total_burst as u64 / slots) as u32
    }

    /// The next resource if its demand point has been reached and nothing is held.
    pub fn due_resource(&self) -> Option<&str> {
        if self.held_resource.is_some() {
            return None;
        }
        let next = self.next_resource()?;
        if self.executed() < self.demand_point(self.used_resources.len()) {
            return None;
        }
        Some(next)
    }

    pub(crate) fn set_state(&mut self, state: ProcessState) {
        self.state = state;
    }

    pub(crate) fn mark_dispatched(&mut self, now: Tick) {
        self.state = ProcessState::Running;
        if self.start_time.is_none() {
            self.start_time = Some(now);
        }
    }

    /// Consumes one CPU unit. Returns `true` when the burst is exhausted.
    pub(crate) fn execute_unit(&mut self) -> bool {
        debug_assert!(self.remaining_burst > 0, "process {} already done", self.id);
        self.remaining_burst = self.remaining_burst.saturating_sub(1);
        self.remaining_burst == 0
    }

    pub(crate) fn add_waiting_tick(&mut self) {
        self.waiting_time += 1;
    }

    pub(crate) fn terminate(&mut self, now: Tick) {
        self.state = ProcessState::Terminated;
        self.completion_time = Some(now);
        self.turnaround_time = Some(now.saturating_sub(self.arrival_time));
    }

    pub(crate) fn set_assigned_pages(&mut self, pages: impl IntoIterator<Item = PageId>) {
        self.assigned_page_ids = pages.into_iter().collect();
    }

    pub(crate) fn clear_assigned_pages(&mut self) {
        self.assigned_page_ids.clear();
    }

    pub(crate) fn wait_for(&mut self, resource: &str) {
        self.pending_resource = Some(resource.to_string());
    }

    pub(crate) fn clear_pending(&mut self) -> Option<String> {
        self.pending_resource.take()
    }

    /// Records ownership of a granted resource for `units` executed ticks and drops the
    /// matching wait marker.
    pub(crate) fn hold(&mut self, resource: &str, units: u32) {
        if self.pending_resource.as_deref() == Some(resource) {
            self.pending_resource = None;
        }
        self.held_resource = Some(resource.to_string());
        self.hold_units_left = units.max(1);
    }

    /// Counts one executed unit against the held resource. Returns `true` once the hold
    /// has run out, or earlier when the remaining burst only leaves one unit for each
    /// resource still to be acquired.
    pub(crate) fn consume_hold(&mut self) -> bool {
        if self.held_resource.is_none() {
            return false;
        }
        self.hold_units_left = self.hold_units_left.saturating_sub(1);
        let still_needed = self
            .required_resources
            .len()
            .saturating_sub(self.used_resources.len() + 1);
        self.hold_units_left == 0 || self.remaining_burst as usize <= still_needed
    }

    pub(crate) fn take_held(&mut self) -> Option<String> {
        self.hold_units_left = 0;
        self.held_resource.take()
    }

    /// Marks `resource` as used. Only the next resource in order may be completed.
    pub(crate) fn complete_resource(&mut self, resource: &str) -> Result<()> {
        match self.next_resource() {
            Some(next) if next == resource => {
                self.used_resources.push(resource.to_string());
                Ok(())
            }
            expected => Err(error_stack::report!(SimError::OutOfOrderResource {
                pid: self.id,
                expected: expected.map(str::to_string),
                got: resource.to_string(),
            })),
        }
    }

    /// Drops the next resource from the remaining requirement after a failed request.
    pub(crate) fn abandon_next_resource(&mut self) -> Option<String> {
        let index = self.used_resources.len();
        (index < self.required_resources.len()).then(|| self.required_resources.remove(index))
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.to_string();
        write!(f, "P{}[{}]", self.id, &state[..3])
    }
}
