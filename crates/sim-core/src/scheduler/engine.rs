use std::collections::BTreeMap;
use std::collections::VecDeque;

use error_stack::Report;
use serde::Serialize;

use super::policy_for;
use super::SelectionPolicy;
use super::SimulationReport;
use crate::config::SimConfig;
use crate::error::Result;
use crate::error::SimError;
use crate::events::EventKind;
use crate::events::EventLog;
use crate::events::Timeline;
use crate::files::Access;
use crate::files::FileResourceManager;
use crate::memory::AllocOutcome;
use crate::memory::LoadOutcome;
use crate::memory::MemoryManager;
use crate::process::Process;
use crate::process::ProcessSpec;
use crate::process::ProcessState;
use crate::PageId;
use crate::Pid;
use crate::Tick;

/// Aggregate scheduling metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulerMetrics {
    pub completed: usize,
    pub context_switches: u64,
    /// Mean over terminated processes, `None` until one terminates
    pub avg_waiting: Option<f64>,
    pub avg_turnaround: Option<f64>,
    pub ticks: Tick,
    pub busy_ticks: u64,
    pub idle_ticks: u64,
    /// Busy ticks over elapsed ticks
    pub utilization: f64,
}

/// Owns the process table and both managers, and sequences them once per tick.
pub struct Scheduler {
    config: SimConfig,
    policy: Box<dyn SelectionPolicy>,
    processes: BTreeMap<Pid, Process>,
    // registered but not arrived yet, in admission order
    arrivals: Vec<Pid>,
    ready: VecDeque<Pid>,
    blocked: VecDeque<Pid>,
    running: Option<Pid>,
    slice_used: u32,
    last_dispatched: Option<Pid>,
    current_tick: Tick,
    memory: MemoryManager,
    files: FileResourceManager,
    events: EventLog,
    timeline: Timeline,
    completed: usize,
    context_switches: u64,
    busy_ticks: u64,
}

impl Scheduler {
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;

        let mut memory = MemoryManager::new(config.frames, config.replacement)
            .with_access_pattern(config.access_pattern);
        if let Some(seed) = config.seed {
            memory = memory.with_seed(seed);
        }
        let files = FileResourceManager::new(config.resources.iter().cloned());
        let policy = policy_for(config.scheduling, config.quantum);

        tracing::info!(
            policy = %config.scheduling,
            quantum = config.quantum,
            frames = config.frames,
            replacement = %config.replacement,
            resources = config.resources.len(),
            "scheduler initialized"
        );

        Ok(Self {
            config,
            policy,
            processes: BTreeMap::new(),
            arrivals: Vec::new(),
            ready: VecDeque::new(),
            blocked: VecDeque::new(),
            running: None,
            slice_used: 0,
            last_dispatched: None,
            current_tick: 0,
            memory,
            files,
            events: EventLog::new(),
            timeline: Timeline::new(),
            completed: 0,
            context_switches: 0,
            busy_ticks: 0,
        })
    }

    /// Registers a process. It becomes READY now if it has already arrived, otherwise on
    /// its arrival tick.
    pub fn admit(&mut self, spec: ProcessSpec) -> Result<()> {
        spec.validate()?;
        if self.processes.contains_key(&spec.id) {
            return Err(error_stack::report!(SimError::DuplicateProcess { pid: spec.id }));
        }
        if let Some(name) = spec.resources.iter().find(|name| !self.files.contains(name)) {
            return Err(error_stack::report!(SimError::unknown_resource(name.as_str()))
                .attach_printable(format!("required by process {}", spec.id)));
        }

        let pid = spec.id;
        let arrival = spec.arrival;
        self.processes.insert(pid, Process::new(spec));
        if arrival <= self.current_tick {
            self.make_arrived(pid, self.current_tick);
        } else {
            self.arrivals.push(pid);
            tracing::debug!(pid, arrival, "process registered, awaiting arrival");
        }
        Ok(())
    }

    /// Advances the clock by one tick. Returns `true` when a process consumed a burst unit.
    pub fn tick(&mut self) -> bool {
        self.current_tick += 1;
        let now = self.current_tick;
        self.admit_arrivals(now);

        let executed = match self.select(now) {
            Some(pid) => self.acquire_due_resource(pid, now) && self.execute(pid, now),
            None => {
                tracing::trace!(tick = now, "cpu idle");
                false
            }
        };

        self.reconcile(now);
        executed
    }

    /// Forces a READY or RUNNING process into the blocked set.
    pub fn block(&mut self, pid: Pid) -> Result<()> {
        let now = self.current_tick;
        let Some(process) = self.processes.get_mut(&pid) else {
            return Err(error_stack::report!(SimError::UnknownProcess { pid }));
        };
        match process.state() {
            ProcessState::Ready | ProcessState::Running => {}
            ProcessState::Blocked => return Ok(()),
            state => {
                return Err(error_stack::report!(SimError::invalid_process(
                    pid,
                    format!("cannot block a {state} process")
                )))
            }
        }

        process.set_state(ProcessState::Blocked);
        self.ready.retain(|&queued| queued != pid);
        if self.running == Some(pid) {
            self.running = None;
            self.slice_used = 0;
        }
        self.blocked.push_back(pid);
        self.events
            .record(now, EventKind::Block, Some(pid), "blocked on request");
        Ok(())
    }

    /// Moves a blocked process to the tail of the ready queue, withdrawing it from any
    /// resource wait queue.
    pub fn unblock(&mut self, pid: Pid) -> Result<()> {
        let now = self.current_tick;
        let Some(process) = self.processes.get_mut(&pid) else {
            return Err(error_stack::report!(SimError::UnknownProcess { pid }));
        };
        if process.state() != ProcessState::Blocked {
            return Err(error_stack::report!(SimError::invalid_process(
                pid,
                format!("cannot unblock a {} process", process.state())
            )));
        }
        if let Some(resource) = process.clear_pending() {
            self.files.withdraw(&resource, pid);
        }
        self.wake(pid, now);
        Ok(())
    }

    pub fn has_active_processes(&self) -> bool {
        self.processes.values().any(|p| !p.is_terminated())
    }

    pub fn metrics(&self) -> SchedulerMetrics {
        let terminated: Vec<&Process> = self
            .processes
            .values()
            .filter(|p| p.is_terminated())
            .collect();
        let mean = |value: fn(&Process) -> u64| {
            if terminated.is_empty() {
                return None;
            }
            let total: u64 = terminated.iter().map(|p| value(p)).sum();
            Some(total as f64 / terminated.len() as f64)
        };
        let ticks = self.current_tick;

        SchedulerMetrics {
            completed: self.completed,
            context_switches: self.context_switches,
            avg_waiting: mean(Process::waiting_time),
            avg_turnaround: mean(|p| p.turnaround_time().unwrap_or_default()),
            ticks,
            busy_ticks: self.busy_ticks,
            idle_ticks: ticks - self.busy_ticks,
            utilization: if ticks == 0 {
                0.0
            } else {
                self.busy_ticks as f64 / ticks as f64
            },
        }
    }

    pub fn report(&self) -> SimulationReport {
        SimulationReport::capture(self)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn policy(&self) -> &dyn SelectionPolicy {
        self.policy.as_ref()
    }

    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    pub fn ready(&self) -> &VecDeque<Pid> {
        &self.ready
    }

    pub fn blocked(&self) -> &VecDeque<Pid> {
        &self.blocked
    }

    pub fn running(&self) -> Option<Pid> {
        self.running
    }

    pub fn process(&self, pid: Pid) -> Option<&Process> {
        self.processes.get(&pid)
    }

    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.processes.values()
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn files(&self) -> &FileResourceManager {
        &self.files
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    fn admit_arrivals(&mut self, now: Tick) {
        if self.arrivals.is_empty() {
            return;
        }
        let processes = &self.processes;
        let (arrived, waiting): (Vec<Pid>, Vec<Pid>) =
            self.arrivals.iter().copied().partition(|pid| {
                processes
                    .get(pid)
                    .is_some_and(|p| p.arrival_time() <= now)
            });
        self.arrivals = waiting;
        for pid in arrived {
            self.make_arrived(pid, now);
        }
    }

    fn make_arrived(&mut self, pid: Pid, now: Tick) {
        let Some(process) = self.processes.get_mut(&pid) else {
            return;
        };
        process.set_state(ProcessState::Ready);
        let detail = format!(
            "arrived (burst {}, priority {}, {} pages)",
            process.total_burst(),
            process.priority(),
            process.memory_pages_required()
        );
        self.ready.push_back(pid);
        self.events
            .record(now, EventKind::Admission, Some(pid), detail);
    }

    /// Keeps the running process while the policy allows it, otherwise dispatches the
    /// policy's pick from the ready queue.
    fn select(&mut self, now: Tick) -> Option<Pid> {
        if let Some(pid) = self.running {
            if self.policy.keeps_running(self.slice_used) {
                return Some(pid);
            }
            if let Some(process) = self.processes.get_mut(&pid) {
                process.set_state(ProcessState::Ready);
            }
            self.running = None;
            self.ready.push_back(pid);
            tracing::debug!(pid, tick = now, "time slice expired");
        }

        let index = self.policy.pick(&self.ready, &self.processes)?;
        let pid = self.ready.remove(index)?;
        self.dispatch(pid, now);
        Some(pid)
    }

    fn dispatch(&mut self, pid: Pid, now: Tick) {
        if self.last_dispatched.is_some_and(|last| last != pid) {
            self.context_switches += 1;
        }
        self.last_dispatched = Some(pid);
        self.running = Some(pid);
        self.slice_used = 0;
        if let Some(process) = self.processes.get_mut(&pid) {
            process.mark_dispatched(now);
        }
        self.events.record(
            now,
            EventKind::Dispatch,
            Some(pid),
            format!("dispatched ({})", self.policy.kind()),
        );
    }

    /// Requests the process's due resource, if any. Returns `false` when the tick ends here.
    fn acquire_due_resource(&mut self, pid: Pid, now: Tick) -> bool {
        let Some(resource) = self
            .processes
            .get(&pid)
            .and_then(Process::due_resource)
            .map(str::to_string)
        else {
            return true;
        };

        match self.files.request(pid, &resource, now) {
            Ok(Access::Granted) => {
                if let Some(process) = self.processes.get_mut(&pid) {
                    process.hold(&resource, self.config.resource_hold);
                }
                self.events.record(
                    now,
                    EventKind::ResourceGrant,
                    Some(pid),
                    format!("{resource} granted"),
                );
                true
            }
            Ok(Access::Denied { owner, enqueued }) => {
                if enqueued {
                    self.events.record(
                        now,
                        EventKind::ResourceConflict,
                        Some(pid),
                        format!("{resource} held by P{owner}"),
                    );
                }
                if let Some(process) = self.processes.get_mut(&pid) {
                    process.wait_for(&resource);
                    process.set_state(ProcessState::Blocked);
                }
                self.running = None;
                self.slice_used = 0;
                self.blocked.push_back(pid);
                self.events.record(
                    now,
                    EventKind::Block,
                    Some(pid),
                    format!("waiting for {resource}"),
                );
                false
            }
            Err(report) => {
                self.record_error(pid, &report, now);
                // the failed request is final; the process keeps running without it
                if let Some(process) = self.processes.get_mut(&pid) {
                    process.abandon_next_resource();
                }
                false
            }
        }
    }

    /// Runs one burst unit of `pid`. Always returns `true`.
    fn execute(&mut self, pid: Pid, now: Tick) -> bool {
        let Some(process) = self.processes.get_mut(&pid) else {
            return false;
        };
        let finished = process.execute_unit();
        let release_due = process.consume_hold();
        self.slice_used += 1;
        self.busy_ticks += 1;
        self.timeline.push(now, pid);

        self.touch_memory(pid, now);

        for waiting in &self.ready {
            if let Some(process) = self.processes.get_mut(waiting) {
                process.add_waiting_tick();
            }
        }

        if finished {
            self.terminate(pid, now);
        }
        if finished || release_due {
            self.release_held(pid, now);
        }
        true
    }

    /// Allocates on first execution, then performs one memory reference.
    fn touch_memory(&mut self, pid: Pid, now: Tick) {
        let Some(process) = self.processes.get_mut(&pid) else {
            return;
        };
        match self.memory.allocate(process, now) {
            Ok(AllocOutcome::Allocated {
                pages,
                first_load,
                first_page,
            }) => {
                self.events.record(
                    now,
                    EventKind::MemoryAllocated,
                    Some(pid),
                    format!("{} pages {:?}", pages.len(), pages),
                );
                self.record_load(pid, first_page, first_load, now);
            }
            Ok(AllocOutcome::AlreadyAllocated) => {}
            Err(report) => {
                self.record_error(pid, &report, now);
                return;
            }
        }

        let Some(process) = self.processes.get(&pid) else {
            return;
        };
        match self.memory.access(process, now) {
            Ok(access) => self.record_load(pid, access.page, access.load, now),
            Err(report) => self.record_error(pid, &report, now),
        }
    }

    fn record_load(&mut self, pid: Pid, page: PageId, load: LoadOutcome, now: Tick) {
        match load {
            LoadOutcome::Hit => {}
            LoadOutcome::Loaded { frame } => self.events.record(
                now,
                EventKind::PageFault,
                Some(pid),
                format!("page {page} loaded into frame {frame}"),
            ),
            LoadOutcome::Replaced {
                frame,
                victim,
                victim_owner,
            } => {
                self.events.record(
                    now,
                    EventKind::PageFault,
                    Some(pid),
                    format!("page {page} loaded into frame {frame}"),
                );
                self.events.record(
                    now,
                    EventKind::Replacement,
                    Some(pid),
                    format!(
                        "{} evicted page {victim} of P{victim_owner} from frame {frame}",
                        self.memory.policy()
                    ),
                );
            }
        }
    }

    fn terminate(&mut self, pid: Pid, now: Tick) {
        let Some(process) = self.processes.get_mut(&pid) else {
            return;
        };
        process.terminate(now);
        let turnaround = process.turnaround_time().unwrap_or_default();
        let waiting = process.waiting_time();
        let freed = self.memory.release(process, now);

        self.completed += 1;
        self.running = None;
        self.slice_used = 0;
        self.events.record(
            now,
            EventKind::Termination,
            Some(pid),
            format!("finished (waiting {waiting}, turnaround {turnaround})"),
        );
        self.events.record(
            now,
            EventKind::MemoryReleased,
            Some(pid),
            format!("{freed} frames freed"),
        );
        tracing::info!(pid, tick = now, waiting, turnaround, "process terminated");
    }

    /// Completes and releases the resource `pid` holds, handing it to the next waiter.
    fn release_held(&mut self, pid: Pid, now: Tick) {
        let Some(process) = self.processes.get_mut(&pid) else {
            return;
        };
        let Some(resource) = process.take_held() else {
            return;
        };
        if let Err(report) = process.complete_resource(&resource) {
            self.record_error(pid, &report, now);
        }

        match self.files.release(&resource, pid, now) {
            Ok(next) => {
                self.events.record(
                    now,
                    EventKind::ResourceRelease,
                    Some(pid),
                    format!("{resource} released"),
                );
                if let Some(next) = next {
                    if let Some(waiter) = self.processes.get_mut(&next) {
                        waiter.hold(&resource, self.config.resource_hold);
                    }
                    self.events.record(
                        now,
                        EventKind::ResourceGrant,
                        Some(next),
                        format!("{resource} handed over by P{pid}"),
                    );
                    self.wake(next, now);
                }
            }
            Err(report) => self.record_error(pid, &report, now),
        }
    }

    /// Grants free resources to blocked waiters and unblocks them.
    fn reconcile(&mut self, now: Tick) {
        if self.blocked.is_empty() {
            return;
        }
        let waiting: Vec<(Pid, String)> = self
            .blocked
            .iter()
            .filter_map(|pid| {
                let resource = self.processes.get(pid)?.pending_resource()?;
                Some((*pid, resource.to_string()))
            })
            .collect();
        let granted = self.files.reconcile(
            waiting.iter().map(|(pid, name)| (*pid, name.as_str())),
            now,
        );

        for (pid, resource) in granted {
            if let Some(process) = self.processes.get_mut(&pid) {
                process.hold(&resource, self.config.resource_hold);
            }
            self.events.record(
                now,
                EventKind::ResourceGrant,
                Some(pid),
                format!("{resource} granted to waiter"),
            );
            self.wake(pid, now);
        }
    }

    fn wake(&mut self, pid: Pid, now: Tick) {
        let Some(process) = self.processes.get_mut(&pid) else {
            return;
        };
        if process.state() != ProcessState::Blocked {
            return;
        }
        process.set_state(ProcessState::Ready);
        self.blocked.retain(|&queued| queued != pid);
        self.ready.push_back(pid);
        self.events
            .record(now, EventKind::Unblock, Some(pid), "moved to ready queue");
    }

    fn record_error(&mut self, pid: Pid, report: &Report<SimError>, now: Tick) {
        tracing::error!(pid, tick = now, "simulation error: {report:?}");
        self.events.record(
            now,
            EventKind::Error,
            Some(pid),
            report.current_context().to_string(),
        );
    }
}
