use serde::Serialize;

use super::Scheduler;
use super::SchedulerMetrics;
use crate::config::SimConfig;
use crate::events::GanttInterval;
use crate::events::SimEvent;
use crate::files::FileResource;
use crate::files::FileStats;
use crate::memory::MemoryStats;
use crate::process::Process;
use crate::PageId;
use crate::Pid;
use crate::Tick;

/// One slot of the frame pool as seen by presentation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameSlot {
    pub frame: usize,
    pub page: Option<PageId>,
    pub owner: Option<Pid>,
}

/// Read-only snapshot of a simulation, serializable for drivers.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub tick: Tick,
    pub running: Option<Pid>,
    pub ready: Vec<Pid>,
    pub blocked: Vec<Pid>,
    pub metrics: SchedulerMetrics,
    pub memory: MemoryStats,
    pub files: FileStats,
    pub processes: Vec<Process>,
    pub frames: Vec<FrameSlot>,
    pub resources: Vec<FileResource>,
    pub gantt: Vec<GanttInterval>,
    pub events: Vec<SimEvent>,
}

impl SimulationReport {
    pub(crate) fn capture(scheduler: &Scheduler) -> Self {
        let memory = scheduler.memory();
        let frames = memory
            .frames()
            .iter()
            .enumerate()
            .map(|(frame, page)| FrameSlot {
                frame,
                page: *page,
                owner: memory.frame_owner(frame),
            })
            .collect();

        Self {
            config: scheduler.config().clone(),
            tick: scheduler.current_tick(),
            running: scheduler.running(),
            ready: scheduler.ready().iter().copied().collect(),
            blocked: scheduler.blocked().iter().copied().collect(),
            metrics: scheduler.metrics(),
            memory: memory.stats(),
            files: scheduler.files().stats(),
            processes: scheduler.processes().cloned().collect(),
            frames,
            resources: scheduler.files().resources().cloned().collect(),
            gantt: scheduler.timeline().intervals(),
            events: scheduler.events().events().to_vec(),
        }
    }

    pub fn process(&self, pid: Pid) -> Option<&Process> {
        self.processes.iter().find(|p| p.id() == pid)
    }
}
