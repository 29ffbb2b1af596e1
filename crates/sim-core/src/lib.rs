//! Tick-driven simulation of CPU scheduling, demand paging and file resource arbitration.
//!
//! The crate provides three managers and the process table they share:
//! - [`Scheduler`]: ready/blocked queues, selection policies and the per-tick orchestration
//! - [`MemoryManager`]: page tables over a fixed frame pool with FIFO or LRU replacement
//! - [`FileResourceManager`]: named mutually-exclusive resources with FIFO wait queues
//!
//! Time only advances through [`Scheduler::tick`], which passes the current tick into every
//! memory and file call so all timestamps come from one clock.

mod config;
mod error;
mod events;
mod files;
mod memory;
mod process;
mod scheduler;

/// Simulated clock value
pub type Tick = u64;
/// Process identifier
pub type Pid = u32;
/// Globally unique page identifier
pub type PageId = u64;

pub use config::AccessPattern;
pub use config::ReplacementPolicy;
pub use config::SchedulingPolicy;
pub use config::SimConfig;
pub use config::DEFAULT_FRAMES;
pub use config::DEFAULT_QUANTUM;
pub use config::DEFAULT_RESOURCES;
pub use config::DEFAULT_RESOURCE_HOLD;
pub use error::Result;
pub use error::SimError;
pub use events::EventKind;
pub use events::EventLog;
pub use events::GanttInterval;
pub use events::SimEvent;
pub use events::Timeline;
pub use files::Access;
pub use files::FileResource;
pub use files::FileResourceManager;
pub use files::FileStats;
pub use memory::AccessOutcome;
pub use memory::AllocOutcome;
pub use memory::LoadOutcome;
pub use memory::MemoryManager;
pub use memory::MemoryStats;
pub use memory::Page;
pub use process::Process;
pub use process::ProcessSpec;
pub use process::ProcessState;
pub use scheduler::policy_for;
pub use scheduler::priority::PriorityFirst;
pub use scheduler::round_robin::RoundRobin;
pub use scheduler::shortest_remaining::ShortestRemainingFirst;
pub use scheduler::FrameSlot;
pub use scheduler::Scheduler;
pub use scheduler::SchedulerMetrics;
pub use scheduler::SelectionPolicy;
pub use scheduler::SimulationReport;
