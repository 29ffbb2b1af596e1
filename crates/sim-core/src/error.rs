use derive_more::Display;
use error_stack::Report;

use crate::PageId;
use crate::Pid;

/// Result type for simulator core operations.
pub type Result<T> = core::result::Result<T, Report<SimError>>;

/// Errors reported by the scheduler, memory manager and file resource manager.
///
/// Denials and page faults are ordinary outcomes and never show up here.
#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum SimError {
    /// A resource name that is not part of the configured set
    #[display("unknown resource `{name}`")]
    UnknownResource { name: String },

    /// Release attempted by a process that does not own the resource
    #[display("process {pid} does not own `{resource}` (owner: {owner:?})")]
    NotOwner {
        resource: String,
        pid: Pid,
        owner: Option<Pid>,
    },

    /// A process tried to complete a resource out of its declared order
    #[display("process {pid} completed `{got}` but the next required resource is {expected:?}")]
    OutOfOrderResource {
        pid: Pid,
        expected: Option<String>,
        got: String,
    },

    /// Lookup of a process id the scheduler does not know
    #[display("unknown process {pid}")]
    UnknownProcess { pid: Pid },

    /// A process id registered twice
    #[display("process {pid} is already registered")]
    DuplicateProcess { pid: Pid },

    /// A process spec that cannot be simulated
    #[display("invalid process {pid}: {reason}")]
    InvalidProcess { pid: Pid, reason: String },

    /// Memory access for a process that has no page table
    #[display("process {pid} has no memory allocated")]
    NotAllocated { pid: Pid },

    /// A page id that no live page table contains
    #[display("unknown page {page}")]
    UnknownPage { page: PageId },

    /// Replacement found no resident page to evict
    #[display("no resident page available for eviction")]
    NoVictim,

    /// Configuration is invalid or inconsistent
    #[display("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },
}

impl core::error::Error for SimError {}

impl SimError {
    pub fn unknown_resource(name: impl Into<String>) -> Self {
        Self::UnknownResource { name: name.into() }
    }

    pub fn invalid_process(pid: Pid, reason: impl Into<String>) -> Self {
        Self::InvalidProcess {
            pid,
            reason: reason.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }
}
