//! Simulation configuration
//!
//! Everything here is fixed at construction time: the scheduler never changes policy,
//! the frame pool never grows and the resource set never changes during a run.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;
use crate::error::SimError;

/// CPU selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulingPolicy {
    /// Fixed quantum, FIFO ready queue
    #[default]
    #[serde(alias = "rr")]
    RoundRobin,
    /// Smallest remaining burst first, non-preemptive within a slice
    #[serde(alias = "srf", alias = "sjf")]
    ShortestRemainingFirst,
    /// Lowest priority value first, non-preemptive within a slice
    Priority,
}

impl fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RoundRobin => "round-robin",
            Self::ShortestRemainingFirst => "shortest-remaining-first",
            Self::Priority => "priority",
        };
        f.write_str(name)
    }
}

impl FromStr for SchedulingPolicy {
    type Err = SimError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rr" | "round-robin" | "roundrobin" => Ok(Self::RoundRobin),
            "srf" | "sjf" | "shortest-remaining-first" => Ok(Self::ShortestRemainingFirst),
            "priority" | "prio" => Ok(Self::Priority),
            other => Err(SimError::invalid_config(format!(
                "unknown scheduling policy `{other}`"
            ))),
        }
    }
}

/// Page replacement policy used once the frame pool is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplacementPolicy {
    /// Evict the page with the oldest load tick
    #[default]
    #[serde(alias = "fifo")]
    Fifo,
    /// Evict the page with the oldest access tick
    #[serde(alias = "lru")]
    Lru,
}

impl fmt::Display for ReplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fifo => f.write_str("FIFO"),
            Self::Lru => f.write_str("LRU"),
        }
    }
}

impl FromStr for ReplacementPolicy {
    type Err = SimError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(Self::Fifo),
            "lru" => Ok(Self::Lru),
            other => Err(SimError::invalid_config(format!(
                "unknown replacement policy `{other}`"
            ))),
        }
    }
}

/// How a memory reference picks one of the process's pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AccessPattern {
    /// Uniform choice among the process's pages
    #[default]
    Random,
    /// Walk the pages in order, one step per reference
    Sequential,
}

impl fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random => f.write_str("random"),
            Self::Sequential => f.write_str("sequential"),
        }
    }
}

impl FromStr for AccessPattern {
    type Err = SimError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(Self::Random),
            "sequential" | "seq" => Ok(Self::Sequential),
            other => Err(SimError::invalid_config(format!(
                "unknown access pattern `{other}`"
            ))),
        }
    }
}

pub const DEFAULT_QUANTUM: u32 = 3;
pub const DEFAULT_FRAMES: usize = 6;
pub const DEFAULT_RESOURCE_HOLD: u32 = 1;
pub const DEFAULT_RESOURCES: [&str; 4] = ["config.txt", "data.db", "log.txt", "temp.txt"];

/// Construction parameters for [`crate::Scheduler`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// CPU selection policy
    pub scheduling: SchedulingPolicy,
    /// Round-robin quantum in ticks
    pub quantum: u32,
    /// Number of physical frames
    pub frames: usize,
    /// Page replacement policy
    pub replacement: ReplacementPolicy,
    /// Page selection for memory references
    pub access_pattern: AccessPattern,
    /// Fixed set of file resource names
    pub resources: Vec<String>,
    /// Executed ticks a granted resource stays held before it is released
    pub resource_hold: u32,
    /// Seed for random page selection; entropy when absent
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            scheduling: SchedulingPolicy::default(),
            quantum: DEFAULT_QUANTUM,
            frames: DEFAULT_FRAMES,
            replacement: ReplacementPolicy::default(),
            access_pattern: AccessPattern::default(),
            resources: DEFAULT_RESOURCES.iter().map(|s| s.to_string()).collect(),
            resource_hold: DEFAULT_RESOURCE_HOLD,
            seed: None,
        }
    }
}

impl SimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scheduling(mut self, scheduling: SchedulingPolicy) -> Self {
        self.scheduling = scheduling;
        self
    }

    pub fn with_quantum(mut self, quantum: u32) -> Self {
        self.quantum = quantum;
        self
    }

    pub fn with_frames(mut self, frames: usize) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_replacement(mut self, replacement: ReplacementPolicy) -> Self {
        self.replacement = replacement;
        self
    }

    pub fn with_access_pattern(mut self, access_pattern: AccessPattern) -> Self {
        self.access_pattern = access_pattern;
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

    pub fn with_resource_hold(mut self, resource_hold: u32) -> Self {
        self.resource_hold = resource_hold;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Checks the invariants the managers rely on.
    pub fn validate(&self) -> Result<()> {
        if self.quantum == 0 {
            return Err(error_stack::report!(SimError::invalid_config(
                "quantum must be positive"
            )));
        }
        if self.frames == 0 {
            return Err(error_stack::report!(SimError::invalid_config(
                "frame pool size must be positive"
            )));
        }
        if self.resource_hold == 0 {
            return Err(error_stack::report!(SimError::invalid_config(
                "resource hold must be at least one tick"
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for name in &self.resources {
            if name.is_empty() {
                return Err(error_stack::report!(SimError::invalid_config(
                    "resource names must not be empty"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(error_stack::report!(SimError::invalid_config(format!(
                    "duplicate resource `{name}`"
                ))));
            }
        }
        Ok(())
    }
}
