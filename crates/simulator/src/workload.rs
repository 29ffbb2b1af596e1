//! Workload files and the random workload generator.

use std::path::Path;
use std::path::PathBuf;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use serde::Deserialize;
use serde::Serialize;
use sim_core::Pid;
use sim_core::ProcessSpec;
use sim_core::SimConfig;
use thiserror::Error;

/// Processes to admit plus optional configuration defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<SimConfig>,
    pub processes: Vec<ProcessSpec>,
}

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("failed to read workload `{}`: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse workload `{}`: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("workload `{}` defines no processes", .path.display())]
    Empty { path: PathBuf },
}

impl Workload {
    pub fn load(path: &Path) -> Result<Self, WorkloadError> {
        let text = std::fs::read_to_string(path).map_err(|source| WorkloadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let workload: Workload =
            serde_yaml::from_str(&text).map_err(|source| WorkloadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if workload.processes.is_empty() {
            return Err(WorkloadError::Empty {
                path: path.to_path_buf(),
            });
        }
        tracing::debug!(
            path = %path.display(),
            processes = workload.processes.len(),
            "workload loaded"
        );
        Ok(workload)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Generates `count` processes with ids starting at 1.
///
/// Priority is drawn from 1..=5, burst from 4..=14, arrival from 0..=6, pages from
/// 1..=4, and up to two distinct names from `resources`.
pub fn generate(count: usize, seed: Option<u64>, resources: &[String]) -> Vec<ProcessSpec> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    (1..=count)
        .map(|id| {
            let priority = rng.gen_range(1..=5);
            let burst = rng.gen_range(4..=14);
            let arrival = rng.gen_range(0..=6);
            let pages = rng.gen_range(1..=4);
            let wanted = rng.gen_range(0..=2).min(resources.len());
            let chosen: Vec<String> = resources
                .choose_multiple(&mut rng, wanted)
                .cloned()
                .collect();

            ProcessSpec::new(id as Pid, burst)
                .with_priority(priority)
                .with_arrival(arrival)
                .with_pages(pages)
                .with_resources(chosen)
        })
        .collect()
}
