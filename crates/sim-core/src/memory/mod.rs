//! Demand paging over a fixed frame pool.
//!
//! The manager exclusively owns the frame table, every live page and the per-process page
//! tables. Callers pass the current tick into each operation that stamps a timestamp.

use std::collections::BTreeMap;
use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use serde::Serialize;

use crate::config::AccessPattern;
use crate::config::ReplacementPolicy;
use crate::error::Result;
use crate::error::SimError;
use crate::process::Process;
use crate::PageId;
use crate::Pid;
use crate::Tick;

mod page;
mod replacement;

pub use page::Page;

/// Result of making a page resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoadOutcome {
    /// Page was already resident; only its access time moved
    Hit,
    /// Page fault served by a free frame
    Loaded { frame: usize },
    /// Page fault that evicted `victim` from `frame`
    Replaced {
        frame: usize,
        victim: PageId,
        victim_owner: Pid,
    },
}

/// Result of [`MemoryManager::allocate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocOutcome {
    /// The process already had a page table
    AlreadyAllocated,
    /// Fresh pages were created and the first one loaded
    Allocated {
        pages: Vec<PageId>,
        first_load: LoadOutcome,
        first_page: PageId,
    },
}

/// Result of one simulated memory reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessOutcome {
    pub page: PageId,
    pub load: LoadOutcome,
}

/// Snapshot of frame usage and paging counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub total_frames: usize,
    pub occupied_frames: usize,
    pub free_frames: usize,
    /// Every load of a non-resident page, eager loads included
    pub page_faults: u64,
    pub replacements: u64,
    /// First-page loads by `allocate` that found a free frame
    pub eager_loads: u64,
    pub policy: ReplacementPolicy,
}

impl MemoryStats {
    /// Faults raised by references that found a free frame.
    pub fn demand_faults_without_eviction(&self) -> u64 {
        self.page_faults
            .saturating_sub(self.replacements)
            .saturating_sub(self.eager_loads)
    }
}

pub struct MemoryManager {
    policy: ReplacementPolicy,
    access_pattern: AccessPattern,
    frames: Vec<Option<PageId>>,
    pages: HashMap<PageId, Page>,
    page_tables: BTreeMap<Pid, Vec<PageId>>,
    // index of the page the last sequential reference touched
    cursors: HashMap<Pid, usize>,
    next_page_id: PageId,
    page_faults: u64,
    replacements: u64,
    eager_loads: u64,
    rng: StdRng,
}

impl MemoryManager {
    pub fn new(frames: usize, policy: ReplacementPolicy) -> Self {
        Self {
            policy,
            access_pattern: AccessPattern::Random,
            frames: vec![None; frames],
            pages: HashMap::new(),
            page_tables: BTreeMap::new(),
            cursors: HashMap::new(),
            next_page_id: 0,
            page_faults: 0,
            replacements: 0,
            eager_loads: 0,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_access_pattern(mut self, access_pattern: AccessPattern) -> Self {
        self.access_pattern = access_pattern;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn policy(&self) -> ReplacementPolicy {
        self.policy
    }

    pub fn access_pattern(&self) -> AccessPattern {
        self.access_pattern
    }

    /// Creates the process's pages and loads the first one. No-op when already allocated.
    pub fn allocate(&mut self, process: &mut Process, now: Tick) -> Result<AllocOutcome> {
        let pid = process.id();
        if self.page_tables.contains_key(&pid) {
            return Ok(AllocOutcome::AlreadyAllocated);
        }
        let count = process.memory_pages_required();
        if count == 0 {
            return Err(error_stack::report!(SimError::invalid_process(
                pid,
                "at least one page is required"
            )));
        }

        let pages: Vec<PageId> = (0..count)
            .map(|_| {
                let page_id = self.next_page_id;
                self.next_page_id += 1;
                self.pages.insert(page_id, Page::new(page_id, pid));
                page_id
            })
            .collect();
        self.page_tables.insert(pid, pages.clone());
        self.cursors.insert(pid, 0);
        process.set_assigned_pages(pages.iter().copied());

        let first_page = pages[0];
        let first_load = self.load(first_page, now)?;
        if matches!(first_load, LoadOutcome::Loaded { .. }) {
            self.eager_loads += 1;
        }
        tracing::debug!(pid, pages = count, tick = now, "allocated memory");

        Ok(AllocOutcome::Allocated {
            pages,
            first_load,
            first_page,
        })
    }

    /// Simulates one memory reference by the process.
    pub fn access(&mut self, process: &Process, now: Tick) -> Result<AccessOutcome> {
        let pid = process.id();
        let Some(table) = self.page_tables.get(&pid) else {
            return Err(error_stack::report!(SimError::NotAllocated { pid }));
        };
        if table.is_empty() {
            return Err(error_stack::report!(SimError::NotAllocated { pid }));
        }
        let index = match self.access_pattern {
            AccessPattern::Random => self.rng.gen_range(0..table.len()),
            AccessPattern::Sequential => {
                let cursor = self.cursors.entry(pid).or_insert(0);
                *cursor = (*cursor + 1) % table.len();
                *cursor
            }
        };
        let page = table[index];
        let load = self.load(page, now)?;
        Ok(AccessOutcome { page, load })
    }

    /// Makes `page` resident, faulting it in when needed.
    pub fn load(&mut self, page_id: PageId, now: Tick) -> Result<LoadOutcome> {
        let free = self.free_frame();
        let Some(page) = self.pages.get_mut(&page_id) else {
            return Err(error_stack::report!(SimError::UnknownPage { page: page_id }));
        };
        if page.is_resident() {
            page.touch(now);
            return Ok(LoadOutcome::Hit);
        }

        match free {
            Some(frame) => {
                page.bind(frame, now);
                self.frames[frame] = Some(page_id);
                self.page_faults += 1;
                tracing::debug!(page = page_id, frame, tick = now, "page fault served by free frame");
                Ok(LoadOutcome::Loaded { frame })
            }
            None => self.replace(page_id, now),
        }
    }

    /// Evicts one resident page chosen by the configured policy and loads `incoming` in
    /// its frame.
    pub fn replace(&mut self, incoming: PageId, now: Tick) -> Result<LoadOutcome> {
        if !self.pages.contains_key(&incoming) {
            return Err(error_stack::report!(SimError::UnknownPage { page: incoming }));
        }
        let Some((frame, victim)) = self.policy.select_victim(&self.frames, &self.pages) else {
            return Err(error_stack::report!(SimError::NoVictim));
        };

        let victim_owner = match self.pages.get_mut(&victim) {
            Some(page) => {
                page.evict();
                page.owner
            }
            None => return Err(error_stack::report!(SimError::UnknownPage { page: victim })),
        };
        if let Some(page) = self.pages.get_mut(&incoming) {
            page.bind(frame, now);
        }
        self.frames[frame] = Some(incoming);
        self.page_faults += 1;
        self.replacements += 1;
        tracing::debug!(
            policy = %self.policy,
            victim,
            victim_owner,
            incoming,
            frame,
            tick = now,
            "replaced page"
        );

        Ok(LoadOutcome::Replaced {
            frame,
            victim,
            victim_owner,
        })
    }

    /// Frees every frame held by the process and drops its page table.
    /// Returns the number of frames freed.
    pub fn release(&mut self, process: &mut Process, now: Tick) -> usize {
        let pid = process.id();
        let Some(table) = self.page_tables.remove(&pid) else {
            return 0;
        };
        let mut freed = 0;
        for page_id in table {
            if let Some(page) = self.pages.remove(&page_id) {
                if let Some(frame) = page.frame_index {
                    self.frames[frame] = None;
                    freed += 1;
                }
            }
        }
        self.cursors.remove(&pid);
        process.clear_assigned_pages();
        tracing::debug!(pid, freed, tick = now, "released memory");
        freed
    }

    /// First free frame by ascending index.
    fn free_frame(&self) -> Option<usize> {
        self.frames.iter().position(Option::is_none)
    }

    pub fn is_allocated(&self, pid: Pid) -> bool {
        self.page_tables.contains_key(&pid)
    }

    pub fn frames(&self) -> &[Option<PageId>] {
        &self.frames
    }

    /// Owner of the page in `frame`, if occupied.
    pub fn frame_owner(&self, frame: usize) -> Option<Pid> {
        let page_id = self.frames.get(frame).copied().flatten()?;
        self.pages.get(&page_id).map(|p| p.owner)
    }

    pub fn page(&self, page_id: PageId) -> Option<&Page> {
        self.pages.get(&page_id)
    }

    pub fn pages_of(&self, pid: Pid) -> Option<&[PageId]> {
        self.page_tables.get(&pid).map(Vec::as_slice)
    }

    pub fn occupied_frames(&self) -> usize {
        self.frames.iter().filter(|f| f.is_some()).count()
    }

    pub fn resident_pages(&self) -> usize {
        self.pages.values().filter(|p| p.is_resident()).count()
    }

    pub fn page_faults(&self) -> u64 {
        self.page_faults
    }

    pub fn replacements(&self) -> u64 {
        self.replacements
    }

    pub fn stats(&self) -> MemoryStats {
        let occupied = self.occupied_frames();
        MemoryStats {
            total_frames: self.frames.len(),
            occupied_frames: occupied,
            free_frames: self.frames.len() - occupied,
            page_faults: self.page_faults,
            replacements: self.replacements,
            eager_loads: self.eager_loads,
            policy: self.policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;
    use crate::process::ProcessSpec;

    fn process(id: Pid, pages: usize) -> Process {
        Process::new(ProcessSpec::new(id, 10).with_pages(pages))
    }

    fn assert_consistent(mm: &MemoryManager) {
        assert!(mm.occupied_frames() <= mm.frames().len());
        assert_eq!(mm.occupied_frames(), mm.resident_pages());
        for (frame, slot) in mm.frames().iter().enumerate() {
            if let Some(page_id) = slot {
                assert_eq!(mm.page(*page_id).unwrap().frame_index(), Some(frame));
            }
        }
    }

    #[test]
    fn allocate_creates_pages_and_loads_first() {
        let mut mm = MemoryManager::new(4, ReplacementPolicy::Fifo);
        let mut p = process(1, 3);

        let outcome = mm.allocate(&mut p, 1).unwrap();
        assert_eq!(
            outcome,
            AllocOutcome::Allocated {
                pages: vec![0, 1, 2],
                first_load: LoadOutcome::Loaded { frame: 0 },
                first_page: 0,
            }
        );
        assert_eq!(p.assigned_page_ids().len(), 3);
        assert_eq!(mm.frames()[0], Some(0));
        assert_eq!(mm.page_faults(), 1);
        assert_consistent(&mm);
    }

    #[test]
    fn allocate_is_idempotent() {
        let mut mm = MemoryManager::new(4, ReplacementPolicy::Fifo);
        let mut p = process(1, 2);

        mm.allocate(&mut p, 1).unwrap();
        let frames_before = mm.frames().to_vec();
        let outcome = mm.allocate(&mut p, 2).unwrap();

        assert_eq!(outcome, AllocOutcome::AlreadyAllocated);
        assert_eq!(mm.frames(), frames_before.as_slice());
        assert_eq!(mm.pages_of(1).unwrap().len(), 2);
        assert_eq!(mm.page_faults(), 1);
    }

    #[test]
    fn page_ids_are_globally_unique() {
        let mut mm = MemoryManager::new(4, ReplacementPolicy::Fifo);
        let mut a = process(1, 2);
        let mut b = process(2, 2);
        mm.allocate(&mut a, 1).unwrap();
        mm.allocate(&mut b, 1).unwrap();
        assert!(a.assigned_page_ids().is_disjoint(b.assigned_page_ids()));
    }

    #[test]
    fn load_of_resident_page_only_touches() {
        let mut mm = MemoryManager::new(2, ReplacementPolicy::Lru);
        let mut p = process(1, 1);
        mm.allocate(&mut p, 1).unwrap();

        assert_eq!(mm.load(0, 5).unwrap(), LoadOutcome::Hit);
        let page = mm.page(0).unwrap();
        assert_eq!(page.load_tick(), 1);
        assert_eq!(page.last_access_tick(), 5);
        assert_eq!(mm.page_faults(), 1);
    }

    #[test]
    fn faults_fill_free_frames_before_replacing() {
        let mut mm = MemoryManager::new(3, ReplacementPolicy::Fifo);
        let mut p = process(1, 4);
        mm.allocate(&mut p, 1).unwrap();

        assert_eq!(mm.load(2, 2).unwrap(), LoadOutcome::Loaded { frame: 1 });
        assert_eq!(mm.load(1, 3).unwrap(), LoadOutcome::Loaded { frame: 2 });
        assert_eq!(mm.page(1).unwrap().load_tick(), 3);
        assert_eq!(mm.stats().free_frames, 0);
        assert!(matches!(
            mm.load(3, 4).unwrap(),
            LoadOutcome::Replaced { victim: 0, .. }
        ));
        assert_eq!(mm.replacements(), 1);
        assert_consistent(&mm);
    }

    #[test]
    fn fifo_replacement_evicts_oldest_load() {
        let mut mm = MemoryManager::new(2, ReplacementPolicy::Fifo);
        let mut p = process(1, 3);
        mm.allocate(&mut p, 1).unwrap();
        mm.load(1, 2).unwrap();
        // touching page 0 must not matter under FIFO
        mm.load(0, 3).unwrap();

        let outcome = mm.load(2, 4).unwrap();
        assert_eq!(
            outcome,
            LoadOutcome::Replaced {
                frame: 0,
                victim: 0,
                victim_owner: 1,
            }
        );
        assert!(!mm.page(0).unwrap().is_resident());
        assert_eq!(mm.page(2).unwrap().frame_index(), Some(0));
        assert_eq!(mm.replacements(), 1);
        assert_eq!(mm.page_faults(), 3);
        assert_consistent(&mm);
    }

    #[test]
    fn lru_replacement_evicts_least_recent_access() {
        let mut mm = MemoryManager::new(2, ReplacementPolicy::Lru);
        let mut p = process(1, 3);
        mm.allocate(&mut p, 1).unwrap();
        mm.load(1, 2).unwrap();
        mm.load(0, 3).unwrap();

        let outcome = mm.load(2, 4).unwrap();
        assert_eq!(
            outcome,
            LoadOutcome::Replaced {
                frame: 1,
                victim: 1,
                victim_owner: 1,
            }
        );
        assert_consistent(&mm);
    }

    #[test]
    fn replace_without_residents_fails() {
        let mut mm = MemoryManager::new(1, ReplacementPolicy::Fifo);
        let mut p = process(1, 1);
        mm.allocate(&mut p, 1).unwrap();
        mm.release(&mut p, 2);

        let mut q = process(2, 1);
        mm.allocate(&mut q, 3).unwrap();
        // evict q's page by hand so nothing is resident
        mm.frames[0] = None;
        mm.pages.get_mut(&1).unwrap().evict();

        let err = mm.replace(1, 4).unwrap_err();
        assert_eq!(err.current_context(), &SimError::NoVictim);
    }

    #[test]
    fn sequential_access_walks_pages() {
        let mut mm =
            MemoryManager::new(4, ReplacementPolicy::Fifo).with_access_pattern(AccessPattern::Sequential);
        let mut p = process(1, 3);
        mm.allocate(&mut p, 1).unwrap();

        let touched: Vec<PageId> = (2..6).map(|t| mm.access(&p, t).unwrap().page).collect();
        assert_eq!(touched, vec![1, 2, 0, 1]);
        assert_eq!(mm.page_faults(), 3);
    }

    #[test]
    fn random_access_is_reproducible_with_seed() {
        let run = || {
            let mut mm = MemoryManager::new(2, ReplacementPolicy::Lru).with_seed(42);
            let mut p = process(1, 5);
            mm.allocate(&mut p, 1).unwrap();
            (2..20).map(|t| mm.access(&p, t).unwrap().page).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn access_without_allocation_fails() {
        let mut mm = MemoryManager::new(2, ReplacementPolicy::Fifo);
        let p = process(7, 1);
        let err = mm.access(&p, 1).unwrap_err();
        assert_eq!(err.current_context(), &SimError::NotAllocated { pid: 7 });
    }

    #[test]
    fn release_frees_frames_and_table() {
        let mut mm = MemoryManager::new(3, ReplacementPolicy::Fifo);
        let mut a = process(1, 2);
        let mut b = process(2, 1);
        mm.allocate(&mut a, 1).unwrap();
        mm.load(1, 1).unwrap();
        mm.allocate(&mut b, 2).unwrap();

        assert_eq!(mm.release(&mut a, 3), 2);
        assert!(!mm.is_allocated(1));
        assert!(a.assigned_page_ids().is_empty());
        assert_eq!(mm.occupied_frames(), 1);
        assert_eq!(mm.frame_owner(2), Some(2));
        assert_eq!(mm.release(&mut a, 4), 0);
        assert_consistent(&mm);
    }

    #[test]
    fn two_frames_three_distinct_loads_force_one_replacement() {
        let mut mm =
            MemoryManager::new(2, ReplacementPolicy::Fifo).with_access_pattern(AccessPattern::Sequential);
        let mut a = process(1, 3);
        let mut b = process(2, 1);

        mm.allocate(&mut a, 1).unwrap();
        mm.access(&a, 1).unwrap();
        mm.allocate(&mut b, 2).unwrap();
        mm.access(&b, 2).unwrap();

        let stats = mm.stats();
        assert_eq!(stats.replacements, 1);
        assert_eq!(stats.page_faults, 3);
        assert_eq!(stats.demand_faults_without_eviction(), 1);
        assert_eq!(stats.occupied_frames, 2);
        assert_consistent(&mm);
    }
}
