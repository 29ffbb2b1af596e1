use std::fmt;

use serde::Serialize;

use crate::PageId;
use crate::Pid;
use crate::Tick;

/// One page of a process's virtual memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub(crate) page_id: PageId,
    pub(crate) owner: Pid,
    pub(crate) frame_index: Option<usize>,
    pub(crate) load_tick: Tick,
    pub(crate) last_access_tick: Tick,
}

impl Page {
    pub(crate) fn new(page_id: PageId, owner: Pid) -> Self {
        Self {
            page_id,
            owner,
            frame_index: None,
            load_tick: 0,
            last_access_tick: 0,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn owner_process_id(&self) -> Pid {
        self.owner
    }

    pub fn is_resident(&self) -> bool {
        self.frame_index.is_some()
    }

    pub fn frame_index(&self) -> Option<usize> {
        self.frame_index
    }

    pub fn load_tick(&self) -> Tick {
        self.load_tick
    }

    pub fn last_access_tick(&self) -> Tick {
        self.last_access_tick
    }

    pub(crate) fn bind(&mut self, frame: usize, now: Tick) {
        self.frame_index = Some(frame);
        self.load_tick = now;
        self.last_access_tick = now;
    }

    pub(crate) fn evict(&mut self) {
        self.frame_index = None;
    }

    pub(crate) fn touch(&mut self, now: Tick) {
        self.last_access_tick = now;
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pg{}(P{})", self.page_id, self.owner)
    }
}
