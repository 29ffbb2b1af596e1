use std::collections::HashMap;

use super::Page;
use crate::config::ReplacementPolicy;
use crate::PageId;
use crate::Tick;

impl ReplacementPolicy {
    /// Ordering key; the resident page with the smallest key is evicted.
    pub(crate) fn victim_key(&self, page: &Page) -> Tick {
        match self {
            Self::Fifo => page.load_tick,
            Self::Lru => page.last_access_tick,
        }
    }

    /// Scans frames in ascending order and returns `(frame, page)` of the victim.
    ///
    /// Only a strictly smaller key replaces the current candidate, so ties go to the
    /// lowest frame index.
    pub(crate) fn select_victim(
        &self,
        frames: &[Option<PageId>],
        pages: &HashMap<PageId, Page>,
    ) -> Option<(usize, PageId)> {
        let mut victim: Option<(usize, PageId, Tick)> = None;
        for (frame, slot) in frames.iter().enumerate() {
            let Some(page_id) = slot else { continue };
            let Some(page) = pages.get(page_id) else {
                continue;
            };
            let key = self.victim_key(page);
            match victim {
                Some((_, _, best)) if best <= key => {}
                _ => victim = Some((frame, *page_id, key)),
            }
        }
        victim.map(|(frame, page_id, _)| (frame, page_id))
    }
}
