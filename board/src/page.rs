//! Page collection and per-page stroke stores.
//!
//! DESIGN
//! ======
//! Exactly one page is current at any time and the set is never empty.
//! A stroke list only grows by append or shrinks by pop-last/clear; there
//! is no reordering, which is what makes the undo broadcast protocol sound
//! as long as peers stay in step. When a peer detects it has fallen out of
//! step, the page is flagged diverged so the shell can reload it from the
//! durable store instead of drifting silently.

#[cfg(test)]
#[path = "page_test.rs"]
mod page_test;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wire::{PageInfo, StrokeData};

/// One whiteboard page: metadata plus its ordered stroke list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Page {
    pub info: PageInfo,
    pub strokes: Vec<StrokeData>,
}

impl Page {
    #[must_use]
    pub fn new(info: PageInfo) -> Self {
        Self { info, strokes: Vec::new() }
    }

    #[must_use]
    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }
}

/// The ordered, navigable page collection.
#[derive(Clone, Debug)]
pub struct PageSet {
    pages: Vec<Page>,
    current: usize,
    diverged: HashSet<Uuid>,
}

impl PageSet {
    /// Create a set holding a single page, which becomes current.
    #[must_use]
    pub fn new(first: PageInfo) -> Self {
        Self { pages: vec![Page::new(first)], current: 0, diverged: HashSet::new() }
    }

    /// Replace the whole collection with a loaded snapshot. The first page
    /// becomes current; an empty snapshot is ignored.
    pub fn load(&mut self, pages: Vec<Page>) {
        if pages.is_empty() {
            return;
        }
        self.pages = pages;
        self.current = 0;
        self.diverged.clear();
    }

    /// Append a page and navigate to it.
    pub fn add_page(&mut self, info: PageInfo) {
        self.pages.push(Page::new(info));
        self.current = self.pages.len() - 1;
        self.renumber();
    }

    /// Make the page with this id current. Returns false if absent.
    pub fn navigate_to(&mut self, page_id: Uuid) -> bool {
        let Some(idx) = self.pages.iter().position(|p| p.info.id == page_id) else {
            return false;
        };
        self.current = idx;
        true
    }

    /// Remove a page. The last remaining page cannot be deleted. The
    /// current pointer is clamped to a still-valid page.
    pub fn delete_page(&mut self, page_id: Uuid) -> bool {
        if self.pages.len() <= 1 {
            return false;
        }
        let Some(idx) = self.pages.iter().position(|p| p.info.id == page_id) else {
            return false;
        };
        self.pages.remove(idx);
        self.diverged.remove(&page_id);
        if self.current >= self.pages.len() {
            self.current = self.pages.len() - 1;
        } else if idx < self.current {
            self.current -= 1;
        }
        self.renumber();
        true
    }

    fn renumber(&mut self) {
        for (idx, page) in self.pages.iter_mut().enumerate() {
            page.info.page_number = u32::try_from(idx + 1).unwrap_or(u32::MAX);
        }
    }

    #[must_use]
    pub fn current(&self) -> &Page {
        &self.pages[self.current]
    }

    #[must_use]
    pub fn current_id(&self) -> Uuid {
        self.pages[self.current].info.id
    }

    #[must_use]
    pub fn page(&self, page_id: Uuid) -> Option<&Page> {
        self.pages.iter().find(|p| p.info.id == page_id)
    }

    fn page_mut(&mut self, page_id: Uuid) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| p.info.id == page_id)
    }

    #[must_use]
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Append a committed stroke. Returns false if the page is unknown.
    pub fn append_stroke(&mut self, page_id: Uuid, stroke: StrokeData) -> bool {
        let Some(page) = self.page_mut(page_id) else {
            return false;
        };
        page.strokes.push(stroke);
        true
    }

    /// Remove and return the most recently appended stroke.
    pub fn pop_last(&mut self, page_id: Uuid) -> Option<StrokeData> {
        self.page_mut(page_id)?.strokes.pop()
    }

    /// Wipe the stroke list of one page, returning how many were removed.
    pub fn clear_page(&mut self, page_id: Uuid) -> usize {
        let Some(page) = self.page_mut(page_id) else {
            return 0;
        };
        let removed = page.strokes.len();
        page.strokes.clear();
        removed
    }

    /// Flag a page whose stroke list no longer matches the sender's.
    pub fn mark_diverged(&mut self, page_id: Uuid) {
        self.diverged.insert(page_id);
    }

    /// Clear the divergence flag after a reload from the durable store.
    pub fn clear_diverged(&mut self, page_id: Uuid) {
        self.diverged.remove(&page_id);
    }

    #[must_use]
    pub fn is_diverged(&self, page_id: Uuid) -> bool {
        self.diverged.contains(&page_id)
    }
}
