// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::TripId;

/// Checked rows plus the anchor for shift-click ranges.
///
/// Indices refer to positions in the current filtered and sorted view. The
/// anchor moves only on plain toggles; a range toggle leaves it where it was,
/// so consecutive shift-clicks all extend from the last individually clicked
/// row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    selected: BTreeSet<TripId>,
    anchor: Option<usize>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the row at `index`. With `range` set and an anchor present, the
    /// clicked row's new state is applied to every row between the anchor and
    /// `index`. Returns the new state, or `None` when `index` is outside the
    /// view.
    pub fn toggle(&mut self, view: &[TripId], index: usize, range: bool) -> Option<bool> {
        let id = *view.get(index)?;
        let checked = !self.selected.contains(&id);

        match self.anchor {
            Some(anchor) if range => {
                let anchor = anchor.min(view.len() - 1);
                let (start, end) = if anchor <= index {
                    (anchor, index)
                } else {
                    (index, anchor)
                };
                for id in &view[start..=end] {
                    self.set(*id, checked);
                }
            }
            _ => {
                self.set(id, checked);
                self.anchor = Some(index);
            }
        }
        Some(checked)
    }

    /// Replaces the selection with exactly the visible rows.
    pub fn select_all(&mut self, view: &[TripId]) {
        self.selected = view.iter().copied().collect();
    }

    pub fn clear_visible(&mut self, view: &[TripId]) {
        for id in view {
            self.selected.remove(id);
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.anchor = None;
    }

    pub fn is_all_selected(&self, view: &[TripId]) -> bool {
        !view.is_empty() && view.iter().all(|id| self.selected.contains(id))
    }

    pub fn is_selected(&self, id: TripId) -> bool {
        self.selected.contains(&id)
    }

    pub fn selected(&self) -> &BTreeSet<TripId> {
        &self.selected
    }

    pub fn anchor(&self) -> Option<usize> {
        self.anchor
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn remove(&mut self, ids: &BTreeSet<TripId>) {
        self.selected.retain(|id| !ids.contains(id));
    }

    /// Drops ids that are no longer in the collection.
    pub fn retain_existing(&mut self, existing: &BTreeSet<TripId>) {
        self.selected.retain(|id| existing.contains(id));
    }

    fn set(&mut self, id: TripId, checked: bool) {
        if checked {
            self.selected.insert(id);
        } else {
            self.selected.remove(&id);
        }
    }
}
