//! Item edits and date navigation

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use shared::MAX_LINKS_PER_ITEM;

use crate::state::{LinkKey, WorkSession};

/// One user edit. `slot` and `link` are 0-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Edit {
    Plan { slot: usize, text: String },
    Result { slot: usize, text: String },
    Link { slot: usize, link: usize, url: String },
    AddLink { slot: usize },
    RemoveLink { slot: usize, link: usize },
}

impl Edit {
    pub fn slot(&self) -> usize {
        match self {
            Self::Plan { slot, .. }
            | Self::Result { slot, .. }
            | Self::Link { slot, .. }
            | Self::AddLink { slot }
            | Self::RemoveLink { slot, .. } => *slot,
        }
    }
}

impl WorkSession {
    /// Apply an edit to the slots.
    ///
    /// Returns `false` when the edit addressed nothing and was ignored.
    pub fn apply_edit(&mut self, edit: Edit) -> bool {
        let slot = edit.slot();
        let Some(item) = self.items.get_mut(slot) else {
            tracing::warn!(slot, "Ignoring edit for out-of-range slot");
            return false;
        };

        match edit {
            Edit::Plan { text, .. } => item.plan = text,
            Edit::Result { text, .. } => item.result = text,
            Edit::Link { link, url, .. } => {
                if link > item.links.len() || link >= MAX_LINKS_PER_ITEM {
                    tracing::warn!(slot, link, "Ignoring edit for out-of-range link");
                    return false;
                }
                if link == item.links.len() {
                    item.links.push(url.clone());
                } else {
                    item.links[link] = url.clone();
                }
                self.check_link(LinkKey::new(slot, link), &url);
            }
            Edit::AddLink { .. } => {
                if item.links.len() >= MAX_LINKS_PER_ITEM {
                    return false;
                }
                item.links.push(String::new());
            }
            Edit::RemoveLink { link, .. } => {
                if link >= item.links.len() {
                    return false;
                }
                item.links.remove(link);
                self.shift_link_errors(slot, link);
            }
        }

        self.refresh_dirty();
        true
    }

    /// Drop the removed link's error and move later links of the slot down by one
    fn shift_link_errors(&mut self, slot: usize, removed: usize) {
        self.link_errors = std::mem::take(&mut self.link_errors)
            .into_iter()
            .filter_map(|key| {
                if key.item != slot || key.link < removed {
                    Some(key)
                } else if key.link == removed {
                    None
                } else {
                    Some(LinkKey::new(slot, key.link - 1))
                }
            })
            .collect();
    }
}

/// Target of a date switch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTarget {
    Exact(NaiveDate),
    Previous,
    Next,
    Today,
}

impl DateTarget {
    /// Resolve against the currently selected date, by calendar day
    pub fn resolve(self, current: NaiveDate) -> NaiveDate {
        match self {
            Self::Exact(date) => date,
            Self::Previous => current.checked_sub_days(Days::new(1)).unwrap_or(current),
            Self::Next => current.checked_add_days(Days::new(1)).unwrap_or(current),
            Self::Today => shared::util::today(),
        }
    }
}
