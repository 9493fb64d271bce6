//! Work Item Model (one planned/reported task slot)

use serde::{Deserialize, Serialize};

/// Number of fixed work item slots per report
pub const WORK_ITEM_SLOTS: usize = 10;
/// Maximum links attached to one work item
pub const MAX_LINKS_PER_ITEM: usize = 3;

/// One slot of a daily report.
///
/// `id` is the 1-based slot position, not a database key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: u32,
    #[serde(rename = "ke_hoach", default, skip_serializing_if = "String::is_empty")]
    pub plan: String,
    #[serde(rename = "ket_qua", default, skip_serializing_if = "String::is_empty")]
    pub result: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
}

impl WorkItem {
    /// A blank slot
    pub fn blank(id: u32) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// True when plan, result and every link are blank
    pub fn is_empty(&self) -> bool {
        self.plan.trim().is_empty()
            && self.result.trim().is_empty()
            && self.links.iter().all(|link| link.trim().is_empty())
    }

    /// Copy suitable for persistence: blank links are dropped
    pub fn persistable(&self) -> Self {
        Self {
            id: self.id,
            plan: self.plan.clone(),
            result: self.result.clone(),
            links: self
                .links
                .iter()
                .filter(|link| !link.trim().is_empty())
                .cloned()
                .collect(),
        }
    }
}

/// The ten blank slots, ids 1..=10
pub fn default_work_items() -> Vec<WorkItem> {
    (1..=WORK_ITEM_SLOTS as u32).map(WorkItem::blank).collect()
}

/// Keep non-empty items only, in order, with blank links removed
pub fn filter_work_items(items: &[WorkItem]) -> Vec<WorkItem> {
    items
        .iter()
        .filter(|item| !item.is_empty())
        .map(WorkItem::persistable)
        .collect()
}

/// Expand a persisted item list back into ten slots.
///
/// Slot `n` is the item whose id is `n`; slots with no matching item are blank.
pub fn pad_work_items(items: &[WorkItem]) -> Vec<WorkItem> {
    (1..=WORK_ITEM_SLOTS as u32)
        .map(|id| {
            items
                .iter()
                .find(|item| item.id == id)
                .cloned()
                .unwrap_or_else(|| WorkItem::blank(id))
        })
        .collect()
}
