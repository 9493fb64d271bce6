//! Link validation

use std::collections::BTreeSet;

use reqwest::Url;
use shared::WorkItem;

use crate::state::{LinkKey, WorkSession};

/// A link is valid when it parses as an absolute `http`/`https` URL with a host
pub fn is_valid_link(link: &str) -> bool {
    match Url::parse(link.trim()) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.has_host(),
        Err(_) => false,
    }
}

/// Keys of every non-blank invalid link, in slot then link order
pub fn invalid_links(items: &[WorkItem]) -> BTreeSet<LinkKey> {
    items
        .iter()
        .enumerate()
        .flat_map(|(item, work)| {
            work.links
                .iter()
                .enumerate()
                .filter(|(_, link)| !link.trim().is_empty() && !is_valid_link(link))
                .map(move |(link, _)| LinkKey::new(item, link))
        })
        .collect()
}

impl WorkSession {
    /// Validate every link, replacing the error set.
    ///
    /// Returns the first invalid key so the caller can focus it.
    pub fn validate_links(&mut self) -> Result<(), LinkKey> {
        self.link_errors = invalid_links(&self.items);
        match self.link_errors.first() {
            Some(first) => Err(*first),
            None => Ok(()),
        }
    }

    /// Re-check a single link after it was edited
    pub(crate) fn check_link(&mut self, key: LinkKey, link: &str) {
        if !link.trim().is_empty() && !is_valid_link(link) {
            self.link_errors.insert(key);
        } else {
            self.link_errors.remove(&key);
        }
    }
}
