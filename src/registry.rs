use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::debug;

use crate::agent::AgentError;
use crate::browser::BrowserPage;

/// Hyperlinks, buttons, ARIA buttons and anything with an inline click handler.
pub const CLICKABLE_SELECTOR: &str = r#"a, button, [role="button"], [onclick]"#;

/// An element handle tied to the registry generation that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    pub generation: u64,
    pub index: usize,
}

/// Handle -> visible text for one registry generation.
///
/// Serializes as a JSON object keyed by handle, e.g. `{"0":"More information..."}`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelMap {
    generation: u64,
    labels: BTreeMap<usize, String>,
}

impl LabelMap {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(&index).map(String::as_str)
    }

    /// Handle for `index` if this map announced it.
    pub fn handle(&self, index: usize) -> Option<Handle> {
        self.labels
            .contains_key(&index)
            .then_some(Handle { generation: self.generation, index })
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &str)> + '_ {
        self.labels
            .iter()
            .map(move |(i, t)| (Handle { generation: self.generation, index: *i }, t.as_str()))
    }
}

impl Serialize for LabelMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.labels.serialize(serializer)
    }
}

/// Collapse every run of whitespace to a single space and trim the ends.
pub fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Catalog of the clickable elements on the current page.
///
/// Each `rebuild` replaces the whole table and bumps the generation, so any
/// handle issued before it stops resolving.
pub struct ElementRegistry<E> {
    generation: u64,
    elements: Vec<E>,
}

impl<E> Default for ElementRegistry<E> {
    fn default() -> Self {
        Self { generation: 0, elements: Vec::new() }
    }
}

impl<E> ElementRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Bind a raw index (as the model sends it) to the current generation.
    pub fn handle(&self, index: usize) -> Handle {
        Handle { generation: self.generation, index }
    }

    pub async fn rebuild<P>(&mut self, page: &P) -> Result<LabelMap, AgentError>
    where
        P: BrowserPage<Element = E>,
    {
        let matched = page.query_selector_all(CLICKABLE_SELECTOR).await?;
        let total = matched.len();
        let mut elements = Vec::new();
        let mut labels = BTreeMap::new();
        for element in matched {
            let text = normalize_text(&page.inner_text(&element).await?);
            // Visibility is the expensive check, only ask once text passed.
            if text.is_empty() || !page.is_visible(&element).await? {
                continue;
            }
            labels.insert(elements.len(), text);
            elements.push(element);
        }

        self.generation += 1;
        self.elements = elements;
        debug!(
            generation = self.generation,
            matched = total,
            clickable = labels.len(),
            "element registry rebuilt"
        );
        Ok(LabelMap { generation: self.generation, labels })
    }

    pub fn resolve(&self, handle: Handle) -> Result<&E, AgentError> {
        if handle.generation != self.generation {
            return Err(self.stale(handle));
        }
        self.elements.get(handle.index).ok_or_else(|| self.stale(handle))
    }

    fn stale(&self, handle: Handle) -> AgentError {
        AgentError::StaleHandle {
            index: handle.index,
            generation: handle.generation,
            current: self.generation,
        }
    }
}
