//! Collects the ordered set of tagged elements under a root.
//!
//! Store grouping depends on this ordering, so collection always walks the
//! tree in document order (pre-order). An element whose tag value ends with
//! the block marker is skipped along with its entire subtree; nested markers
//! never re-admit descendants.

use crate::dom::{Document, NodeId};

/// Trailing character on a tag value that excludes the element and its
/// descendants from collection.
pub const BLOCK_MARKER: char = '!';

/// The content tag: the configured `data-<suffix>` attribute whose value
/// names the store an element belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentTag {
    attribute: String,
}

impl ContentTag {
    pub fn new(suffix: &str) -> ContentTag {
        ContentTag {
            attribute: format!("data-{}", suffix),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// The raw tag value carried by an element, marker included.
    pub fn value_of<'a>(&self, document: &'a Document, id: NodeId) -> Option<&'a str> {
        document.attribute(id, &self.attribute)
    }

    /// The store name carried by an element. The marker is a single trailing
    /// character: only one is stripped, so `"a!!"` names the store `"a!"`.
    pub fn store_name<'a>(&self, document: &'a Document, id: NodeId) -> Option<&'a str> {
        self.value_of(document, id)
            .map(|value| value.strip_suffix(BLOCK_MARKER).unwrap_or(value))
    }

    pub fn is_blocked(&self, document: &Document, id: NodeId) -> bool {
        self.value_of(document, id)
            .map_or(false, |value| value.ends_with(BLOCK_MARKER))
    }

    /// Appends the block marker to an element's tag value so that a
    /// re-collection running mid-swap does not pick it up.
    pub fn mark_blocked(&self, document: &mut Document, id: NodeId) {
        if let Some(value) = self.value_of(document, id) {
            if !value.ends_with(BLOCK_MARKER) {
                let mut marked = value.to_owned();
                marked.push(BLOCK_MARKER);
                document.set_attribute(id, &self.attribute, &marked);
            }
        }
    }

    /// Strips the block marker again once the swap has finished. Removes
    /// exactly one marker, mirroring `mark_blocked`.
    pub fn unmark_blocked(&self, document: &mut Document, id: NodeId) {
        let unmarked = match self
            .value_of(document, id)
            .and_then(|value| value.strip_suffix(BLOCK_MARKER))
        {
            Some(unmarked) => unmarked.to_owned(),
            None => return,
        };

        document.set_attribute(id, &self.attribute, &unmarked);
    }
}

/// Returns every tagged element under `root` in document order, excluding
/// blocked subtrees. `root` itself is never part of the result; a root that
/// isn't in the document yields an empty list rather than an error.
pub fn collect(document: &Document, root: NodeId, tag: &ContentTag) -> Vec<NodeId> {
    let mut output = Vec::new();

    let mut stack: Vec<NodeId> = match document.get(root) {
        Some(node) => node.children().iter().rev().copied().collect(),
        None => return output,
    };

    while let Some(next) = stack.pop() {
        // A blocked element hides its whole subtree, so its children are
        // never even visited.
        if tag.is_blocked(document, next) {
            continue;
        }

        if tag.value_of(document, next).is_some() {
            output.push(next);
        }

        if let Some(node) = document.get(next) {
            stack.extend(node.children().iter().rev().copied());
        }
    }

    output
}
