//! Segment trie for parameterized routes.
//!
//! Each node holds one path segment. Children keep their insertion order and
//! lookup tries them in that order: the first child that structurally matches
//! wins, whether it is a literal, a parameter or a wildcard. Registration
//! order at each level is therefore authoritative, and a literal registered
//! after a parameter at the same level is shadowed by it.

use crate::path::{PathSegment, Segments, WILDCARD_KEY};
use crate::request::Params;

/// One node of the trie.
///
/// A wildcard node never has children.
#[derive(Debug)]
struct Node<T> {
    part: String,
    is_param: bool,
    is_wild: bool,
    children: Vec<Node<T>>,
    terminal: Option<Terminal<T>>,
}

/// The value attached to a node that ends a registered route.
#[derive(Debug)]
struct Terminal<T> {
    path: String,
    value: T,
}

impl<T> Node<T> {
    fn root() -> Self {
        Self {
            part: String::new(),
            is_param: false,
            is_wild: false,
            children: Vec::new(),
            terminal: None,
        }
    }

    fn child_index(&self, segment: &PathSegment) -> Option<usize> {
        self.children.iter().position(|child| {
            child.part == segment.text()
                && child.is_param == segment.is_param()
                && child.is_wild == segment.is_wild()
        })
    }

    fn child_mut(&mut self, segment: &PathSegment) -> &mut Self {
        let index = match self.child_index(segment) {
            Some(index) => index,
            None => {
                self.children.push(Self {
                    part: segment.text().to_string(),
                    is_param: segment.is_param(),
                    is_wild: segment.is_wild(),
                    children: Vec::new(),
                    terminal: None,
                });
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    fn find(&self, segments: &Segments<'_>, depth: usize, params: &mut Params) -> Option<&Self> {
        let Some(part) = segments.get(depth) else {
            return self.terminal.as_ref().map(|_| self);
        };

        for child in &self.children {
            if child.is_wild {
                params.insert(WILDCARD_KEY, segments.join_from(depth));
                return Some(child);
            }

            if child.is_param {
                params.insert(child.part.as_str(), part);
                if let Some(found) = child.find(segments, depth + 1, params) {
                    return Some(found);
                }
                params.remove(&child.part);
            } else if child.part == part {
                if let Some(found) = child.find(segments, depth + 1, params) {
                    return Some(found);
                }
            }
        }

        None
    }
}

/// A route trie for one HTTP method.
#[derive(Debug)]
pub struct Trie<T> {
    root: Node<T>,
    len: usize,
}

impl<T> Default for Trie<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Trie<T> {
    /// Creates an empty trie.
    pub fn new() -> Self {
        Self {
            root: Node::root(),
            len: 0,
        }
    }

    /// Attaches `value` to the node reached by `segments`, creating nodes as
    /// needed. Inserting the same pattern twice replaces the earlier value.
    pub fn insert(&mut self, segments: &[PathSegment], path: &str, value: T) {
        let mut node = &mut self.root;
        for segment in segments {
            node = node.child_mut(segment);
        }
        if node.terminal.is_none() {
            self.len += 1;
        }
        node.terminal = Some(Terminal {
            path: path.to_string(),
            value,
        });
    }

    /// Walks the trie for `segments`, binding captured parameters into
    /// `params`.
    ///
    /// Returns the registered path and value of the matching route.
    pub fn find<'t>(&'t self, segments: &Segments<'_>, params: &mut Params) -> Option<(&'t str, &'t T)> {
        let node = self.root.find(segments, 0, params)?;
        let terminal = node.terminal.as_ref()?;
        Some((terminal.path.as_str(), &terminal.value))
    }

    /// Number of routes stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no route is stored.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
