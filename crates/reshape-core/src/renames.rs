//! Historical field names
//!
//! [`RenameChain`] records every `(old, new)` pair in declaration order,
//! together with the pipeline position of the mutator that declared it. Pairs
//! link into chains: `(a, b)` followed by `(b, c)` makes `{a, b, c}` the names
//! one field has carried. A chain only links forward in time, so a name freed
//! by a rename and declared again later starts a lineage of its own. Every
//! walk keeps a visited set so a field renamed back to an earlier name cannot
//! loop.

use im::Vector;
use std::collections::HashSet;

/// One declared rename
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenamePair {
    old: String,
    new: String,
}

impl RenamePair {
    /// Create rename pair
    #[inline]
    #[must_use]
    pub fn new(old: impl Into<String>, new: impl Into<String>) -> Self {
        Self {
            old: old.into(),
            new: new.into(),
        }
    }

    /// Name before the rename
    #[inline]
    #[must_use]
    pub fn old(&self) -> &str {
        &self.old
    }

    /// Name after the rename
    #[inline]
    #[must_use]
    pub fn new_name(&self) -> &str {
        &self.new
    }
}

impl<O: Into<String>, N: Into<String>> From<(O, N)> for RenamePair {
    fn from((old, new): (O, N)) -> Self {
        Self::new(old, new)
    }
}

/// Ordered history of renames, each tagged with its declaring position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameChain(Vector<(usize, RenamePair)>);

impl RenameChain {
    /// Empty chain
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Vector::new())
    }

    /// Chain with `old -> new` appended, declared by the mutator at `position`
    #[must_use]
    pub fn append(&self, old: impl Into<String>, new: impl Into<String>, position: usize) -> Self {
        let mut pairs = self.0.clone();
        pairs.push_back((position, RenamePair::new(old, new)));
        Self(pairs)
    }

    /// Name `name` was most recently renamed to
    #[must_use]
    pub fn successor(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(_, pair)| pair.old == name)
            .map(|(_, pair)| pair.new.as_str())
    }

    /// Name `name` was most recently renamed from
    #[must_use]
    pub fn predecessor(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(_, pair)| pair.new == name)
            .map(|(_, pair)| pair.old.as_str())
    }

    /// `name` followed by every later name it was renamed to, oldest first
    #[must_use]
    pub fn forward_aliases(&self, name: &str) -> Vec<String> {
        self.walk_forward(name, None)
    }

    /// Same as [`forward_aliases`](Self::forward_aliases), counting only
    /// renames declared after `position`
    #[must_use]
    pub fn aliases_after(&self, name: &str, position: usize) -> Vec<String> {
        self.walk_forward(name, Some(position))
    }

    /// Name a field declared as `name` carries after every rename
    #[must_use]
    pub fn terminal(&self, name: &str) -> String {
        self.forward_aliases(name)
            .pop()
            .unwrap_or_else(|| name.to_string())
    }

    /// Every name connected to `name` through the chain, newest first
    ///
    /// Walks back to the oldest ancestor, then forward to the current name.
    #[must_use]
    pub fn lineage(&self, name: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut root = name;
        seen.insert(root);
        while let Some(previous) = self.predecessor(root) {
            if !seen.insert(previous) {
                break;
            }
            root = previous;
        }

        let mut names = self.forward_aliases(root);
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
        names.reverse();
        names
    }

    /// Chain without pairs whose destination resolves to `removed`
    ///
    /// A removed field leaves no alias pointing at it; unrelated chains survive.
    #[must_use]
    pub fn prune_terminating_at(&self, removed: &str) -> Self {
        let kept = self
            .0
            .iter()
            .filter(|(position, pair)| {
                self.walk_forward(&pair.new, Some(*position)).last().map(String::as_str)
                    != Some(removed)
            })
            .cloned()
            .collect();
        Self(kept)
    }

    /// Pairs in declaration order
    pub fn pairs(&self) -> impl Iterator<Item = &RenamePair> {
        self.0.iter().map(|(_, pair)| pair)
    }

    /// Pairs with the position of the mutator that declared each
    pub fn entries(&self) -> impl Iterator<Item = (usize, &RenamePair)> {
        self.0.iter().map(|(position, pair)| (*position, pair))
    }

    /// Number of pairs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if no renames are recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl RenameChain {
    /// Follow `name` through renames declared after `after`, each step
    /// strictly later than the one before
    fn walk_forward<'a>(&'a self, name: &'a str, after: Option<usize>) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut aliases = Vec::new();
        let mut current = name;
        let mut bound = after;
        loop {
            if !seen.insert(current.to_string()) {
                break;
            }
            aliases.push(current.to_string());
            let next = self
                .0
                .iter()
                .find(|(position, pair)| {
                    pair.old == current && bound.map_or(true, |b| *position > b)
                });
            match next {
                Some((position, pair)) => {
                    current = &pair.new;
                    bound = Some(*position);
                }
                None => break,
            }
        }
        aliases
    }
}

/// One pair per position, in order
impl FromIterator<RenamePair> for RenameChain {
    fn from_iter<I: IntoIterator<Item = RenamePair>>(iter: I) -> Self {
        Self(iter.into_iter().enumerate().collect())
    }
}

impl<P: Into<RenamePair>> From<Vec<P>> for RenameChain {
    fn from(pairs: Vec<P>) -> Self {
        pairs.into_iter().map(Into::into).collect()
    }
}
