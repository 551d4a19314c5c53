//! Heterogeneous container trees.
//!
//! Argument specs and argument values are not always flat: a parameter can
//! be a mapping of tuples of arrays. [`Nested`] models such trees with the
//! leaf type as the point where recursion stops, so a tree of
//! [`ShapePattern`](crate::ShapePattern)s is walked down to the patterns and
//! never into them.

use std::{collections::BTreeMap, fmt};

use crate::{Error, Result};

/// A mapping key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Int(i64),
    Str(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

/// Indices past `i64::MAX` keep their digits as a string key rather than wrap.
impl From<usize> for Key {
    fn from(value: usize) -> Self {
        match i64::try_from(value) {
            Ok(i) => Self::Int(i),
            Err(_) => Self::Str(value.to_string()),
        }
    }
}

/// The kind of container at one level of a [`Nested`] tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Mapping,
    Sequence,
    Tuple,
    Set,
    Record,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Mapping => "mapping",
            Self::Sequence => "sequence",
            Self::Tuple => "tuple",
            Self::Set => "set",
            Self::Record => "record",
        })
    }
}

/// Where a child sits inside its parent.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Key(Key),
    Index(usize),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(k) => write!(f, "key {k}"),
            Self::Index(i) => write!(f, "index {i}"),
        }
    }
}

/// A tree of containers with leaves of type `T`.
///
/// Sets keep the order they were built in; they are sets in the sense of
/// the data they describe, not in their Rust representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Nested<T> {
    Leaf(T),
    Map(BTreeMap<Key, Nested<T>>),
    List(Vec<Nested<T>>),
    Tuple(Vec<Nested<T>>),
    Set(Vec<Nested<T>>),
    /// A fixed-field record. Children are matched by position.
    Record {
        name: String,
        fields: Vec<(String, Nested<T>)>,
    },
}

impl<T> From<T> for Nested<T> {
    fn from(value: T) -> Self {
        Self::Leaf(value)
    }
}

impl<T> Nested<T> {
    pub fn leaf(value: T) -> Self {
        Self::Leaf(value)
    }

    pub fn list(items: impl IntoIterator<Item = Nested<T>>) -> Self {
        Self::List(items.into_iter().collect())
    }

    pub fn tuple(items: impl IntoIterator<Item = Nested<T>>) -> Self {
        Self::Tuple(items.into_iter().collect())
    }

    pub fn set(items: impl IntoIterator<Item = Nested<T>>) -> Self {
        Self::Set(items.into_iter().collect())
    }

    pub fn mapping<K: Into<Key>>(entries: impl IntoIterator<Item = (K, Nested<T>)>) -> Self {
        Self::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn record<N: Into<String>>(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (N, Nested<T>)>,
    ) -> Self {
        Self::Record {
            name: name.into(),
            fields: fields.into_iter().map(|(n, v)| (n.into(), v)).collect(),
        }
    }

    /// `None` for a leaf.
    pub fn kind(&self) -> Option<ContainerKind> {
        match self {
            Self::Leaf(_) => None,
            Self::Map(_) => Some(ContainerKind::Mapping),
            Self::List(_) => Some(ContainerKind::Sequence),
            Self::Tuple(_) => Some(ContainerKind::Tuple),
            Self::Set(_) => Some(ContainerKind::Set),
            Self::Record { .. } => Some(ContainerKind::Record),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf(_))
    }

    pub fn as_leaf(&self) -> Option<&T> {
        match self {
            Self::Leaf(value) => Some(value),
            _ => None,
        }
    }

    /// Direct children with their slots, in traversal order.
    fn children(&self) -> Vec<(Slot, &Nested<T>)> {
        match self {
            Self::Leaf(_) => Vec::new(),
            Self::Map(entries) => entries
                .iter()
                .map(|(k, v)| (Slot::Key(k.clone()), v))
                .collect(),
            Self::List(items) | Self::Tuple(items) | Self::Set(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (Slot::Index(i), v))
                .collect(),
            Self::Record { fields, .. } => fields
                .iter()
                .enumerate()
                .map(|(i, (_, v))| (Slot::Index(i), v))
                .collect(),
        }
    }

    /// The child in `slot`. Keys only resolve in mappings, indices only in
    /// positional containers.
    fn child(&self, slot: &Slot) -> Option<&Nested<T>> {
        match (self, slot) {
            (Self::Map(entries), Slot::Key(k)) => entries.get(k),
            (Self::List(items) | Self::Tuple(items) | Self::Set(items), Slot::Index(i)) => {
                items.get(*i)
            }
            (Self::Record { fields, .. }, Slot::Index(i)) => fields.get(*i).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Build a container of the same kind as `self` around `children`, which
    /// must be in the order [`Nested::children`] yields them.
    fn rebuild<R>(&self, children: Vec<Nested<R>>) -> Nested<R> {
        match self {
            Self::Leaf(_) => unreachable!("leaves have no children"),
            Self::Map(entries) => Nested::Map(entries.keys().cloned().zip(children).collect()),
            Self::List(_) => Nested::List(children),
            Self::Tuple(_) => Nested::Tuple(children),
            Self::Set(_) => Nested::Set(children),
            Self::Record { name, fields } => Nested::Record {
                name: name.clone(),
                fields: fields
                    .iter()
                    .map(|(n, _)| n.clone())
                    .zip(children)
                    .collect(),
            },
        }
    }

    /// Apply `f` to every leaf, keeping the container structure.
    pub fn map<R, F>(&self, mut f: F) -> Nested<R>
    where
        F: FnMut(&T) -> R,
    {
        self.map_inner(&mut f)
    }

    fn map_inner<R, F>(&self, f: &mut F) -> Nested<R>
    where
        F: FnMut(&T) -> R,
    {
        match self {
            Self::Leaf(value) => Nested::Leaf(f(value)),
            _ => {
                let mapped = self
                    .children()
                    .into_iter()
                    .map(|(_, child)| child.map_inner(f))
                    .collect();
                self.rebuild(mapped)
            }
        }
    }

    /// Walk `self` and `others` in parallel, calling `f` at every leaf of
    /// `self` with the subtrees found at the same position in each of
    /// `others`.
    ///
    /// `self` drives the walk; every other structure must contain each key
    /// and index `self` has at the same place. Extra entries are ignored.
    pub fn map_with<U, R, F>(&self, others: &[&Nested<U>], mut f: F) -> Result<Nested<R>>
    where
        F: FnMut(&T, &[&Nested<U>]) -> R,
    {
        let mut path = Vec::new();
        self.map_with_inner(others, &mut f, &mut path)
    }

    fn map_with_inner<U, R, F>(
        &self,
        others: &[&Nested<U>],
        f: &mut F,
        path: &mut Vec<String>,
    ) -> Result<Nested<R>>
    where
        F: FnMut(&T, &[&Nested<U>]) -> R,
    {
        if let Self::Leaf(value) = self {
            return Ok(Nested::Leaf(f(value, others)));
        }
        let children = self.children();
        let mut mapped = Vec::with_capacity(children.len());
        for (slot, child) in children {
            let aligned = others
                .iter()
                .map(|other| {
                    other.child(&slot).ok_or_else(|| {
                        Error::structure(
                            &path[..],
                            format!("{slot} is missing from a parallel structure"),
                        )
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            path.push(slot.to_string());
            mapped.push(child.map_with_inner(&aligned, f, path)?);
            path.pop();
        }
        Ok(self.rebuild(mapped))
    }

    /// Fold all leaves with `f`.
    ///
    /// Without `initial` the first leaf seeds the fold, and a tree with no
    /// leaves is an [`Error::EmptyReduce`].
    pub fn reduce<F>(&self, initial: Option<T>, mut f: F) -> Result<T>
    where
        T: Clone,
        F: FnMut(T, &T) -> T,
    {
        let mut leaves = self.leaves();
        let seed = match initial {
            Some(seed) => seed,
            None => leaves.next().cloned().ok_or(Error::EmptyReduce)?,
        };
        Ok(leaves.fold(seed, |acc, leaf| f(acc, leaf)))
    }

    /// Depth-first, left-to-right iterator over the leaves. Mappings are
    /// visited in key order.
    pub fn leaves(&self) -> Leaves<'_, T> {
        Leaves { stack: vec![self] }
    }

    pub fn all<F>(&self, mut pred: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        self.leaves().all(|leaf| pred(leaf))
    }
}

/// Iterator returned by [`Nested::leaves`].
pub struct Leaves<'a, T> {
    stack: Vec<&'a Nested<T>>,
}

impl<'a, T> Iterator for Leaves<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        while let Some(node) = self.stack.pop() {
            match node {
                Nested::Leaf(value) => return Some(value),
                Nested::Map(entries) => self.stack.extend(entries.values().rev()),
                Nested::List(items) | Nested::Tuple(items) | Nested::Set(items) => {
                    self.stack.extend(items.iter().rev())
                }
                Nested::Record { fields, .. } => {
                    self.stack.extend(fields.iter().rev().map(|(_, v)| v))
                }
            }
        }
        None
    }
}
