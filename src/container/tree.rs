// file: src/container/tree.rs
// description: hierarchical branch tree with values and cross-file links
// reference: slash-delimited group/dataset layout of scientific containers

use super::ContainerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::path::PathBuf;

/// Leaf metadata value stored at a branch path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    FloatArray(Vec<f64>),
    TextArray(Vec<String>),
    Matrix(Vec<Vec<f64>>),
}

impl MetaValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float_array(&self) -> Option<&[f64]> {
        match self {
            Self::FloatArray(v) => Some(v),
            _ => None,
        }
    }

    /// False when any float inside is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(v) => v.is_finite(),
            Self::FloatArray(v) => v.iter().all(|x| x.is_finite()),
            Self::Matrix(rows) => rows.iter().flatten().all(|x| x.is_finite()),
            Self::Bool(_) | Self::Int(_) | Self::Text(_) | Self::TextArray(_) => true,
        }
    }
}

/// A node of the container tree.
///
/// `Link` points at a branch stored in another container file; it is copied
/// as a link and never dereferenced implicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Group(Group),
    Value(MetaValue),
    Link { file: PathBuf, path: String },
}

impl Node {
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Self::Group(group) => Some(group),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&MetaValue> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl From<MetaValue> for Node {
    fn from(value: MetaValue) -> Self {
        Self::Value(value)
    }
}

impl From<Group> for Node {
    fn from(group: Group) -> Self {
        Self::Group(group)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Group {
    children: BTreeMap<String, Node>,
}

pub(crate) fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Node> {
        self.children.iter()
    }

    pub fn get(&self, path: &str) -> Option<&Node> {
        let mut parts = segments(path).peekable();
        let mut current = self;
        while let Some(name) = parts.next() {
            let node = current.children.get(name)?;
            if parts.peek().is_none() {
                return Some(node);
            }
            current = node.as_group()?;
        }
        None
    }

    pub fn get_group(&self, path: &str) -> Option<&Group> {
        if segments(path).next().is_none() {
            return Some(self);
        }
        self.get(path).and_then(Node::as_group)
    }

    pub fn get_value(&self, path: &str) -> Option<&MetaValue> {
        self.get(path).and_then(Node::as_value)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Returns the group at `path`, creating missing intermediate groups.
    pub fn ensure_group(&mut self, path: &str) -> Result<&mut Group, ContainerError> {
        let mut current = self;
        for name in segments(path) {
            let entry = current
                .children
                .entry(name.to_string())
                .or_insert_with(|| Node::Group(Group::new()));
            current = match entry {
                Node::Group(group) => group,
                _ => return Err(ContainerError::NotAGroup(path.to_string())),
            };
        }
        Ok(current)
    }

    /// Inserts `node` at `path`, replacing whatever was there.
    pub fn insert(
        &mut self,
        path: &str,
        node: impl Into<Node>,
    ) -> Result<Option<Node>, ContainerError> {
        let (parent, name) = split_last(path)?;
        let group = self.ensure_group(parent)?;
        Ok(group.children.insert(name.to_string(), node.into()))
    }

    pub fn remove(&mut self, path: &str) -> Option<Node> {
        let (parent, name) = split_last(path).ok()?;
        let group = if segments(parent).next().is_none() {
            self
        } else {
            match self.get_mut(parent)? {
                Node::Group(group) => group,
                _ => return None,
            }
        };
        group.children.remove(name)
    }

    fn get_mut(&mut self, path: &str) -> Option<&mut Node> {
        let mut parts = segments(path).peekable();
        let mut current = self;
        while let Some(name) = parts.next() {
            let node = current.children.get_mut(name)?;
            if parts.peek().is_none() {
                return Some(node);
            }
            current = match node {
                Node::Group(group) => group,
                _ => return None,
            };
        }
        None
    }

    /// All non-group nodes with their absolute slash paths.
    pub fn leaves(&self) -> Vec<(String, &Node)> {
        let mut out = Vec::new();
        self.collect_leaves("", &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Node)>) {
        for (name, node) in &self.children {
            let path = format!("{}/{}", prefix, name);
            match node {
                Node::Group(group) => group.collect_leaves(&path, out),
                _ => out.push((path, node)),
            }
        }
    }

    /// Path of the first value holding a NaN or infinity, if any.
    pub fn find_non_finite(&self) -> Option<String> {
        self.leaves().into_iter().find_map(|(path, node)| match node {
            Node::Value(value) if !value.is_finite() => Some(path),
            _ => None,
        })
    }

    /// Number of nested group levels below this one.
    pub fn depth(&self) -> usize {
        self.children
            .values()
            .filter_map(Node::as_group)
            .map(|g| 1 + g.depth())
            .max()
            .unwrap_or(0)
    }
}

fn split_last(path: &str) -> Result<(&str, &str), ContainerError> {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, name)) if !name.is_empty() => Ok((parent, name)),
        None if !trimmed.is_empty() => Ok(("", trimmed)),
        _ => Err(ContainerError::InvalidPath(path.to_string())),
    }
}
