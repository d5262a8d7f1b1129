// file: src/lineage/merger.rs
// description: attaches the parent record's lineage and metadata to a derived record
// reference: provenance chain stored inside each output record

use crate::container::{ContainerFile, Group, Node};
use crate::error::{PropagationError, Result};
use crate::record::{DATA_BRANCH, HISTORY_BRANCH};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const PARENT_BRANCH: &str = "parent";
pub const DETAIL_BRANCH: &str = "detail";

/// Rebuilds the `history` branch of a derived record from its parent.
///
/// Layout after a merge:
///
/// ```text
/// history/
///   detail/          the parent's metadata; `detail/data` links to its payload
///   parent/
///     detail/        the grandparent's metadata (parent's `history/detail`)
///     parent/        the great-grandparent's metadata
///                    (parent's `history/parent/detail`)
/// ```
///
/// Each generation keeps its own branch, so generations never overwrite one
/// another. The shape is the same for every record: anything older than the
/// great-grandparent is dropped, and nesting never grows with the length of
/// the propagation chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineageMerger;

impl LineageMerger {
    pub fn new() -> Self {
        Self
    }

    pub fn merge(&self, output_path: &Path, parent_path: &Path) -> Result<()> {
        let merge_error = |reason: String| PropagationError::Merge {
            path: output_path.to_path_buf(),
            reason,
        };

        let parent = ContainerFile::open(parent_path).map_err(|e| merge_error(e.to_string()))?;
        let mut output =
            ContainerFile::open(output_path).map_err(|e| merge_error(e.to_string()))?;

        let link_target = link_target(parent_path);
        let history = build_history(parent.root(), &link_target);

        let root = output.root_mut();
        if root.remove(HISTORY_BRANCH).is_some() {
            debug!("Replaced existing history in {}", output_path.display());
        }
        root.insert(HISTORY_BRANCH, history)
            .map_err(|e| merge_error(e.to_string()))?;

        output.save().map_err(|e| merge_error(e.to_string()))?;

        info!(
            "Attached lineage of {} to {}",
            parent_path.display(),
            output_path.display()
        );
        Ok(())
    }
}

/// Builds the `history` group for a record derived from `parent_root`.
pub fn build_history(parent_root: &Group, parent_file: &Path) -> Group {
    let mut ancestry = Group::new();
    let mut detail = Group::new();

    for (name, node) in parent_root.iter() {
        match name.as_str() {
            HISTORY_BRANCH => {
                let Some(parent_history) = node.as_group() else {
                    continue;
                };
                if let Some(grandparent) = parent_history.get_group(DETAIL_BRANCH) {
                    insert_child(&mut ancestry, DETAIL_BRANCH, Node::Group(grandparent.clone()));
                }
                let great_grandparent =
                    format!("{}/{}", PARENT_BRANCH, DETAIL_BRANCH);
                if let Some(oldest) = parent_history.get_group(&great_grandparent) {
                    insert_child(&mut ancestry, PARENT_BRANCH, Node::Group(oldest.clone()));
                }
            }
            DATA_BRANCH => {
                let link = Node::Link {
                    file: parent_file.to_path_buf(),
                    path: format!("/{}", DATA_BRANCH),
                };
                insert_child(&mut detail, name, link);
            }
            _ => insert_child(&mut detail, name, node.clone()),
        }
    }

    let mut history = Group::new();
    insert_child(&mut history, PARENT_BRANCH, Node::Group(ancestry));
    insert_child(&mut history, DETAIL_BRANCH, Node::Group(detail));
    history
}

fn insert_child(group: &mut Group, name: &str, node: Node) {
    // single-segment names never traverse an existing value
    let _ = group.insert(name, node);
}

/// Links are written with an absolute path when the parent can be resolved,
/// so they stay valid wherever the derived record is later read from.
fn link_target(parent_path: &Path) -> PathBuf {
    fs::canonicalize(parent_path).unwrap_or_else(|_| parent_path.to_path_buf())
}
