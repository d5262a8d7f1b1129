// file: src/container/file.rs
// description: container file persistence with atomic saves and link resolution
// reference: https://docs.rs/serde_json

use super::tree::{Group, Node};
use super::ContainerError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const FORMAT_TAG: &str = "wavefront-container";
pub const FORMAT_VERSION: u32 = 1;
const MAX_LINK_HOPS: usize = 16;

#[derive(Debug, Serialize, Deserialize)]
struct ContainerDocument {
    format: String,
    version: u32,
    root: Group,
}

/// One hierarchical record file opened for reading or metadata modification.
#[derive(Debug, Clone)]
pub struct ContainerFile {
    path: PathBuf,
    root: Group,
}

impl ContainerFile {
    pub fn create(path: impl Into<PathBuf>, root: Group) -> Self {
        Self {
            path: path.into(),
            root,
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ContainerError> {
        let path = path.into();
        let contents = fs::read_to_string(&path).map_err(|source| ContainerError::Io {
            path: path.clone(),
            source,
        })?;

        let document: ContainerDocument =
            serde_json::from_str(&contents).map_err(|source| ContainerError::Malformed {
                path: path.clone(),
                source,
            })?;

        if document.format != FORMAT_TAG || document.version != FORMAT_VERSION {
            return Err(ContainerError::UnsupportedFormat {
                path,
                format: format!("{} v{}", document.format, document.version),
            });
        }

        debug!("Opened container {}", path.display());
        Ok(Self {
            path,
            root: document.root,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Group {
        &mut self.root
    }

    pub fn into_root(self) -> Group {
        self.root
    }

    /// Writes the container next to its destination, then renames it into
    /// place so readers never observe a half-written file.
    pub fn save(&self) -> Result<(), ContainerError> {
        if let Some(branch) = self.root.find_non_finite() {
            return Err(ContainerError::NonFinite(branch));
        }

        let document = ContainerDocument {
            format: FORMAT_TAG.to_string(),
            version: FORMAT_VERSION,
            root: self.root.clone(),
        };
        let contents =
            serde_json::to_string(&document).map_err(|source| ContainerError::Malformed {
                path: self.path.clone(),
                source,
            })?;

        let staging = staging_path(&self.path);
        fs::write(&staging, contents).map_err(|source| ContainerError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &self.path).map_err(|source| {
            let _ = fs::remove_file(&staging);
            ContainerError::Io {
                path: self.path.clone(),
                source,
            }
        })?;

        debug!("Saved container {}", self.path.display());
        Ok(())
    }

    /// Looks up `branch`, following cross-file links until a group or value
    /// is reached.
    pub fn resolve(&self, branch: &str) -> Result<Node, ContainerError> {
        let mut node = self
            .root
            .get(branch)
            .cloned()
            .ok_or_else(|| ContainerError::MissingBranch(branch.to_string()))?;

        for _ in 0..MAX_LINK_HOPS {
            let (file, path) = match node {
                Node::Link { file, path } => (file, path),
                other => return Ok(other),
            };
            let target = ContainerFile::open(&file)?;
            node = target.root.get(&path).cloned().ok_or_else(|| {
                ContainerError::MissingBranch(format!("{}:{}", file.display(), path))
            })?;
        }

        Err(ContainerError::LinkDepth {
            branch: branch.to_string(),
            hops: MAX_LINK_HOPS,
        })
    }
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::MetaValue;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_open() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("record.h5");

        let mut root = Group::new();
        root.insert("info/package_version", MetaValue::Text("2014.1".into()))
            .unwrap();
        ContainerFile::create(&path, root.clone()).save().unwrap();

        let opened = ContainerFile::open(&path).unwrap();
        assert_eq!(opened.root(), &root);
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn test_save_rejects_non_finite_values() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("record.h5");

        let mut root = Group::new();
        root.insert("data/arrEhor", MetaValue::FloatArray(vec![1.0, f64::NAN]))
            .unwrap();
        let err = ContainerFile::create(&path, root).save().unwrap_err();

        assert!(matches!(err, ContainerError::NonFinite(ref branch) if branch == "/data/arrEhor"));
        assert!(!path.exists());
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn test_open_missing_and_malformed() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.h5");
        assert!(matches!(
            ContainerFile::open(&missing),
            Err(ContainerError::Io { .. })
        ));

        let garbage = temp.path().join("garbage.h5");
        fs::write(&garbage, "\u{89}HDF not json").unwrap();
        assert!(matches!(
            ContainerFile::open(&garbage),
            Err(ContainerError::Malformed { .. })
        ));

        let foreign = temp.path().join("foreign.h5");
        fs::write(&foreign, r#"{"format":"other","version":1,"root":{}}"#).unwrap();
        assert!(matches!(
            ContainerFile::open(&foreign),
            Err(ContainerError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_resolve_follows_links_across_files() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source.h5");
        let derived = temp.path().join("derived.h5");

        let mut source_root = Group::new();
        source_root
            .insert("data/arrEhor", MetaValue::FloatArray(vec![1.0, 0.0]))
            .unwrap();
        ContainerFile::create(&source, source_root).save().unwrap();

        let mut derived_root = Group::new();
        derived_root
            .insert(
                "history/detail/data",
                Node::Link {
                    file: source.clone(),
                    path: "/data".to_string(),
                },
            )
            .unwrap();
        let derived_file = ContainerFile::create(&derived, derived_root);
        derived_file.save().unwrap();

        let resolved = derived_file.resolve("history/detail/data").unwrap();
        let group = resolved.as_group().unwrap();
        assert_eq!(
            group.get_value("arrEhor"),
            Some(&MetaValue::FloatArray(vec![1.0, 0.0]))
        );

        assert!(matches!(
            derived_file.resolve("history/parent"),
            Err(ContainerError::MissingBranch(_))
        ));
    }

    #[test]
    fn test_resolve_detects_link_cycles() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("self.h5");

        let mut root = Group::new();
        root.insert(
            "loop",
            Node::Link {
                file: path.clone(),
                path: "/loop".to_string(),
            },
        )
        .unwrap();
        let file = ContainerFile::create(&path, root);
        file.save().unwrap();

        assert!(matches!(
            file.resolve("loop"),
            Err(ContainerError::LinkDepth { .. })
        ));
    }
}
