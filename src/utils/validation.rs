// file: src/utils/validation.rs
// description: input validation for paths, worker counts and batch naming
// reference: input validation patterns

use crate::error::{PropagationError, Result};
use std::path::Path;

pub struct Validator;

impl Validator {
    pub fn validate_input_file(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(PropagationError::Load {
                path: path.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }

        if !path.is_file() {
            return Err(PropagationError::Load {
                path: path.to_path_buf(),
                reason: "path is not a file".to_string(),
            });
        }

        Ok(())
    }

    pub fn validate_directory(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(PropagationError::Validation(format!(
                "Directory does not exist: {}",
                path.display()
            )));
        }

        if !path.is_dir() {
            return Err(PropagationError::Validation(format!(
                "Path is not a directory: {}",
                path.display()
            )));
        }

        Ok(())
    }

    pub fn validate_worker_count(workers: usize) -> Result<()> {
        if workers == 0 {
            return Err(PropagationError::Config(
                "worker count must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Prefixes must be non-empty, free of separators, and distinct.
    pub fn validate_prefixes(input_prefix: &str, output_prefix: &str) -> Result<()> {
        for (label, prefix) in [("input", input_prefix), ("output", output_prefix)] {
            if prefix.is_empty() {
                return Err(PropagationError::Config(format!(
                    "{} prefix must not be empty",
                    label
                )));
            }
            if prefix.contains('/') || prefix.contains('\\') {
                return Err(PropagationError::Config(format!(
                    "{} prefix must not contain path separators: {}",
                    label, prefix
                )));
            }
        }

        if input_prefix == output_prefix {
            return Err(PropagationError::Config(format!(
                "input and output prefixes must differ (both {})",
                input_prefix
            )));
        }

        Ok(())
    }
}
