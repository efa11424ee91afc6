//! Thin wrapper around `ocitar::build_tree` for cached layer tars.

use ocitar::{OcitarError, TreeNode};
use std::fs::File;
use std::path::Path;

/// Reads every `layer-<i>.tar` under `layers_dir` in order and folds
/// them into the sorted whiteout-aware filesystem tree.
pub fn build_tree_from_cache(layers_dir: &Path, layer_count: usize) -> Result<Vec<TreeNode>, OcitarError> {
    let mut files = Vec::with_capacity(layer_count);
    for i in 0..layer_count {
        files.push(File::open(layers_dir.join(format!("layer-{i}.tar")))?);
    }
    ocitar::build_tree(files)
}
