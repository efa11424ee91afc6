//! Layers applied bottom-up onto an in-memory path map, producing the
//! sorted filesystem tree the image inspector serves without ever
//! touching disk.

use crate::error::OcitarError;
use crate::whiteout;
use std::collections::BTreeMap;
use std::io::Read;
use tar::EntryType;

pub const MAX_NODES: usize = 50_000;
pub const MAX_TOTAL_SIZE: u64 = 5 * 1024 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
    Symlink,
    Other,
}

impl From<EntryType> for NodeKind {
    fn from(ty: EntryType) -> NodeKind {
        match ty {
            EntryType::Directory => NodeKind::Directory,
            EntryType::Regular | EntryType::Continuous => NodeKind::File,
            EntryType::Symlink | EntryType::Link => NodeKind::Symlink,
            _ => NodeKind::Other,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TreeNode {
    pub path: String,
    pub kind: NodeKind,
    pub size: u64,
    pub layer_index: usize,
}

#[derive(Clone, Debug, Default)]
struct Entry {
    kind: NodeKind,
    size: u64,
    layer_index: usize,
}

/// Applies every layer's tar stream in bottom-up order and returns the
/// resulting sorted tree. `readers` must yield layers oldest-first.
pub fn build_tree<R: Read>(layers: impl IntoIterator<Item = R>) -> Result<Vec<TreeNode>, OcitarError> {
    let mut accumulated: BTreeMap<String, Entry> = BTreeMap::new();
    let mut total_size: u64 = 0;

    for (layer_index, reader) in layers.into_iter().enumerate() {
        let mut archive = tar::Archive::new(reader);
        for entry in archive.entries()? {
            let mut entry = entry?;
            let raw_path = entry.path()?.to_string_lossy().into_owned();
            let Some(path) = whiteout::normalize_path(&raw_path) else {
                continue;
            };
            let basename = path.rsplit('/').next().unwrap_or(&path).to_string();
            let parent = parent_of(&path);

            if whiteout::is_opaque_whiteout(&basename) {
                clear_directory(&mut accumulated, &mut total_size, &parent);
                continue;
            }
            if let Some(target) = whiteout::whiteout_target(&basename) {
                let target_path = join(&parent, target);
                remove_subtree(&mut accumulated, &mut total_size, &target_path);
                continue;
            }

            let kind = NodeKind::from(entry.header().entry_type());
            let size = entry.header().size().unwrap_or(0);

            if let Some(previous) = accumulated.get(&path) {
                total_size -= previous.size;
            }
            total_size += size;
            accumulated.insert(
                path,
                Entry {
                    kind,
                    size,
                    layer_index,
                },
            );

            if accumulated.len() > MAX_NODES {
                return Err(OcitarError::TooManyNodes { limit: MAX_NODES });
            }
            if total_size > MAX_TOTAL_SIZE {
                return Err(OcitarError::TooLarge { limit: MAX_TOTAL_SIZE });
            }
        }
    }

    Ok(sorted_nodes(accumulated))
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[..idx].to_string(),
        None => String::new(),
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

fn clear_directory(accumulated: &mut BTreeMap<String, Entry>, total_size: &mut u64, dir: &str) {
    let prefix = if dir.is_empty() {
        String::new()
    } else {
        format!("{dir}/")
    };
    let to_remove: Vec<String> = accumulated
        .keys()
        .filter(|p| dir.is_empty() || p.starts_with(&prefix))
        .cloned()
        .collect();
    for path in to_remove {
        if let Some(entry) = accumulated.remove(&path) {
            *total_size -= entry.size;
        }
    }
}

fn remove_subtree(accumulated: &mut BTreeMap<String, Entry>, total_size: &mut u64, target: &str) {
    let prefix = format!("{target}/");
    let to_remove: Vec<String> = accumulated
        .keys()
        .filter(|p| p.as_str() == target || p.starts_with(&prefix))
        .cloned()
        .collect();
    for path in to_remove {
        if let Some(entry) = accumulated.remove(&path) {
            *total_size -= entry.size;
        }
    }
}

/// Directories first, then files, alphabetical within each group, applied
/// depth-first so siblings never interleave across directory boundaries.
fn sorted_nodes(accumulated: BTreeMap<String, Entry>) -> Vec<TreeNode> {
    let mut paths: Vec<&String> = accumulated.keys().collect();
    paths.sort_by(|a, b| {
        let depth_a = a.matches('/').count();
        let depth_b = b.matches('/').count();
        let parent_a = parent_of(a);
        let parent_b = parent_of(b);
        parent_a
            .cmp(&parent_b)
            .then_with(|| depth_a.cmp(&depth_b))
            .then_with(|| {
                let kind_a = accumulated[a.as_str()].kind;
                let kind_b = accumulated[b.as_str()].kind;
                directory_first(kind_a).cmp(&directory_first(kind_b))
            })
            .then_with(|| a.cmp(b))
    });
    paths
        .into_iter()
        .map(|path| {
            let entry = &accumulated[path];
            TreeNode {
                path: path.clone(),
                kind: entry.kind,
                size: entry.size,
                layer_index: entry.layer_index,
            }
        })
        .collect()
}

fn directory_first(kind: NodeKind) -> u8 {
    if kind == NodeKind::Directory {
        0
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn tar_with(entries: &[(&str, EntryType, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, ty, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_entry_type(*ty);
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, Cursor::new(data.to_vec())).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn later_layer_replaces_earlier_file() {
        let base = tar_with(&[("app/config.yaml", EntryType::Regular, b"v1")]);
        let overlay = tar_with(&[("app/config.yaml", EntryType::Regular, b"v2-longer")]);
        let tree = build_tree(vec![Cursor::new(base), Cursor::new(overlay)]).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].size, 9);
        assert_eq!(tree[0].layer_index, 1);
    }

    #[test]
    fn whiteout_removes_sibling_and_subtree() {
        let base = tar_with(&[
            ("app/data/a.txt", EntryType::Regular, b"x"),
            ("app/data/b.txt", EntryType::Regular, b"y"),
        ]);
        let overlay = tar_with(&[("app/.wh.data", EntryType::Regular, b"")]);
        let tree = build_tree(vec![Cursor::new(base), Cursor::new(overlay)]).unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn opaque_whiteout_clears_directory_before_reapplying() {
        let base = tar_with(&[
            ("app/old.txt", EntryType::Regular, b"old"),
            ("app", EntryType::Directory, b""),
        ]);
        let overlay = tar_with(&[
            ("app/.wh..wh..opq", EntryType::Regular, b""),
            ("app/new.txt", EntryType::Regular, b"new"),
        ]);
        let tree = build_tree(vec![Cursor::new(base), Cursor::new(overlay)]).unwrap();
        let paths: Vec<&str> = tree.iter().map(|n| n.path.as_str()).collect();
        assert!(paths.contains(&"app/new.txt"));
        assert!(!paths.contains(&"app/old.txt"));
    }

    #[test]
    fn directories_sort_before_files_within_parent() {
        let base = tar_with(&[
            ("app/zeta.txt", EntryType::Regular, b"z"),
            ("app/alpha", EntryType::Directory, b""),
        ]);
        let tree = build_tree(vec![Cursor::new(base)]).unwrap();
        assert_eq!(tree[0].path, "app/alpha");
        assert_eq!(tree[1].path, "app/zeta.txt");
    }
}
