//! Tar stream helpers used by both the CLI and the image layer cache:
//! building a layer archive, listing it, and plucking a single file's
//! bytes out of it without extracting the whole thing.

use crate::error::OcitarError;
use crate::whiteout;
use std::io::{Read, Write};
use std::path::Path;

/// Extracts a single layer onto `dest`, applying whiteouts against the
/// already-materialised lower layers as it goes (used by the CLI's `-x`
/// subcommand; the daemon's image inspector uses the in-memory
/// `tree::build_tree` instead and never touches disk).
pub fn extract_layer_to_disk<R: Read>(reader: R, dest: &Path) -> Result<(), OcitarError> {
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let raw_path = entry.path()?.to_string_lossy().into_owned();
        let Some(path) = whiteout::normalize_path(&raw_path) else {
            continue;
        };
        let basename = path.rsplit('/').next().unwrap_or(&path).to_string();
        let parent = match path.rsplit_once('/') {
            Some((p, _)) => p.to_string(),
            None => String::new(),
        };

        if whiteout::is_opaque_whiteout(&basename) {
            let dir = dest.join(&parent);
            if dir.is_dir() {
                for child in std::fs::read_dir(&dir)? {
                    let child = child?;
                    if child.file_type()?.is_dir() {
                        std::fs::remove_dir_all(child.path())?;
                    } else {
                        std::fs::remove_file(child.path())?;
                    }
                }
            }
            continue;
        }
        if let Some(target) = whiteout::whiteout_target(&basename) {
            let target_path = dest.join(&parent).join(target);
            if target_path.is_dir() {
                std::fs::remove_dir_all(&target_path).ok();
            } else {
                std::fs::remove_file(&target_path).ok();
            }
            continue;
        }

        entry.unpack_in(dest)?;
    }
    Ok(())
}

pub struct ArchiveSummary {
    pub files: Vec<String>,
    pub whiteouts: Vec<String>,
}

pub fn list_tar<R: Read>(reader: R) -> Result<ArchiveSummary, OcitarError> {
    let mut archive = tar::Archive::new(reader);
    let mut files = Vec::new();
    let mut whiteouts = Vec::new();
    for entry in archive.entries()? {
        let entry = entry?;
        let raw_path = entry.path()?.to_string_lossy().into_owned();
        let Some(path) = whiteout::normalize_path(&raw_path) else {
            continue;
        };
        let basename = path.rsplit('/').next().unwrap_or(&path);
        if whiteout::is_whiteout(basename) || whiteout::is_opaque_whiteout(basename) {
            whiteouts.push(path);
        } else {
            files.push(path);
        }
    }
    Ok(ArchiveSummary { files, whiteouts })
}

/// Streams out the bytes of `wanted_path` from a single layer's tar
/// stream, if present and not itself a whiteout marker.
pub fn extract_entry_bytes<R: Read>(reader: R, wanted_path: &str) -> Result<Option<Vec<u8>>, OcitarError> {
    let mut archive = tar::Archive::new(reader);
    for entry in archive.entries()? {
        let mut entry = entry?;
        let raw_path = entry.path()?.to_string_lossy().into_owned();
        let Some(path) = whiteout::normalize_path(&raw_path) else {
            continue;
        };
        if path == wanted_path {
            let mut buf = Vec::new();
            entry.read_to_end(&mut buf)?;
            return Ok(Some(buf));
        }
    }
    Ok(None)
}

/// Creates a tar archive of `paths` rooted at `base_dir`, emitting
/// `.wh.<name>` whiteout markers for each entry in `whiteouts` ahead of
/// the real content (mirrors the CLI's `--remove` flag).
pub fn create_tar<W: Write>(
    base_dir: &Path,
    paths: &[String],
    whiteouts: &[String],
    output: W,
) -> Result<(), OcitarError> {
    let mut builder = tar::Builder::new(output);

    for whiteout_path in whiteouts {
        let (parent, name) = match whiteout_path.rsplit_once('/') {
            Some((p, n)) => (p, n),
            None => ("", whiteout_path.as_str()),
        };
        let marker = if parent.is_empty() {
            format!("{}{name}", whiteout::WHITEOUT_PREFIX)
        } else {
            format!("{parent}/{}{name}", whiteout::WHITEOUT_PREFIX)
        };
        let mut header = tar::Header::new_gnu();
        header.set_path(&marker)?;
        header.set_size(0);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, std::io::empty())?;
    }

    for path in paths {
        builder.append_path_with_name(base_dir.join(path), path)?;
    }

    builder.finish()?;
    Ok(())
}
