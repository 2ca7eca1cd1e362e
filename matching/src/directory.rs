use std::fs;
use std::path::{Path, PathBuf};

use speechmatch_audio::AudioError;
use tracing::{debug, info};

use crate::{Group, MatchError, RecordingFactory};

/// Loads one group per immediate sub-directory of `root`.
///
/// The directory name is the group identifier and every file the factory's
/// loader supports becomes a recording, in file-name order. Other files are
/// skipped. Groups are returned sorted by identifier.
///
/// ```text
/// root/
///   three/ 0001.wav 0002.wav
///   ten/   0001.wav
/// ```
pub fn load_directory_groups(root: &Path, factory: &RecordingFactory) -> Result<Vec<Group>, MatchError> {
    let mut groups = Vec::new();
    for dir in sorted_entries(root)? {
        if !dir.is_dir() {
            continue;
        }
        let Some(label) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };

        let mut group = Group::new(label);
        for file in sorted_entries(&dir)? {
            if !file.is_file() || !factory.supports(&file) {
                debug!(path = %file.display(), "skipping unsupported file");
                continue;
            }
            group.add(factory.open(&file)?);
        }
        debug!(group = group.identifier(), size = group.len(), "loaded group");
        groups.push(group);
    }

    groups.sort_by(|a, b| a.identifier().cmp(b.identifier()));
    info!(
        root = %root.display(),
        groups = groups.len(),
        recordings = groups.iter().map(Group::len).sum::<usize>(),
        "loaded directory groups"
    );
    Ok(groups)
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, MatchError> {
    let open_err = |e: std::io::Error| AudioError::Open {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    };
    let mut paths = fs::read_dir(dir)
        .map_err(open_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(open_err)?;
    paths.sort();
    Ok(paths)
}
