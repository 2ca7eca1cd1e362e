//! Utility functions for CLI commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use speechmatch_matching::{load_directory_groups, Group, Recording, RecordingFactory};
use tokio::task::JoinSet;
use tracing::info;

/// Outputs result as JSON or YAML.
pub fn output_result<T: serde::Serialize>(result: &T, as_json: bool) -> anyhow::Result<()> {
    let output = if as_json {
        serde_json::to_string_pretty(result)?
    } else {
        serde_yaml::to_string(result)?
    };
    println!("{}", output.trim_end());
    Ok(())
}

/// Loads the groups of a recordings directory on the blocking pool.
pub async fn load_groups(dir: &Path, factory: &RecordingFactory) -> anyhow::Result<Vec<Group>> {
    let dir = dir.to_path_buf();
    let factory = factory.clone();
    let groups = tokio::task::spawn_blocking(move || load_directory_groups(&dir, &factory))
        .await?
        .context("failed to load groups")?;
    if groups.is_empty() {
        anyhow::bail!("no groups found");
    }
    Ok(groups)
}

/// Opens one recording on the blocking pool.
pub async fn open_recording(path: &Path, factory: &RecordingFactory) -> anyhow::Result<Arc<Recording>> {
    let path = path.to_path_buf();
    let factory = factory.clone();
    let recording = tokio::task::spawn_blocking(move || factory.open(&path))
        .await?
        .context("failed to open recording")?;
    Ok(recording)
}

/// Transcribes `recordings` concurrently on the blocking pool.
///
/// Each recording caches its transcript, so later matching does not call
/// the engine again. Returns the number of failures; each one resurfaces
/// from the cache when its recording is matched.
pub async fn warm_transcripts<'a, I>(recordings: I) -> anyhow::Result<usize>
where
    I: IntoIterator<Item = &'a Arc<Recording>>,
{
    let mut set = JoinSet::new();
    for rec in recordings {
        let rec = Arc::clone(rec);
        set.spawn_blocking(move || rec.transcript().is_ok());
    }

    let total = set.len();
    let mut failed = 0;
    while let Some(joined) = set.join_next().await {
        if !joined? {
            failed += 1;
        }
    }
    info!(total, failed, "transcripts ready");
    Ok(failed)
}

/// Iterates the members of every group.
pub fn members(groups: &[Group]) -> impl Iterator<Item = &Arc<Recording>> {
    groups.iter().flat_map(Group::iter)
}
