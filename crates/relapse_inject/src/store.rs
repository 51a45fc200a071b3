//! Descriptor artifacts on disk.
//!
//! One JSON object per attempted injection point, written once at trial
//! end and read back by later trials: as an exclusion-set entry for the
//! exhaustive policy and as historical evidence for the attribution pass.
//! Parse failures are fatal to the current trial and propagate; retry
//! policy belongs to the external driver.

use relapse_core::{
    CallSiteId, CoreError, CoreResult, InjectionPointDescriptor, Occurrence, TrialId,
};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Write the descriptor of one trial to `dir`, named by the trial id.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the file cannot
/// be written.
pub fn write_descriptor(
    dir: &Path,
    trial: TrialId,
    descriptor: &InjectionPointDescriptor,
) -> CoreResult<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.json", trial));
    let json = serde_json::to_string_pretty(descriptor)?;
    fs::write(&path, json)?;
    Ok(path)
}

/// Read one descriptor file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse.
pub fn read_descriptor(path: &Path) -> CoreResult<InjectionPointDescriptor> {
    let content = fs::read_to_string(path).map_err(|err| CoreError::Io {
        message: format!("{}: {}", path.display(), err),
    })?;
    serde_json::from_str(&content).map_err(|err| CoreError::ParseError {
        message: format!("{}: {}", path.display(), err),
    })
}

/// Build the exclusion set from every descriptor file in a trials
/// directory. A missing directory is an empty history, not an error.
///
/// # Errors
///
/// Returns an error if any descriptor file fails to read or parse.
pub fn load_exclusions(dir: &Path) -> CoreResult<HashSet<(CallSiteId, Occurrence)>> {
    let mut exclusions = HashSet::new();
    if !dir.exists() {
        return Ok(exclusions);
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
        .collect();
    paths.sort();

    for path in paths {
        let descriptor = read_descriptor(&path)?;
        exclusions.insert(descriptor.exclusion_key());
    }
    debug!(dir = %dir.display(), attempted = exclusions.len(), "exclusion set loaded");
    Ok(exclusions)
}
