//! Path analysis shared by the export and removal engines.
//!
//! The central piece is [`common_path`], a majority-vote longest common
//! ancestor: it finds the deepest directory prefix shared by strictly more
//! than half of a set of file paths. Unlike a strict longest-common-prefix it
//! tolerates a minority of outlier paths (a handful of songs living on a
//! different drive do not stop the rest of the library from being rebased).

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

/// Compute the directory prefix shared by more than half of the given paths.
///
/// Duplicates and ordering are irrelevant; the input is treated as a set.
/// The prefix grows one path segment at a time: a segment is accepted only
/// while strictly more than half of the set still starts with the extended
/// candidate. The final segment of each path (the file name) never
/// contributes a candidate segment. Paths too short to extend the current
/// candidate are skipped for that depth but still count toward the majority
/// denominator.
///
/// Returns an empty path when no segment reaches a majority (including for
/// empty input).
#[must_use]
pub fn common_path<P: AsRef<Path>>(paths: &[P]) -> PathBuf {
    let set: HashSet<&Path> = paths.iter().map(|p| p.as_ref()).collect();
    if set.is_empty() {
        return PathBuf::new();
    }

    let mut prefix = PathBuf::new();
    let mut checked: HashSet<PathBuf> = HashSet::new();

    loop {
        let depth = prefix.components().count();
        let mut extended = false;

        for path in &set {
            let Some(segment) = directory_segment(path, depth) else {
                // Nothing left to extend with from this path.
                continue;
            };

            let candidate = prefix.join(&segment);
            if !checked.insert(candidate.clone()) {
                continue;
            }

            let count = set.iter().filter(|p| p.starts_with(&candidate)).count();
            if count * 2 > set.len() {
                prefix = candidate;
                extended = true;
                break;
            }
        }

        if !extended {
            break;
        }
    }

    debug!(
        "common path of {} entries resolved to {}",
        set.len(),
        prefix.display()
    );
    prefix
}

/// The `depth`-th directory component of `path`, excluding the file name.
fn directory_segment(path: &Path, depth: usize) -> Option<OsString> {
    let mut components: Vec<Component<'_>> = path.components().collect();
    // Drop the file name; only directory segments form candidates.
    components.pop();
    components.get(depth).map(|c| c.as_os_str().to_os_string())
}

/// Compute where a song lands relative to the destination root.
///
/// When `source_url` lives under `source_dir`, the portion beyond the source
/// root is kept, so the destination mirrors the source tree. Otherwise the
/// full path is used, made relative by stripping root markers and any
/// drive-letter colon characters.
#[must_use]
pub fn relative_destination(source_url: &Path, source_dir: &Path) -> PathBuf {
    if !source_dir.as_os_str().is_empty()
        && let Ok(relative) = source_url.strip_prefix(source_dir)
    {
        return relative.to_path_buf();
    }
    strip_drive_colons(source_url)
}

/// Rewrite an absolute path into a relative one usable under another root.
///
/// Root markers are dropped and colon characters are removed from every
/// segment, so `C:\music\song.mp3` becomes `C\music\song.mp3` and
/// `/music/song.mp3` becomes `music/song.mp3`.
#[must_use]
pub fn strip_drive_colons(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::RootDir | Component::CurDir | Component::ParentDir => {}
            Component::Prefix(prefix) => {
                let cleaned = prefix.as_os_str().to_string_lossy().replace(':', "");
                if !cleaned.is_empty() {
                    out.push(cleaned);
                }
            }
            Component::Normal(segment) => {
                let text = segment.to_string_lossy();
                if text.contains(':') {
                    out.push(text.replace(':', ""));
                } else {
                    out.push(segment);
                }
            }
        }
    }
    out
}
