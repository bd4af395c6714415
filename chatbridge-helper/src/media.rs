//! Best-effort media copy from the source backup into the converted output
//!
//! Every file is copied independently. A file that cannot be copied is counted
//! and logged; it never stops the rest of the copy.

use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Outcome of a media copy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaCopyReport {
    /// Subdirectories found under the source root
    pub subdirs_found: usize,
    pub files_copied: usize,
    pub bytes_copied: u64,
    /// Files or directories that could not be copied
    pub failures: usize,
}

/// Copy each subdirectory of `source_root` named in `subdirs` into `dest_root`
///
/// Missing subdirectories are skipped. Existing destination files are
/// overwritten.
pub fn copy_media(source_root: &Path, dest_root: &Path, subdirs: &[&str]) -> MediaCopyReport {
    let mut report = MediaCopyReport::default();

    for subdir in subdirs {
        let source = source_root.join(subdir);
        if !source.is_dir() {
            log::debug!("No {} directory in source backup", subdir);
            continue;
        }

        report.subdirs_found += 1;
        copy_tree(&source, &dest_root.join(subdir), &mut report);
    }

    report
}

fn copy_tree(source: &Path, dest: &Path, report: &mut MediaCopyReport) {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable media entry: {}", e);
                report.failures += 1;
                continue;
            }
        };

        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = dest.join(relative);

        let file_type = entry.file_type();
        if file_type.is_dir() {
            if let Err(e) = fs::create_dir_all(&target) {
                log::warn!("Failed to create {}: {}", target.display(), e);
                report.failures += 1;
            }
        } else if file_type.is_file() {
            match fs::copy(entry.path(), &target) {
                Ok(bytes) => {
                    report.files_copied += 1;
                    report.bytes_copied += bytes;
                }
                Err(e) => {
                    log::warn!("Failed to copy {}: {}", entry.path().display(), e);
                    report.failures += 1;
                }
            }
        }
        // Symlinks and special files are not media
    }
}
