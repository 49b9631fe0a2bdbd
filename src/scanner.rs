use crate::clock::Clock;
use crate::error::ScanError;
use crate::types::{FileEntry, FolderSummary, Partial, Report};
use chrono::{DateTime, Local};
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use walkdir::WalkDir;

/// What a single stat call tells us about a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Dir,
    File { size: u64, modified: DateTime<Local> },
}

/// Stats `path`, following symlinks.
pub fn probe(path: &Path) -> Result<Probe, ScanError> {
    let metadata = fs::metadata(path).map_err(|e| ScanError::io(path, e))?;
    if metadata.is_dir() {
        return Ok(Probe::Dir);
    }

    // Use UNIX_EPOCH when the platform can't give us an mtime
    let modified: DateTime<Local> = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH).into();

    Ok(Probe::File {
        size: metadata.len(),
        modified,
    })
}

/// Sums the byte length of every file anywhere beneath `path`.
///
/// Entries that fail (unreadable, dangling link, symlink loop) are recorded
/// and count as zero, so the result is a lower bound rather than an error.
pub fn compute_size(path: &Path) -> Partial<u64> {
    let mut total = Partial::new(0u64);

    // walkdir keeps its own stack of open directories and reports link loops
    for entry in WalkDir::new(path).min_depth(1).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                total.record(ScanError::walk(path, &e));
                continue;
            }
        };

        if entry.file_type().is_dir() {
            continue;
        }

        match entry.metadata() {
            Ok(m) => total.value += m.len(),
            Err(e) => total.record(ScanError::walk(entry.path(), &e)),
        }
    }

    total
}

/// Lists the plain files directly inside `path`. Subdirectories are left out.
///
/// Fails only when `path` itself can't be read.
pub fn list_files(path: &Path) -> Result<Partial<Vec<FileEntry>>, ScanError> {
    let items = fs::read_dir(path).map_err(|e| ScanError::io(path, e))?;
    let mut files = Partial::new(Vec::new());

    for item in items {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                files.record(ScanError::io(path, e));
                continue;
            }
        };

        match probe(&item.path()) {
            Ok(Probe::Dir) => {}
            Ok(Probe::File { size, modified }) => files.value.push(FileEntry {
                name: item.file_name().to_string_lossy().to_string(),
                size,
                modified,
            }),
            Err(e) => files.record(e),
        }
    }

    Ok(files)
}

fn summarize_folder(path: &Path, name: String) -> Result<Partial<FolderSummary>, ScanError> {
    let mut summary = Partial::new(());
    let files = summary.absorb(list_files(path)?);
    let size = summary.absorb(compute_size(path));

    Ok(summary.map(|()| FolderSummary { name, size, files }))
}

/// Builds one `FolderSummary` per directory directly under `root`.
///
/// Plain files at the root level are ignored. A subdirectory that can't be
/// listed is recorded and left out of the report.
pub fn scan_root(root: &Path, clock: &dyn Clock) -> Result<Partial<Report>, ScanError> {
    let items = fs::read_dir(root).map_err(|e| ScanError::io(root, e))?;
    let mut report = Partial::new(Report {
        generated_at: clock.now(),
        folders: Vec::new(),
    });

    for item in items {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                report.record(ScanError::io(root, e));
                continue;
            }
        };
        let item_path = item.path();

        match probe(&item_path) {
            Ok(Probe::Dir) => {
                let name = item.file_name().to_string_lossy().to_string();
                match summarize_folder(&item_path, name) {
                    Ok(summary) => {
                        let summary = report.absorb(summary);
                        log::debug!(
                            "{}: {} bytes, {} files listed",
                            summary.name,
                            summary.size,
                            summary.files.len()
                        );
                        report.value.folders.push(summary);
                    }
                    Err(e) => report.record(e),
                }
            }
            Ok(Probe::File { .. }) => {}
            Err(e) => report.record(e),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    fn write_bytes(path: &Path, n: usize) {
        fs::write(path, vec![0u8; n]).unwrap();
    }

    fn clock() -> FixedClock {
        FixedClock(Local.with_ymd_and_hms(2024, 8, 1, 9, 30, 0).unwrap())
    }

    fn sorted_sizes(files: &[FileEntry]) -> Vec<u64> {
        let mut sizes: Vec<u64> = files.iter().map(|f| f.size).collect();
        sizes.sort_unstable();
        sizes
    }

    #[test]
    fn test_probe_classifies_entries() {
        let dir = tempdir().unwrap();
        write_bytes(&dir.path().join("f.bin"), 42);

        assert_eq!(probe(dir.path()).unwrap(), Probe::Dir);
        match probe(&dir.path().join("f.bin")).unwrap() {
            Probe::File { size, .. } => assert_eq!(size, 42),
            Probe::Dir => panic!("expected a file"),
        }
        assert!(matches!(
            probe(&dir.path().join("missing")),
            Err(ScanError::Io { .. })
        ));
    }

    #[test]
    fn test_empty_directory() {
        let dir = tempdir().unwrap();

        let size = compute_size(dir.path());
        assert_eq!(size.value, 0);
        assert!(size.is_clean());

        let files = list_files(dir.path()).unwrap();
        assert!(files.value.is_empty());
        assert!(files.is_clean());
    }

    #[test]
    fn test_compute_size_is_recursive() {
        let dir = tempdir().unwrap();
        let deep = dir.path().join("a/b/c");
        fs::create_dir_all(&deep).unwrap();
        write_bytes(&dir.path().join("top.bin"), 10);
        write_bytes(&dir.path().join("a/mid.bin"), 200);
        write_bytes(&deep.join("leaf.bin"), 3000);

        let size = compute_size(dir.path());
        assert_eq!(size.value, 3210);
        assert!(size.is_clean());
    }

    #[test]
    fn test_list_files_skips_subdirectories() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        write_bytes(&dir.path().join("nested/inner.bin"), 500);
        write_bytes(&dir.path().join("outer.bin"), 7);

        let files = list_files(dir.path()).unwrap().value;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "outer.bin");
        assert_eq!(files[0].size, 7);
    }

    #[test]
    fn test_list_files_missing_directory_fails() {
        let dir = tempdir().unwrap();
        assert!(list_files(&dir.path().join("gone")).is_err());
    }

    #[test]
    fn test_dangling_link_does_not_block_siblings() {
        let dir = tempdir().unwrap();
        write_bytes(&dir.path().join("x.txt"), 100);
        write_bytes(&dir.path().join("y.txt"), 50);
        symlink(dir.path().join("nowhere"), dir.path().join("broken")).unwrap();

        let size = compute_size(dir.path());
        assert_eq!(size.value, 150);
        assert_eq!(size.errors.len(), 1);

        let files = list_files(dir.path()).unwrap();
        assert_eq!(sorted_sizes(&files.value), vec![50, 100]);
        assert_eq!(files.errors.len(), 1);
    }

    #[test]
    fn test_symlink_loop_terminates() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a");
        fs::create_dir(&a).unwrap();
        write_bytes(&a.join("data.bin"), 64);
        symlink(&a, a.join("again")).unwrap();

        let size = compute_size(dir.path());
        assert_eq!(size.value, 64);
        assert!(!size.is_clean());
    }

    #[test]
    fn test_scan_root_end_to_end() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("A")).unwrap();
        fs::create_dir(root.join("B")).unwrap();
        write_bytes(&root.join("A/x.txt"), 100);
        write_bytes(&root.join("A/y.txt"), 50);
        write_bytes(&root.join("root.txt"), 999);

        let report = scan_root(root, &clock()).unwrap();
        assert!(report.is_clean());
        let mut folders = report.value.folders;
        folders.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(folders.len(), 2);
        assert_eq!(folders[0].name, "A");
        assert_eq!(folders[0].size, 150);
        assert_eq!(sorted_sizes(&folders[0].files), vec![50, 100]);
        assert_eq!(folders[1].name, "B");
        assert_eq!(folders[1].size, 0);
        assert!(folders[1].files.is_empty());
        assert!(
            folders
                .iter()
                .flat_map(|f| f.files.iter())
                .all(|f| f.name != "root.txt")
        );
        assert_eq!(report.value.generated_at, clock().0);
    }

    #[test]
    fn test_scan_root_size_includes_nested_but_listing_does_not() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("A");
        fs::create_dir_all(a.join("deeper")).unwrap();
        write_bytes(&a.join("own.bin"), 10);
        write_bytes(&a.join("deeper/hidden.bin"), 90);

        let report = scan_root(dir.path(), &clock()).unwrap().value;
        let folder = &report.folders[0];
        assert_eq!(folder.size, 100);
        assert_eq!(folder.listed_bytes(), 10);
        assert!(folder.size >= folder.listed_bytes());
        assert_eq!(report.total_size(), 100);
    }

    #[test]
    fn test_scan_root_missing_root_fails() {
        let dir = tempdir().unwrap();
        let result = scan_root(&dir.path().join("absent"), &clock());
        assert!(matches!(result, Err(ScanError::Io { .. })));
    }

    #[test]
    fn test_scan_root_records_dangling_entries() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("ok")).unwrap();
        symlink(dir.path().join("void"), dir.path().join("dead")).unwrap();

        let report = scan_root(dir.path(), &clock()).unwrap();
        assert_eq!(report.value.folders.len(), 1);
        assert_eq!(report.errors.len(), 1);
    }

    #[test]
    fn test_scan_root_is_idempotent() {
        let dir = tempdir().unwrap();
        for (name, n) in [("one", 5), ("two", 17)] {
            fs::create_dir(dir.path().join(name)).unwrap();
            write_bytes(&dir.path().join(name).join("f"), n);
        }

        let sizes = |r: Report| {
            let mut v: Vec<(String, u64, Vec<u64>)> = r
                .folders
                .into_iter()
                .map(|f| {
                    let files = sorted_sizes(&f.files);
                    (f.name, f.size, files)
                })
                .collect();
            v.sort();
            v
        };

        let first = sizes(scan_root(dir.path(), &clock()).unwrap().value);
        let second = sizes(scan_root(dir.path(), &clock()).unwrap().value);
        assert_eq!(first, second);
    }
}
