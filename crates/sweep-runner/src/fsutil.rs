use crate::error::RunnerResult;
use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

pub fn ensure_dir(path: &Path) -> RunnerResult<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// Resolves `path` against `root` unless it is already absolute.
pub fn resolve_under(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Writes `bytes` to a sibling temp file, fsyncs it, then renames it over
/// `path`. Readers see either the previous file or the new one, never a torn
/// mix of both.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> RunnerResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }
    let ts = Utc::now().timestamp_micros();
    let pid = std::process::id();
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("tmpfile");
    let tmp = path.with_file_name(format!(".{}.tmp.{}.{}.{}", name, pid, ts, seq));
    let written = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        });
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

/// Removes `dir` if present and creates it again empty.
pub fn recreate_dir(dir: &Path) -> RunnerResult<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    ensure_dir(dir)
}

#[cfg(test)]
pub(crate) fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "sweep_{}_{}_{}",
        tag,
        std::process::id(),
        Utc::now().timestamp_micros()
    ));
    fs::create_dir_all(&dir).expect("scratch dir");
    dir
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_replaces_contents_and_leaves_no_temp_files() {
        let root = scratch_dir("atomic");
        let target = root.join("table.csv");
        atomic_write_bytes(&target, b"a,b\n1,2\n").expect("first write");
        atomic_write_bytes(&target, b"a,b\n3,4\n").expect("second write");
        assert_eq!(fs::read_to_string(&target).expect("read"), "a,b\n3,4\n");
        let leftovers: Vec<_> = fs::read_dir(&root)
            .expect("list")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty(), "temp files left: {:?}", leftovers);
        let _ = fs::remove_dir_all(root);
    }

    fn temp_files(dir: &Path) -> Vec<String> {
        fs::read_dir(dir)
            .expect("list")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n.contains(".tmp."))
            .collect()
    }

    #[test]
    fn back_to_back_writes_never_share_a_temp_file() {
        let root = scratch_dir("atomic_burst");
        let target = root.join("table.csv");
        for i in 0..200 {
            atomic_write_bytes(&target, format!("n\n{}\n", i).as_bytes()).expect("write");
        }
        assert_eq!(fs::read_to_string(&target).expect("read"), "n\n199\n");
        assert!(temp_files(&root).is_empty());
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn failed_rename_keeps_target_and_cleans_up() {
        let root = scratch_dir("atomic_rename_fail");
        let target = root.join("table.csv");
        ensure_dir(&target).expect("dir in the way");
        fs::write(target.join("keep"), "x").expect("occupy dir");

        assert!(atomic_write_bytes(&target, b"a,b\n").is_err());
        assert!(target.is_dir());
        assert_eq!(fs::read_to_string(target.join("keep")).expect("read"), "x");
        assert!(temp_files(&root).is_empty(), "{:?}", temp_files(&root));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn recreate_dir_drops_old_contents() {
        let root = scratch_dir("recreate");
        let out = root.join("graphs");
        ensure_dir(&out).expect("mkdir");
        fs::write(out.join("stale.csv"), "x").expect("write stale");
        recreate_dir(&out).expect("recreate");
        assert!(out.is_dir());
        assert_eq!(fs::read_dir(&out).expect("list").count(), 0);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn resolve_under_keeps_absolute_paths() {
        let root = PathBuf::from("/tmp/sweep_proj");
        assert_eq!(
            resolve_under(&root, Path::new("build")),
            root.join("build")
        );
        assert_eq!(
            resolve_under(&root, Path::new("/opt/bin")),
            PathBuf::from("/opt/bin")
        );
    }
}
