use crate::error::{DealerError, Result};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Prevents partial writes from corrupting the CSV store.
///
/// Failures surface as [`DealerError::Persistence`].
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let fail = |e: std::io::Error| DealerError::persistence(path, e);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(fail)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(fail)?;
    tmp.write_all(data).map_err(fail)?;
    tmp.persist(path).map_err(|e| fail(e.error))?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Write a file only if it does not already exist. Returns true if written.
pub fn write_if_missing(path: &Path, data: &[u8]) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    atomic_write(path, data)?;
    Ok(true)
}

/// Append one line to a file, creating it (and its parents) if needed.
///
/// The line is flushed to disk with `sync_data` before returning so an
/// appended record survives a crash.
pub fn append_line(path: &Path, line: &str) -> Result<()> {
    let fail = |e: std::io::Error| DealerError::persistence(path, e);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(fail)?;
    }
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(fail)?;
    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    f.write_all(buf.as_bytes()).map_err(fail)?;
    f.sync_data().map_err(fail)?;
    Ok(())
}

const TAIL_BLOCK: u64 = 64 * 1024;

/// The last `n` non-empty lines of `path`, oldest first.
///
/// Reads backwards in fixed-size blocks, so the cost follows `n` rather than
/// the file size. A missing file has no lines.
pub fn read_tail_lines(path: &Path, n: usize) -> Result<Vec<String>> {
    tail_lines(path, n, TAIL_BLOCK)
}

fn tail_lines(path: &Path, n: usize, block: u64) -> Result<Vec<String>> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(DealerError::Io(e)),
    };
    let mut pos = file.metadata()?.len();
    let mut buf: Vec<u8> = Vec::new();

    // Past the start of the file the first segment is partial, so n complete
    // lines need n + 1 newlines.
    while pos > 0 && buf.iter().filter(|&&b| b == b'\n').count() <= n {
        let start = pos.saturating_sub(block);
        let mut chunk = vec![0u8; (pos - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(&mut chunk)?;
        chunk.extend_from_slice(&buf);
        buf = chunk;
        pos = start;
    }

    let text = String::from_utf8_lossy(&buf);
    let mut segments = text.lines();
    if pos > 0 {
        segments.next();
    }
    let lines: Vec<String> = segments
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect();
    let skip = lines.len().saturating_sub(n);
    Ok(lines.into_iter().skip(skip).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inventory.csv");
        atomic_write(&path, b"vin,price").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "vin,price");
    }

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/inventory.csv");
        atomic_write(&path, b"data").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn atomic_write_into_file_path_is_persistence_failure() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();
        let err = atomic_write(&blocker.join("inventory.csv"), b"data").unwrap_err();
        assert!(err.is_persistence(), "got {err:?}");
    }

    #[test]
    fn append_line_accumulates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs/actions.jsonl");
        append_line(&path, "{\"a\":1}").unwrap();
        append_line(&path, "{\"a\":2}").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"a\":1}\n{\"a\":2}\n");
    }

    #[test]
    fn write_if_missing_skips_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dealer.yaml");
        std::fs::write(&path, b"original").unwrap();
        let written = write_if_missing(&path, b"new").unwrap();
        assert!(!written);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");
    }

    #[test]
    fn tail_lines_reads_across_blocks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("actions.jsonl");
        for i in 0..20 {
            append_line(&path, &format!("line-{i:02}")).unwrap();
        }
        let tail = tail_lines(&path, 3, 5).unwrap();
        assert_eq!(tail, vec!["line-17", "line-18", "line-19"]);

        let all = tail_lines(&path, 50, 5).unwrap();
        assert_eq!(all.len(), 20);
        assert_eq!(all[0], "line-00");
    }

    #[test]
    fn tail_lines_of_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let tail = read_tail_lines(&dir.path().join("nope.jsonl"), 5).unwrap();
        assert!(tail.is_empty());
    }
}
