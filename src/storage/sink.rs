//! Outcome sink: per-source append-only log files mirrored to the console

use eyre::{Context, Result};
use rand::Rng;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Serialized writer for formatted outcome blocks
///
/// Every source gets its own file, `MDS_{source}_{suffix}.log`, where the
/// suffix is fixed for the lifetime of the sink so that repeated runs do not
/// append to each other's files. One lock covers every destination and the
/// console, so a block is never interleaved with another.
///
/// # Example
/// ```no_run
/// use mds_extract::storage::OutcomeSink;
///
/// # fn example() -> eyre::Result<()> {
/// let sink = OutcomeSink::with_random_suffix("out");
/// let block = "WebLogs, 2015-04-16T00:00:00Z, 2015-04-16T00:15:00Z, 1secs, 0 records\n\n";
/// sink.write("WebLogs", block)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OutcomeSink {
    dir: PathBuf,
    suffix: u32,
    console: bool,
    lock: Mutex<()>,
}

impl OutcomeSink {
    pub fn new(dir: impl AsRef<Path>, suffix: u32) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            suffix,
            console: true,
            lock: Mutex::new(()),
        }
    }

    /// Create a sink with a run suffix drawn from `100..1000`
    pub fn with_random_suffix(dir: impl AsRef<Path>) -> Self {
        let suffix = rand::thread_rng().gen_range(100..1000);
        Self::new(dir, suffix)
    }

    /// Stop mirroring blocks to stdout
    pub fn quiet(mut self) -> Self {
        self.console = false;
        self
    }

    pub fn suffix(&self) -> u32 {
        self.suffix
    }

    /// Path of the file receiving blocks for `source`
    pub fn destination(&self, source: &str) -> PathBuf {
        self.dir
            .join(format!("MDS_{}_{}.log", file_safe(source), self.suffix))
    }

    /// Append `block` to the destination for `source` and echo it to stdout
    ///
    /// # Errors
    /// Returns an error if the output directory or file cannot be written.
    pub fn write(&self, source: &str, block: &str) -> Result<()> {
        let path = self.destination(source);
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create output directory: {}", self.dir.display()))?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open output file: {}", path.display()))?;
        file.write_all(block.as_bytes())
            .with_context(|| format!("Failed to append to {}", path.display()))?;

        if self.console {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(block.as_bytes())?;
            stdout.flush()?;
        }

        Ok(())
    }
}

/// Replace characters that cannot appear in a file name
fn file_safe(source: &str) -> String {
    source
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_destination_name() {
        let sink = OutcomeSink::new("/tmp/out", 123);
        assert_eq!(
            sink.destination("WebLogs"),
            PathBuf::from("/tmp/out/MDS_WebLogs_123.log")
        );
        assert_eq!(
            sink.destination("a/b:c"),
            PathBuf::from("/tmp/out/MDS_a_b_c_123.log")
        );
    }

    #[test]
    fn test_random_suffix_range() {
        for _ in 0..50 {
            let sink = OutcomeSink::with_random_suffix(".");
            assert!((100..1000).contains(&sink.suffix()));
        }
    }

    #[test]
    fn test_write_appends_and_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("nested");
        let sink = OutcomeSink::new(&out, 42).quiet();

        sink.write("A", "first\n\n").unwrap();
        sink.write("A", "second\n\n").unwrap();
        sink.write("B", "other\n\n").unwrap();

        let a = std::fs::read_to_string(sink.destination("A")).unwrap();
        assert_eq!(a, "first\n\nsecond\n\n");
        let b = std::fs::read_to_string(sink.destination("B")).unwrap();
        assert_eq!(b, "other\n\n");
    }

    #[test]
    fn test_concurrent_blocks_do_not_interleave() {
        let temp_dir = TempDir::new().unwrap();
        let sink = Arc::new(OutcomeSink::new(temp_dir.path(), 7).quiet());

        let handles: Vec<_> = (0..8)
            .map(|writer| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for block in 0..25 {
                        let mut text = format!("header {} {}\n", writer, block);
                        for line in 0..20 {
                            text.push_str(&format!("line {} {} {}\n", writer, block, line));
                        }
                        text.push('\n');
                        sink.write("shared", &text).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = std::fs::read_to_string(sink.destination("shared")).unwrap();
        let blocks: Vec<&str> = content
            .split("\n\n")
            .filter(|b| !b.is_empty())
            .collect();
        assert_eq!(blocks.len(), 8 * 25);

        for block in blocks {
            let mut lines = block.lines();
            let header = lines.next().unwrap();
            let id = header.strip_prefix("header ").unwrap();
            let body: Vec<_> = lines.collect();
            assert_eq!(body.len(), 20);
            for (i, line) in body.iter().enumerate() {
                assert_eq!(*line, format!("line {} {}", id, i));
            }
        }
    }
}
