//! Incremental tail of one append-only `<ticker>.jsonl` feed.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::debug;

use swinglab_core::data::{latest_sample, FeedSample};

/// Reads only what was appended since the previous poll.
///
/// The offset advances past complete lines only; a trailing partial line is
/// re-read on the next poll once its newline lands. A file shorter than the
/// stored offset was truncated or replaced and is read again from the start.
#[derive(Debug, Clone)]
pub struct FeedTail {
    path: PathBuf,
    offset: u64,
}

impl FeedTail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Latest priced sample among newly completed lines, if any.
    pub fn poll(&mut self) -> io::Result<Option<FeedSample>> {
        let mut file = File::open(&self.path)?;
        let len = file.metadata()?.len();
        if len < self.offset {
            debug!("{} truncated, rereading from start", self.path.display());
            self.offset = 0;
        }
        if len == self.offset {
            return Ok(None);
        }

        file.seek(SeekFrom::Start(self.offset))?;
        let mut buf = Vec::with_capacity((len - self.offset) as usize);
        file.read_to_end(&mut buf)?;

        let Some(end) = buf.iter().rposition(|&b| b == b'\n') else {
            return Ok(None);
        };
        let complete = &buf[..=end];
        self.offset += complete.len() as u64;

        let text = String::from_utf8_lossy(complete);
        let scan = latest_sample(text.lines());
        if scan.malformed > 0 {
            debug!(
                malformed = scan.malformed,
                "skipped lines in {}",
                self.path.display()
            );
        }
        Ok(scan.latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn append(path: &Path, text: &str) {
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(text.as_bytes()).unwrap();
    }

    #[test]
    fn reads_only_new_complete_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("T.jsonl");
        append(&path, "{\"price\":40}\n{\"price\":42}\n{\"price\":4");

        let mut tail = FeedTail::new(&path);
        assert_eq!(tail.poll().unwrap().unwrap().price, 0.42);
        assert_eq!(tail.poll().unwrap(), None);

        append(&path, "5}\n");
        assert_eq!(tail.poll().unwrap().unwrap().price, 0.45);
        assert_eq!(tail.poll().unwrap(), None);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("T.jsonl");
        append(&path, "{\"price\":30}\nnot json\n{\"volume\":1}\n");
        let mut tail = FeedTail::new(&path);
        assert_eq!(tail.poll().unwrap().unwrap().price, 0.30);
    }

    #[test]
    fn truncation_resets_offset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("T.jsonl");
        append(&path, "{\"price\":30}\n{\"price\":31}\n");
        let mut tail = FeedTail::new(&path);
        tail.poll().unwrap();

        std::fs::write(&path, "{\"price\":55}\n").unwrap();
        assert_eq!(tail.poll().unwrap().unwrap().price, 0.55);
        assert_eq!(tail.offset(), 13);
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut tail = FeedTail::new("/definitely/not/here.jsonl");
        assert!(tail.poll().is_err());
    }
}
