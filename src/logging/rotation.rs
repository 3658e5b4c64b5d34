//! Rotating daily log file sink
//!
//! One log file per UTC day, `crawler_<YYYY-MM-DD>.log`. When the active file
//! crosses the configured size threshold it is renamed into numbered backups
//! (`.1` newest, `.5` oldest by default) and a fresh file is opened; backups
//! beyond the retention count are deleted. A new calendar day simply starts a
//! new dated file. All writes are UTF-8 so non-Latin page content survives
//! the trip to disk.

use chrono::{NaiveDate, Utc};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// File sink with size-based rotation and bounded backup retention
#[derive(Debug)]
pub struct RotatingFileSink {
    directory: PathBuf,
    max_bytes: u64,
    retention: u32,
    current_day: NaiveDate,
    file: File,
    written: u64,
}

impl RotatingFileSink {
    /// Opens the sink, creating the log directory and today's file if needed
    pub fn open(directory: &Path, max_bytes: u64, retention: u32) -> io::Result<Self> {
        fs::create_dir_all(directory)?;

        let current_day = Utc::now().date_naive();
        let path = Self::file_path(directory, current_day);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let written = file.metadata()?.len();

        Ok(Self {
            directory: directory.to_path_buf(),
            max_bytes,
            retention,
            current_day,
            file,
            written,
        })
    }

    /// Path of the active log file for a given day
    pub fn file_path(directory: &Path, day: NaiveDate) -> PathBuf {
        directory.join(format!("crawler_{}.log", day.format("%Y-%m-%d")))
    }

    /// Path of the active log file right now
    pub fn current_path(&self) -> PathBuf {
        Self::file_path(&self.directory, self.current_day)
    }

    /// Writes one rendered entry (may span multiple physical lines) followed
    /// by a newline, rotating first if the day changed or the size threshold
    /// was crossed
    pub fn write_entry(&mut self, rendered: &str) -> io::Result<()> {
        let today = Utc::now().date_naive();
        if today != self.current_day {
            self.roll_to_day(today)?;
        } else if self.written >= self.max_bytes {
            self.rotate()?;
        }

        self.file.write_all(rendered.as_bytes())?;
        self.file.write_all(b"\n")?;
        self.written += rendered.len() as u64 + 1;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }

    /// Starts a fresh file for a new calendar day
    fn roll_to_day(&mut self, day: NaiveDate) -> io::Result<()> {
        self.file.flush()?;
        let path = Self::file_path(&self.directory, day);
        self.file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.written = self.file.metadata()?.len();
        self.current_day = day;
        Ok(())
    }

    /// Shifts backups down and reopens a fresh active file
    ///
    /// `crawler_<day>.log` becomes `.1`, `.1` becomes `.2`, and so on; the
    /// backup at the retention index is deleted.
    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        let base = self.current_path();

        let oldest = backup_path(&base, self.retention);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }

        for index in (1..self.retention).rev() {
            let from = backup_path(&base, index);
            if from.exists() {
                fs::rename(&from, backup_path(&base, index + 1))?;
            }
        }

        fs::rename(&base, backup_path(&base, 1))?;

        self.file = OpenOptions::new().create(true).append(true).open(&base)?;
        self.written = 0;
        Ok(())
    }
}

/// Numbered backup path: `crawler_<day>.log.3`
fn backup_path(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{}", index));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_creates_directory_and_dated_file() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("logs");

        let sink = RotatingFileSink::open(&log_dir, 1024 * 1024, 5).unwrap();
        assert!(log_dir.exists());

        let name = sink.current_path();
        let name = name.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("crawler_"));
        assert!(name.ends_with(".log"));
    }

    #[test]
    fn test_single_rotation_produces_first_backup() {
        let dir = tempdir().unwrap();
        let mut sink = RotatingFileSink::open(dir.path(), 200, 5).unwrap();
        let base = sink.current_path();

        // Write until the threshold is crossed, then one more entry
        for i in 0..10 {
            sink.write_entry(&format!("entry number {} padding padding padding", i))
                .unwrap();
        }

        assert!(backup_path(&base, 1).exists(), "expected .log.1 backup");
        assert!(!backup_path(&base, 2).exists(), "only one rotation expected");
    }

    #[test]
    fn test_retention_bounds_backup_count() {
        let dir = tempdir().unwrap();
        let mut sink = RotatingFileSink::open(dir.path(), 100, 5).unwrap();
        let base = sink.current_path();

        // Force well over six rotations
        for i in 0..200 {
            sink.write_entry(&format!("line {} aaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", i))
                .unwrap();
        }

        for index in 1..=5 {
            assert!(
                backup_path(&base, index).exists(),
                "backup .{} should exist",
                index
            );
        }
        assert!(
            !backup_path(&base, 6).exists(),
            "backups beyond retention must be deleted"
        );
    }

    #[test]
    fn test_rotation_preserves_newest_content_in_first_backup() {
        let dir = tempdir().unwrap();
        let mut sink = RotatingFileSink::open(dir.path(), 80, 5).unwrap();
        let base = sink.current_path();

        sink.write_entry(&"first batch ".repeat(8)).unwrap();
        sink.write_entry("second batch second batch second batch second batch")
            .unwrap();

        // The second write rotated; the first batch lives in .1
        let backup = fs::read_to_string(backup_path(&base, 1)).unwrap();
        assert!(backup.contains("first batch"));

        let active = fs::read_to_string(&base).unwrap();
        assert!(active.contains("second batch"));
    }

    #[test]
    fn test_unicode_round_trip() {
        let dir = tempdir().unwrap();
        let mut sink = RotatingFileSink::open(dir.path(), 1024 * 1024, 5).unwrap();

        let line = "[INFO] [EXTRACT] Пляжный отель — 東京タワー — مرحبا";
        sink.write_entry(line).unwrap();
        sink.flush().unwrap();

        let content = fs::read_to_string(sink.current_path()).unwrap();
        assert!(content.contains(line));
    }

    #[test]
    fn test_reopen_appends_to_existing_file() {
        let dir = tempdir().unwrap();

        {
            let mut sink = RotatingFileSink::open(dir.path(), 1024, 5).unwrap();
            sink.write_entry("before reopen").unwrap();
            sink.flush().unwrap();
        }

        let mut sink = RotatingFileSink::open(dir.path(), 1024, 5).unwrap();
        sink.write_entry("after reopen").unwrap();
        sink.flush().unwrap();

        let content = fs::read_to_string(sink.current_path()).unwrap();
        assert!(content.contains("before reopen"));
        assert!(content.contains("after reopen"));
    }
}
