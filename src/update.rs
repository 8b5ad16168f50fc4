//! Archive update driver.
//!
//! One [`ZipUpdater`] processes archives strictly sequentially, and the
//! members of each archive strictly sequentially, in central directory
//! order. A member whose filtered content is byte-identical to the
//! original does not dirty the archive, and an archive that never gets
//! dirty is not touched on disk at all. Failures (unreadable archive,
//! failed filter, unsupported member, failed commit) are printed as they
//! occur, counted, and never abort the run.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::filter::{FilterOutcome, run_filter};
use crate::io::LocalFileReader;
use crate::zip::{ZipFileEntry, ZipParser, ZipWriter};

/// Configuration for one run, threaded explicitly instead of living in
/// process-global state.
pub struct UpdateOptions {
    /// Shell command filtering each member from stdin to stdout.
    pub command: String,
    /// Pattern tested against each member's full internal path.
    /// `None` matches every non-directory member.
    pub pattern: Option<Regex>,
    /// Report `Updating:`/`Unchanged:` per member.
    pub verbose: bool,
}

/// Result of updating a single archive.
pub struct UpdateOutcome {
    /// At least one member changed and the archive was rewritten.
    pub changed: bool,
    /// Member-level and commit failures for this archive.
    pub failures: u64,
}

/// Batch updater for zip archives.
pub struct ZipUpdater {
    options: UpdateOptions,
}

impl ZipUpdater {
    pub fn new(options: UpdateOptions) -> Self {
        Self { options }
    }

    /// Process every archive path in order, even after failures.
    ///
    /// Returns the total failure count across all archives and members;
    /// zero means the whole run succeeded.
    pub async fn update_all(&self, paths: &[String]) -> u64 {
        let mut failures = 0u64;

        for path in paths {
            match self.update_archive(Path::new(path)).await {
                Ok(outcome) => failures += outcome.failures,
                Err(e) => {
                    // Unreadable or unparseable archive: skipped entirely.
                    eprintln!("{path}: {e:#}");
                    failures += 1;
                }
            }
        }

        failures
    }

    /// Update one archive in place.
    ///
    /// Every matching non-directory member is piped through the filter
    /// command; if at least one member's content changed, the archive is
    /// rewritten via a temporary file and an atomic rename. Member-level
    /// failures leave that member untouched and are tallied in the
    /// returned outcome.
    ///
    /// # Errors
    ///
    /// Returns an error only when the archive itself cannot be opened or
    /// parsed; no partial processing happens in that case.
    pub async fn update_archive(&self, path: &Path) -> Result<UpdateOutcome> {
        let reader = Arc::new(
            LocalFileReader::new(path)
                .with_context(|| format!("cannot open {}", path.display()))?,
        );
        let parser = ZipParser::new(reader);
        let entries = parser
            .read_entries()
            .await
            .with_context(|| format!("cannot read {} as a zip archive", path.display()))?;

        let mut failures = 0u64;
        let mut replacements: HashMap<usize, Vec<u8>> = HashMap::new();

        for (index, entry) in entries.iter().enumerate() {
            if !self.matches(entry) {
                continue;
            }

            let content = match parser.read_member(entry).await {
                Ok(content) => content,
                Err(e) => {
                    eprintln!("{}: {}: {e:#}", path.display(), entry.file_name);
                    failures += 1;
                    continue;
                }
            };

            match run_filter(&content, &self.options.command).await {
                FilterOutcome::Replaced(output) if output == content => {
                    if self.options.verbose {
                        println!("Unchanged: {}", entry.file_name);
                    }
                }
                FilterOutcome::Replaced(output) => {
                    replacements.insert(index, output);
                }
                FilterOutcome::Failed(reason) => {
                    eprintln!("{}: {}: {reason}", path.display(), entry.file_name);
                    failures += 1;
                }
            }
        }

        if replacements.is_empty() {
            return Ok(UpdateOutcome {
                changed: false,
                failures,
            });
        }

        match self.commit(path, &parser, &entries, &replacements).await {
            Ok(()) => {
                // Updated members are reported only once they are on
                // disk; a failed commit must not claim updates.
                if self.options.verbose {
                    for (index, entry) in entries.iter().enumerate() {
                        if replacements.contains_key(&index) {
                            println!("Updating: {}", entry.file_name);
                        }
                    }
                }
                Ok(UpdateOutcome {
                    changed: true,
                    failures,
                })
            }
            Err(e) => {
                // The original file is still intact.
                eprintln!("{}: {e:#}", path.display());
                Ok(UpdateOutcome {
                    changed: false,
                    failures: failures + 1,
                })
            }
        }
    }

    /// Full internal path matching: `deep/path/x.xml` is tested whole,
    /// never just the base name, and always in forward-slash form.
    fn matches(&self, entry: &ZipFileEntry) -> bool {
        if entry.is_directory {
            return false;
        }
        match &self.options.pattern {
            Some(pattern) => pattern.is_match(&entry.file_name),
            None => true,
        }
    }

    /// Serialize the updated archive and swap it over the original.
    async fn commit<R: crate::io::ReadAt>(
        &self,
        path: &Path,
        parser: &ZipParser<R>,
        entries: &[ZipFileEntry],
        replacements: &HashMap<usize, Vec<u8>>,
    ) -> Result<()> {
        let mut writer = ZipWriter::new();

        for (index, entry) in entries.iter().enumerate() {
            if let Some(content) = replacements.get(&index) {
                writer.append_filtered(entry, content)?;
            } else {
                let payload = parser.read_compressed(entry).await?;
                writer.append_raw(entry, &payload)?;
            }
        }

        let image = writer.finish()?;

        // Never overwrite in place: a failed write must leave the
        // original archive intact.
        let tmp = sibling_tmp_path(path);
        if let Err(e) = tokio::fs::write(&tmp, &image).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("writing {}", tmp.display()));
        }
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("replacing {}", path.display()));
        }

        Ok(())
    }
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
