//! Sequence file entries and range selection

use std::io::Write;
use std::path::{Path, PathBuf};

/// Patch that creates the history table; its history row is written after it
pub const HISTORY_PATCH: &str = "schema/db_history.sql";

/// One entry of a sequence file: a comment block, a patch file, or both
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// `#` comment lines preceding the patch, joined by newlines
    pub comment: Option<String>,

    /// Patch file path, relative to the sequence root
    pub filename: Option<String>,
}

impl Entry {
    /// An entry for a patch file without comment
    pub fn patch(filename: impl Into<String>) -> Self {
        Self {
            comment: None,
            filename: Some(filename.into()),
        }
    }

    /// Whether the patch belongs to one of the categories (path prefixes)
    ///
    /// An empty category list matches every entry.
    pub fn has_category(&self, categories: &[String]) -> bool {
        if categories.is_empty() {
            return true;
        }
        self.filename
            .as_deref()
            .is_some_and(|filename| categories.iter().any(|c| filename.starts_with(c.as_str())))
    }

    /// Whether the comment or the filename contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        [&self.comment, &self.filename]
            .into_iter()
            .flatten()
            .any(|text| text.contains(needle))
    }
}

impl std::fmt::Display for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.comment, &self.filename) {
            (Some(comment), Some(filename)) => write!(f, "{}\n{}", comment, filename),
            (Some(text), None) | (None, Some(text)) => write!(f, "{}", text),
            (None, None) => Ok(()),
        }
    }
}

/// Errors raised while loading, slicing or concatenating a sequence
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Write error: {0}")]
    Write(#[from] std::io::Error),

    #[error("Not a file: {0:?}")]
    MissingFiles(Vec<String>),

    #[error("string not found: {0:?}")]
    NotFound(String),

    #[error("string not found after start point: {0:?}")]
    NotFoundAfterStart(String),

    #[error("Non-ASCII characters in file {0}")]
    NonAscii(String),
}

/// Ordered list of sequence entries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntrySequence {
    entries: Vec<Entry>,
}

impl EntrySequence {
    /// Wrap a list of entries
    pub fn new(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    /// A sequence of bare patch files, bypassing any sequence file
    pub fn from_patches<I, S>(filenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(filenames.into_iter().map(Entry::patch).collect())
    }

    /// Load a sequence file
    pub fn load(path: &Path) -> Result<Self, SequenceError> {
        let text = std::fs::read_to_string(path).map_err(|source| SequenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let sequence = Self::parse(&text);
        tracing::debug!(path = %path.display(), entries = sequence.len(), "loaded sequence file");
        Ok(sequence)
    }

    /// Parse sequence file text
    ///
    /// `#` lines accumulate into the comment of the next filename line. A
    /// blank line closes a pending comment block as an entry of its own.
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        let mut comments: Vec<&str> = Vec::new();

        for line in text.lines().map(str::trim) {
            if line.is_empty() {
                if !comments.is_empty() {
                    entries.push(Entry {
                        comment: Some(comments.join("\n")),
                        filename: None,
                    });
                    comments.clear();
                }
            } else if line.starts_with('#') {
                comments.push(line);
            } else {
                entries.push(Entry {
                    comment: (!comments.is_empty()).then(|| comments.join("\n")),
                    filename: Some(line.to_string()),
                });
                comments.clear();
            }
        }

        if !comments.is_empty() {
            entries.push(Entry {
                comment: Some(comments.join("\n")),
                filename: None,
            });
        }

        Self::new(entries)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries
    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    /// Patch filenames in order
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|e| e.filename.as_deref())
    }

    /// Index of the first entry at or after `from` containing `needle`
    pub fn find(&self, needle: &str, from: usize) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, entry)| entry.contains(needle))
            .map(|(i, _)| i)
    }

    /// Entries from the first one containing `from` up to (excluding) the
    /// first one containing `to`
    ///
    /// `to` is searched from the start point, so a range can end at a
    /// release marker that also appears earlier in the file.
    pub fn slice(&self, from: Option<&str>, to: Option<&str>) -> Result<Self, SequenceError> {
        let start = match from {
            Some(needle) => self
                .find(needle, 0)
                .ok_or_else(|| SequenceError::NotFound(needle.to_string()))?,
            None => 0,
        };

        let stop = match to {
            Some(needle) => self.find(needle, start).ok_or_else(|| {
                if start == 0 {
                    SequenceError::NotFound(needle.to_string())
                } else {
                    SequenceError::NotFoundAfterStart(needle.to_string())
                }
            })?,
            None => self.len(),
        };

        tracing::debug!(start, stop, "sliced sequence");
        Ok(Self::new(self.entries[start..stop.max(start)].to_vec()))
    }

    /// Keep entries up to and including the `limit`-th patch file
    pub fn limit(&self, limit: usize) -> Self {
        if self.len() < limit {
            return self.clone();
        }
        if limit == 0 {
            return Self::default();
        }

        let mut remaining = limit;
        let mut end = self.len();
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.filename.is_some() {
                remaining -= 1;
                if remaining == 0 {
                    end = i + 1;
                    break;
                }
            }
        }

        Self::new(self.entries[..end].to_vec())
    }

    /// Keep only patches whose path starts with one of `categories`
    pub fn filter_categories(&self, categories: &[String]) -> Self {
        if categories.is_empty() {
            return self.clone();
        }
        Self::new(
            self.entries
                .iter()
                .filter(|entry| entry.has_category(categories))
                .cloned()
                .collect(),
        )
    }

    /// Fail if any patch file is missing under `root`
    pub fn check(&self, root: &Path) -> Result<(), SequenceError> {
        let missing: Vec<String> = self
            .filenames()
            .filter(|filename| !root.join(filename).is_file())
            .map(str::to_string)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SequenceError::MissingFiles(missing))
        }
    }

    /// Write one entry per block, or `No entries`
    pub fn write_list(&self, out: &mut impl Write) -> Result<(), SequenceError> {
        if self.is_empty() {
            writeln!(out, "No entries")?;
        }
        for entry in &self.entries {
            writeln!(out, "{}", entry)?;
        }
        Ok(())
    }

    /// Concatenate every patch, each preceded by its history row
    ///
    /// With `check` set, patches must be pure ASCII.
    pub fn cat(&self, root: &Path, out: &mut impl Write, check: bool) -> Result<(), SequenceError> {
        for filename in self.filenames() {
            cat_patch_file(root, filename, out, check)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a EntrySequence {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn write_history_entry(out: &mut impl Write, filename: &str) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "-- DB history entry for {}", filename)?;
    writeln!(out, "INSERT INTO db_history (filename) VALUES ('{}');", filename)?;
    writeln!(out, "SET @current_patch_id=LAST_INSERT_ID();")?;
    writeln!(out)
}

fn cat_patch_file(root: &Path, filename: &str, out: &mut impl Write, check: bool) -> Result<(), SequenceError> {
    // The history table does not exist until its own patch has run
    let log_after = filename == HISTORY_PATCH;
    if !log_after {
        write_history_entry(out, filename)?;
    }

    let path = root.join(filename);
    let data = std::fs::read_to_string(&path).map_err(|source| SequenceError::Io { path, source })?;
    let data = data.trim();

    if check && !data.is_ascii() {
        return Err(SequenceError::NonAscii(filename.to_string()));
    }
    writeln!(out, "{}", data)?;

    if log_after {
        write_history_entry(out, filename)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEQUENCE: &str = "\
# Release 2.3
schema/a.sql
view/b.sql

# Production
# (deployed 2024-01-05)

data/c.sql
# Release 2.4
schema/d.sql
view/e.sql
# trailing note
";

    fn names(seq: &EntrySequence) -> Vec<String> {
        seq.iter().map(|e| e.to_string()).collect()
    }

    #[test]
    fn parse_groups_comments() {
        let seq = EntrySequence::parse(SEQUENCE);

        assert_eq!(seq.len(), 7);
        assert_eq!(seq.iter().next().unwrap().comment.as_deref(), Some("# Release 2.3"));
        assert_eq!(
            seq.iter().nth(2).unwrap(),
            &Entry {
                comment: Some("# Production\n# (deployed 2024-01-05)".to_string()),
                filename: None,
            }
        );
        assert_eq!(seq.iter().last().unwrap().to_string(), "# trailing note");
        assert_eq!(seq.filenames().count(), 5);
    }

    #[test]
    fn slice_between_markers() {
        let seq = EntrySequence::parse(SEQUENCE);

        let sliced = seq.slice(Some("Production"), Some("2.4")).unwrap();
        assert_eq!(sliced.filenames().collect::<Vec<_>>(), ["data/c.sql"]);

        let tail = seq.slice(Some("Production"), None).unwrap();
        assert_eq!(tail.filenames().collect::<Vec<_>>(), ["data/c.sql", "schema/d.sql", "view/e.sql"]);

        let head = seq.slice(None, Some("Production")).unwrap();
        assert_eq!(head.filenames().collect::<Vec<_>>(), ["schema/a.sql", "view/b.sql"]);
    }

    #[test]
    fn slice_errors() {
        let seq = EntrySequence::parse(SEQUENCE);

        assert!(matches!(seq.slice(Some("9.9"), None), Err(SequenceError::NotFound(_))));
        assert!(matches!(seq.slice(None, Some("9.9")), Err(SequenceError::NotFound(_))));
        assert!(matches!(
            seq.slice(Some("2.4"), Some("2.3")),
            Err(SequenceError::NotFoundAfterStart(_))
        ));
    }

    #[test]
    fn limit_counts_patches() {
        let seq = EntrySequence::parse(SEQUENCE);

        assert_eq!(seq.limit(2).filenames().collect::<Vec<_>>(), ["schema/a.sql", "view/b.sql"]);
        // Comment-only entries before the third patch are kept
        assert_eq!(seq.limit(3).len(), 4);
        assert!(seq.limit(0).is_empty());
        assert_eq!(seq.limit(100), seq);
        // Limiting to the last patch drops the trailing comment
        assert_eq!(seq.limit(5).len(), 6);
    }

    #[test]
    fn filter_by_category() {
        let seq = EntrySequence::parse(SEQUENCE);
        let views = seq.filter_categories(&["view".to_string()]);

        assert_eq!(names(&views), ["view/b.sql", "view/e.sql"]);
        assert_eq!(seq.filter_categories(&[]), seq);
    }

    #[test]
    fn list_output() {
        let mut out = Vec::new();
        EntrySequence::default().write_list(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "No entries\n");

        let mut out = Vec::new();
        EntrySequence::from_patches(["a.sql"]).write_list(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a.sql\n");
    }

    #[test]
    fn entry_matching() {
        let entry = Entry {
            comment: Some("# Release 2.4".to_string()),
            filename: Some("schema/x.sql".to_string()),
        };

        assert!(entry.contains("2.4"));
        assert!(entry.contains("x.sql"));
        assert!(!entry.contains("view"));
        assert!(entry.has_category(&["schema".to_string(), "data".to_string()]));
        assert!(!Entry { comment: Some("#".into()), filename: None }.has_category(&["schema".to_string()]));
    }
}
