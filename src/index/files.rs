//! On-disk layout of downloaded index pages.
//!
//! `<index_dir>/<safe pattern>/page_NNNN.json`, one file per API page,
//! written atomically so a non-empty file is always a complete page.

use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

const PAGE_PREFIX: &str = "page_";
const PAGE_SUFFIX: &str = ".json";

/// Directory name for a URL pattern.
pub fn safe_pattern_name(pattern: &str) -> String {
    pattern.replace('/', "_").replace('*', "STAR")
}

pub fn pattern_dir(index_dir: &Path, pattern: &str) -> PathBuf {
    index_dir.join(safe_pattern_name(pattern))
}

pub fn page_file_name(page: u32) -> String {
    format!("{}{:04}{}", PAGE_PREFIX, page, PAGE_SUFFIX)
}

fn page_number(path: &Path) -> Option<u32> {
    path.file_name()?
        .to_str()?
        .strip_prefix(PAGE_PREFIX)?
        .strip_suffix(PAGE_SUFFIX)?
        .parse()
        .ok()
}

fn is_non_empty(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false)
}

/// Page numbers already downloaded for a pattern directory.
///
/// Empty files do not count; they are fetched again.
pub fn existing_pages(dir: &Path) -> BTreeSet<u32> {
    let Ok(entries) = fs::read_dir(dir) else {
        return BTreeSet::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| is_non_empty(p))
        .filter_map(|p| page_number(&p))
        .collect()
}

/// Every non-empty page file under the index directory, sorted by path.
pub fn list_page_files(index_dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !index_dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(index_dir)? {
        let dir = entry?.path();
        if !dir.is_dir() {
            continue;
        }
        for page in fs::read_dir(&dir)? {
            let path = page?.path();
            if page_number(&path).is_some() && is_non_empty(&path) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Write a page via a temp file in the same directory and rename it into place.
pub fn write_page_atomic(path: &Path, body: &str) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(body.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Downloaded pages for one pattern directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternFiles {
    pub pattern: String,
    pub files: usize,
    pub bytes: u64,
}

/// Page count and size per pattern directory, for `status`.
pub fn index_summary(index_dir: &Path) -> io::Result<Vec<PatternFiles>> {
    let mut summary: Vec<PatternFiles> = Vec::new();
    for path in list_page_files(index_dir)? {
        let Some(pattern) = path
            .parent()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
        else {
            continue;
        };
        let bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        match summary.iter_mut().find(|s| s.pattern == pattern) {
            Some(entry) => {
                entry.files += 1;
                entry.bytes += bytes;
            }
            None => summary.push(PatternFiles {
                pattern,
                files: 1,
                bytes,
            }),
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_names() {
        assert_eq!(
            safe_pattern_name("streeteasy.com/sale/*"),
            "streeteasy.com_sale_STAR"
        );
        assert_eq!(page_file_name(7), "page_0007.json");
        assert_eq!(page_number(Path::new("x/page_0012.json")), Some(12));
        assert_eq!(page_number(Path::new("x/page_0012.json.tmp")), None);
    }

    #[test]
    fn test_existing_pages_ignores_empty_and_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        write_page_atomic(&dir.path().join(page_file_name(0)), "[]").unwrap();
        fs::write(dir.path().join(page_file_name(1)), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let pages = existing_pages(dir.path());
        assert_eq!(pages.into_iter().collect::<Vec<_>>(), vec![0]);
        assert!(existing_pages(&dir.path().join("missing")).is_empty());
    }

    #[test]
    fn test_summary_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let sale = pattern_dir(dir.path(), "ex.com/sale/*");
        let rental = pattern_dir(dir.path(), "ex.com/rental/*");
        write_page_atomic(&sale.join(page_file_name(1)), "abcd").unwrap();
        write_page_atomic(&sale.join(page_file_name(0)), "ab").unwrap();
        write_page_atomic(&rental.join(page_file_name(0)), "a").unwrap();

        let files = list_page_files(dir.path()).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files[0].ends_with("ex.com_rental_STAR/page_0000.json"));

        let summary = index_summary(dir.path()).unwrap();
        let sale_summary = summary
            .iter()
            .find(|s| s.pattern == "ex.com_sale_STAR")
            .unwrap();
        assert_eq!(sale_summary.files, 2);
        assert_eq!(sale_summary.bytes, 6);
    }
}
