//! Jar manifest reading.

use crate::bundler::error::{ErrorExt, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

const MANIFEST_ENTRY: &str = "META-INF/MANIFEST.MF";

/// Main section of a jar manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: HashMap<String, String>,
}

impl Manifest {
    /// Reads `META-INF/MANIFEST.MF` out of `jar`.
    pub fn load(jar: &Path) -> Result<Self> {
        let file = std::fs::File::open(jar).fs_context("opening jar", jar)?;
        let mut archive = zip::ZipArchive::new(file)?;
        let mut entry = archive.by_name(MANIFEST_ENTRY)?;

        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .fs_context("reading manifest", jar)?;

        Ok(Self::parse(&text))
    }

    /// Parses the main section of manifest text.
    ///
    /// Parsing stops at the first empty line. Lines starting with a space
    /// continue the previous value, lines without a key are skipped, and the
    /// first definition of a key wins.
    pub fn parse(text: &str) -> Self {
        let mut entries = HashMap::new();
        let mut current: Option<(String, String)> = None;

        for raw in text.split('\n') {
            let line = raw.trim_end_matches('\r');
            if line.is_empty() {
                break;
            }

            if let Some(rest) = line.strip_prefix(' ') {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(rest);
                }
                continue;
            }

            flush(&mut entries, current.take());

            let Some(colon) = line.find(':').filter(|&i| i > 0) else {
                continue;
            };
            let key = &line[..colon];
            let value = &line[colon + 1..];
            let value = value.strip_prefix(' ').unwrap_or(value);
            current = Some((key.to_string(), value.to_string()));
        }
        flush(&mut entries, current);

        Self { entries }
    }

    /// Looks up `key` exactly.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn flush(entries: &mut HashMap<String, String>, pending: Option<(String, String)>) {
    if let Some((key, value)) = pending {
        entries.entry(key).or_insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_basic_and_crlf() {
        let manifest = Manifest::parse(
            "Manifest-Version: 1.0\r\nMain-Class: com.example.Main\r\nCreated-By:17\r\n",
        );
        assert_eq!(manifest.get("Main-Class"), Some("com.example.Main"));
        assert_eq!(manifest.get("Created-By"), Some("17"));
        assert_eq!(manifest.len(), 3);
    }

    #[test]
    fn test_continuation_lines_are_concatenated() {
        let manifest = Manifest::parse(
            "Main-Class: com.example.very.long.packa\n ge.Main\n Suffix\nOther: x\n",
        );
        assert_eq!(manifest.get("Main-Class"), Some("com.example.very.long.package.MainSuffix"));
        assert_eq!(manifest.get("Other"), Some("x"));
    }

    #[test]
    fn test_first_definition_wins_and_malformed_skipped() {
        let manifest = Manifest::parse(
            ": no key\nnot a header\nMain-Class: First\n continued\nMain-Class: Second\n",
        );
        assert_eq!(manifest.get("Main-Class"), Some("Firstcontinued"));
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn test_orphan_continuation_ignored() {
        let manifest = Manifest::parse(" orphan\nKey: v\n");
        assert_eq!(manifest.get("Key"), Some("v"));
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn test_stops_at_main_section_end() {
        let manifest = Manifest::parse("Main-Class: A\n\nName: section\nMain-Class: B\n");
        assert_eq!(manifest.get("Main-Class"), Some("A"));
        assert!(manifest.get("Name").is_none());
    }

    #[test]
    fn test_only_one_space_after_colon_dropped() {
        let manifest = Manifest::parse("Key:  two spaces\n");
        assert_eq!(manifest.get("Key"), Some(" two spaces"));
    }

    #[test]
    fn test_load_from_jar() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("app.jar");
        let mut writer = zip::ZipWriter::new(std::fs::File::create(&jar).unwrap());
        writer
            .start_file(MANIFEST_ENTRY, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer
            .write_all(b"Manifest-Version: 1.0\nMain-Class: demo.Main\n")
            .unwrap();
        writer.finish().unwrap();

        let manifest = Manifest::load(&jar).unwrap();
        assert_eq!(manifest.get("Main-Class"), Some("demo.Main"));
    }

    #[test]
    fn test_load_rejects_non_zip() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("broken.jar");
        std::fs::write(&jar, b"not a zip").unwrap();
        assert!(Manifest::load(&jar).is_err());
    }
}
