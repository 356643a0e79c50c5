use super::error::ExtractError;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::debug;

/// Directory under the download path receiving the bulk rule files.
pub const OWASP_DIR: &str = "owasp";

/// Files materialized from a rule archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedRuleSet {
    /// Directory holding the bulk rule and data files
    pub source_dir: PathBuf,
    /// Setup file to load before the bulk rules, when the archive has one
    pub example_file: Option<PathBuf>,
    pub files_written: usize,
}

/// Unpack a gzip tarball entry by entry.
///
/// Regular files under a `/rules/` directory land in `<target_dir>/owasp/`
/// flattened to their base name. The entry named `example_file_name` lands
/// in `<target_dir>/<example_file_name>` wherever it lives in the archive.
/// Everything else is skipped. An archive without a single `.conf` file under
/// `/rules/` is rejected. On error, files already written stay in place.
pub fn extract(
    archive_path: &Path,
    target_dir: &Path,
    example_file_name: &str,
) -> Result<ExtractedRuleSet, ExtractError> {
    let archive_err = |source: io::Error| ExtractError::Archive {
        path: archive_path.to_path_buf(),
        source,
    };

    let file = File::open(archive_path).map_err(archive_err)?;
    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));

    let source_dir = target_dir.join(OWASP_DIR);
    let mut result = ExtractedRuleSet {
        source_dir: source_dir.clone(),
        example_file: None,
        files_written: 0,
    };
    let mut source_dir_ready = false;
    let mut rule_files = 0usize;

    for entry in archive.entries().map_err(archive_err)? {
        let mut entry = entry.map_err(archive_err)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let entry_path = entry.path().map_err(archive_err)?.into_owned();
        let Some(name) = entry_path.file_name().map(|n| n.to_os_string()) else {
            continue;
        };

        let is_example = !example_file_name.is_empty() && name == example_file_name;
        let in_rules_dir = format!("/{}", entry_path.to_string_lossy()).contains("/rules/");

        let destination = if is_example {
            target_dir.join(&name)
        } else if in_rules_dir {
            if !source_dir_ready {
                fs::create_dir_all(&source_dir).map_err(|source| ExtractError::Write {
                    path: source_dir.clone(),
                    source,
                })?;
                source_dir_ready = true;
            }
            source_dir.join(&name)
        } else {
            continue;
        };

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(|source| ExtractError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let write_err = |source: io::Error| ExtractError::Write {
            path: destination.clone(),
            source,
        };
        let mut out = File::create(&destination).map_err(write_err)?;
        let size = io::copy(&mut entry, &mut out).map_err(archive_err)?;
        debug!(path = %destination.display(), bytes = size, "Extracted archive entry");

        if is_example {
            result.example_file = Some(destination);
        } else if Path::new(&name).extension().is_some_and(|ext| ext == "conf") {
            rule_files += 1;
        }
        result.files_written += 1;
    }

    if rule_files == 0 {
        return Err(ExtractError::NoRules {
            path: archive_path.to_path_buf(),
        });
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn build_archive(path: &Path, entries: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_example_file_is_outside_bulk_dir() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("crs.tar.gz");
        build_archive(
            &archive,
            &[
                ("coreruleset-3.3.2/rules/foo.conf", "SecAction \"id:1,pass\""),
                ("coreruleset-3.3.2/crs-setup.conf.example", "SecAction \"id:900000,pass\""),
                ("coreruleset-3.3.2/LICENSE", "license"),
                ("coreruleset-3.3.2/util/build.py", "print()"),
            ],
        );

        let target = dir.path().join("downloaded");
        let set = extract(&archive, &target, "crs-setup.conf.example").unwrap();

        assert_eq!(set.files_written, 2);
        assert_eq!(set.source_dir, target.join("owasp"));
        let example = set.example_file.unwrap();
        assert_eq!(example, target.join("crs-setup.conf.example"));
        assert!(!example.starts_with(&set.source_dir));
        assert!(set.source_dir.join("foo.conf").is_file());
        assert!(!set.source_dir.join("LICENSE").exists());
        assert!(!target.join("LICENSE").exists());
    }

    #[test]
    fn test_archive_without_example() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("crs.tar.gz");
        build_archive(&archive, &[("x/rules/a.conf", ""), ("x/rules/a.data", "nikto")]);

        let set = extract(&archive, dir.path(), "crs-setup.conf.example").unwrap();
        assert_eq!(set.example_file, None);
        assert_eq!(set.files_written, 2);
    }

    #[test]
    fn test_archive_without_rules_fails() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("wrong.tar.gz");
        build_archive(
            &archive,
            &[
                ("project-1.0/LICENSE", "license"),
                ("project-1.0/crs-setup.conf.example", "SecAction \"id:900000,pass\""),
                ("project-1.0/rules/README.md", "no rules here"),
            ],
        );

        let err = extract(&archive, dir.path(), "crs-setup.conf.example").unwrap_err();
        assert!(matches!(err, ExtractError::NoRules { .. }));
    }

    #[test]
    fn test_corrupt_archive_fails() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("crs.tar.gz");
        fs::write(&archive, b"this is not gzip").unwrap();

        let err = extract(&archive, dir.path(), "crs-setup.conf.example").unwrap_err();
        assert!(matches!(err, ExtractError::Archive { .. }));
    }
}
