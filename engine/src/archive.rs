//! Archive packaging.
//!
//! Packs the files written during a run into a single zip, tar or tar.gz
//! container. Entry names are relative to the run's base directory and use
//! `/` separators, so archives extract the same way on every platform.

use crate::error::EngineError;
use crate::model::ArchiveKind;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// Deterministic archive name: `backup_<timestamp>.<ext>`.
///
/// Returns `None` for `ArchiveKind::None`.
pub fn archive_file_name(timestamp: &str, kind: ArchiveKind) -> Option<String> {
    kind.extension()
        .map(|ext| format!("backup_{}.{}", timestamp, ext))
}

/// Build an archive at `out_path` holding exactly `files`.
///
/// # Errors
/// - `EngineError::InvalidArgument` for `ArchiveKind::None`
/// - `EngineError::InvalidPath` if a file is not below `base_dir` or its
///   relative path would contain `..`
/// - `EngineError::Archive` if the archive cannot be written
pub fn build_archive(
    files: &[PathBuf],
    base_dir: &Path,
    kind: ArchiveKind,
    out_path: &Path,
) -> Result<(), EngineError> {
    if kind == ArchiveKind::None {
        return Err(EngineError::invalid_argument(
            "archive kind 'none' cannot be built",
        ));
    }

    let entries = files
        .iter()
        .map(|file| Ok((file.clone(), entry_name(file, base_dir)?)))
        .collect::<Result<Vec<_>, EngineError>>()?;

    let archive_error = |e: io::Error| EngineError::Archive {
        path: out_path.to_path_buf(),
        source: e,
    };

    let file = File::create(out_path).map_err(archive_error)?;
    let writer = BufWriter::new(file);

    let result = match kind {
        ArchiveKind::Zip => write_zip(writer, &entries),
        ArchiveKind::Tar => write_tar(writer, &entries),
        ArchiveKind::TarGz => write_tar(GzEncoder::new(writer, Compression::default()), &entries)
            .and_then(|encoder| encoder.finish()),
        ArchiveKind::None => unreachable!("rejected above"),
    };

    result
        .and_then(|mut writer| writer.flush())
        .map_err(archive_error)?;

    info!(
        archive = %out_path.display(),
        kind = %kind,
        entries = entries.len(),
        "archive written"
    );
    Ok(())
}

/// Base-relative entry name with `/` separators.
fn entry_name(file: &Path, base_dir: &Path) -> Result<String, EngineError> {
    let invalid = |reason: &str| EngineError::InvalidPath {
        path: file.to_path_buf(),
        reason: reason.to_string(),
    };

    let relative = file
        .strip_prefix(base_dir)
        .map_err(|_| invalid("not inside the archive base directory"))?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return Err(invalid("relative path must not leave the base directory")),
        }
    }

    if parts.is_empty() {
        return Err(invalid("path names the base directory itself"));
    }
    Ok(parts.join("/"))
}

fn write_zip<W: Write + io::Seek>(writer: W, entries: &[(PathBuf, String)]) -> io::Result<W> {
    let mut zip = zip::ZipWriter::new(writer);
    let options =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (source, name) in entries {
        zip.start_file(name.as_str(), options)?;
        let mut input = File::open(source)?;
        io::copy(&mut input, &mut zip)?;
    }

    Ok(zip.finish()?)
}

fn write_tar<W: Write>(writer: W, entries: &[(PathBuf, String)]) -> io::Result<W> {
    let mut builder = tar::Builder::new(writer);
    builder.follow_symlinks(true);

    for (source, name) in entries {
        builder.append_path_with_name(source, name)?;
    }

    builder.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::fs;
    use std::io::Read;

    fn fixture(base: &Path) -> Vec<PathBuf> {
        let files = vec![
            (base.join("docs").join("a.txt"), "alpha"),
            (base.join("docs").join("nested").join("b.txt"), "bravo"),
            (base.join("c.bin"), "charlie"),
        ];
        for (path, content) in &files {
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        files.into_iter().map(|(p, _)| p).collect()
    }

    fn expected() -> BTreeMap<String, Vec<u8>> {
        BTreeMap::from([
            ("c.bin".to_string(), b"charlie".to_vec()),
            ("docs/a.txt".to_string(), b"alpha".to_vec()),
            ("docs/nested/b.txt".to_string(), b"bravo".to_vec()),
        ])
    }

    fn read_tar<R: Read>(reader: R) -> BTreeMap<String, Vec<u8>> {
        let mut archive = tar::Archive::new(reader);
        let mut found = BTreeMap::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().replace('\\', "/");
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            found.insert(name, content);
        }
        found
    }

    #[test]
    fn test_archive_file_name() {
        assert_eq!(
            archive_file_name("2024-01-02_03-04-05", ArchiveKind::TarGz).as_deref(),
            Some("backup_2024-01-02_03-04-05.tar.gz")
        );
        assert_eq!(archive_file_name("ts", ArchiveKind::None), None);
    }

    #[test]
    fn test_zip_contains_exactly_the_files() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let base = temp_dir.path().join("run");
        let files = fixture(&base);
        let out = base.join("backup_ts.zip");

        build_archive(&files, &base, ArchiveKind::Zip, &out).expect("Failed to build zip");

        let mut archive = zip::ZipArchive::new(File::open(&out).unwrap()).unwrap();
        let mut found = BTreeMap::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).unwrap();
            assert_eq!(entry.compression(), zip::CompressionMethod::Deflated);
            let mut content = Vec::new();
            entry.read_to_end(&mut content).unwrap();
            found.insert(entry.name().to_string(), content);
        }
        assert_eq!(found, expected());
    }

    #[test]
    fn test_tar_contains_exactly_the_files() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let base = temp_dir.path().join("run");
        let files = fixture(&base);
        let out = base.join("backup_ts.tar");

        build_archive(&files, &base, ArchiveKind::Tar, &out).expect("Failed to build tar");

        assert_eq!(read_tar(File::open(&out).unwrap()), expected());
    }

    #[test]
    fn test_tar_gz_contains_exactly_the_files() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let base = temp_dir.path().join("run");
        let files = fixture(&base);
        let out = base.join("backup_ts.tar.gz");

        build_archive(&files, &base, ArchiveKind::TarGz, &out).expect("Failed to build tar.gz");

        let mut magic = [0u8; 2];
        File::open(&out).unwrap().read_exact(&mut magic).unwrap();
        assert_eq!(magic, [0x1f, 0x8b], "output should be gzip");

        assert_eq!(read_tar(GzDecoder::new(File::open(&out).unwrap())), expected());
    }

    #[test]
    fn test_empty_file_list_builds_empty_archive() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let out = temp_dir.path().join("empty.tar");

        build_archive(&[], temp_dir.path(), ArchiveKind::Tar, &out).expect("Failed to build");
        assert!(read_tar(File::open(&out).unwrap()).is_empty());
    }

    #[test]
    fn test_file_outside_base_is_rejected() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let base = temp_dir.path().join("run");
        fs::create_dir_all(&base).unwrap();
        let outside = temp_dir.path().join("outside.txt");
        fs::write(&outside, "x").unwrap();

        let result = build_archive(&[outside], &base, ArchiveKind::Zip, &base.join("a.zip"));
        assert!(matches!(result, Err(EngineError::InvalidPath { .. })));

        let sneaky = base.join("..").join("outside.txt");
        assert!(entry_name(&sneaky, &base).is_err());
    }

    #[test]
    fn test_unwritable_output_is_archive_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let base = temp_dir.path().join("run");
        let files = fixture(&base);
        let out = temp_dir.path().join("missing_dir").join("a.tar");

        let result = build_archive(&files, &base, ArchiveKind::Tar, &out);
        assert!(matches!(result, Err(EngineError::Archive { .. })));
    }

    #[test]
    fn test_none_kind_is_rejected() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = build_archive(
            &[],
            temp_dir.path(),
            ArchiveKind::None,
            &temp_dir.path().join("x"),
        );
        assert!(matches!(result, Err(EngineError::InvalidArgument { .. })));
    }
}
