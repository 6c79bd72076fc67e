//! Tar + zstd packing of an export run.
//!
//! The archive holds the output directory's contents rooted at `.`, so
//! unpacking into a fresh directory reproduces the original layout
//! without a wrapping folder.

use std::fs::{self, File};
use std::path::Path;

use rootcause::prelude::*;

/// Compression level used for published archives.
pub const DEFAULT_LEVEL: i32 = 19;

/// Pack `input_dir` into a zstd-compressed tarball at `output_file`.
/// With `remove_after`, the source directory is deleted once the archive
/// is fully written.
pub fn compress_dir(
    input_dir: &Path,
    output_file: &Path,
    level: i32,
    remove_after: bool,
) -> Result<(), Report> {
    let file = File::create(output_file)
        .context_with(|| format!("failed to create {}", output_file.display()))?;
    let encoder = zstd::Encoder::new(file, level)
        .map_err(|e| rootcause::report!("failed to open zstd stream: {e}"))?;

    let mut builder = tar::Builder::new(encoder);
    builder
        .append_dir_all(".", input_dir)
        .context_with(|| format!("failed to archive {}", input_dir.display()))?;
    let encoder = builder
        .into_inner()
        .map_err(|e| rootcause::report!("failed to finish tar stream: {e}"))?;
    encoder
        .finish()
        .map_err(|e| rootcause::report!("failed to finish zstd stream: {e}"))?;

    if remove_after {
        fs::remove_dir_all(input_dir)
            .context_with(|| format!("failed to remove {}", input_dir.display()))?;
    }
    Ok(())
}

/// Unpack an archive produced by [`compress_dir`] into `output_dir`.
/// With `delete_after`, the archive file is removed once extraction
/// completes.
pub fn decompress_file(archive: &Path, output_dir: &Path, delete_after: bool) -> Result<(), Report> {
    let file =
        File::open(archive).context_with(|| format!("failed to open {}", archive.display()))?;
    let decoder = zstd::Decoder::new(file)
        .map_err(|e| rootcause::report!("failed to open zstd stream: {e}"))?;

    tar::Archive::new(decoder)
        .unpack(output_dir)
        .context_with(|| format!("failed to unpack into {}", output_dir.display()))?;

    if delete_after {
        fs::remove_file(archive)
            .context_with(|| format!("failed to remove {}", archive.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn directory_round_trips_through_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("top.json"), b"{}").unwrap();
        fs::write(src.join("nested/image.png"), b"png bytes").unwrap();

        let archive = tmp.path().join("out.tar.zst");
        compress_dir(&src, &archive, 3, false).unwrap();
        assert!(src.exists());

        let dst = tmp.path().join("dst");
        decompress_file(&archive, &dst, true).unwrap();
        assert_eq!(fs::read(dst.join("top.json")).unwrap(), b"{}");
        assert_eq!(fs::read(dst.join("nested/image.png")).unwrap(), b"png bytes");
        assert!(!archive.exists());
    }

    #[test]
    fn remove_after_deletes_the_source() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("file"), b"x").unwrap();

        let archive = tmp.path().join("out.tar.zst");
        compress_dir(&src, &archive, 3, true).unwrap();
        assert!(!src.exists());
        assert!(archive.exists());
    }
}
