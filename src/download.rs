//! Archive and file transport
//!
//! HTTP(S) downloads shell out to `curl` the same way git transport shells
//! out to `git`, so proxies, netrc credentials and certificates configured
//! on the host apply unchanged. `file://` URLs are copied directly.
//!
//! Archives are unpacked in-process with `tar`/`flate2` and `zip`; both refuse
//! entries that would land outside the destination.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use std::process::Command;

use flate2::read::GzDecoder;
use log::debug;
use sha2::{Digest, Sha256};
use url::Url;
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::error::{Error, Result};
use crate::lock::ArchiveKind;

/// Download `url` to `destination`, returning the number of bytes written.
pub fn download(url: &str, destination: &Path) -> Result<u64> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e))?;
    }

    let parsed = Url::parse(url)?;
    if parsed.scheme() == "file" {
        let source = parsed.to_file_path().map_err(|_| Error::Transport {
            url: url.to_string(),
            message: "not a local path".to_string(),
        })?;
        debug!("copying {} to {}", source.display(), destination.display());
        return fs::copy(&source, destination).map_err(|e| Error::Transport {
            url: url.to_string(),
            message: e.to_string(),
        });
    }

    debug!("curl {} -> {}", url, destination.display());
    let output = Command::new("curl")
        .args(["--fail", "--silent", "--show-error", "--location", "--output"])
        .arg(destination)
        .arg("--url")
        .arg(url)
        .output()
        .map_err(|e| Error::Transport {
            url: url.to_string(),
            message: format!("failed to run curl: {}", e),
        })?;

    if !output.status.success() {
        // curl may leave a partial file behind
        let _ = fs::remove_file(destination);
        return Err(Error::Transport {
            url: url.to_string(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let metadata = fs::metadata(destination).map_err(|e| Error::filesystem(destination, e))?;
    Ok(metadata.len())
}

/// Unpack `archive` into the existing directory `destination`.
pub fn extract(archive: &Path, kind: ArchiveKind, destination: &Path) -> Result<()> {
    debug!("extracting {} into {}", archive.display(), destination.display());
    let file = File::open(archive).map_err(|e| Error::filesystem(archive, e))?;
    let failed = |message: String| Error::Filesystem {
        path: archive.to_path_buf(),
        message: format!("extracting {} archive failed: {}", kind.extension(), message),
    };

    match kind {
        ArchiveKind::TarGz => tar::Archive::new(GzDecoder::new(BufReader::new(file)))
            .unpack(destination)
            .map_err(|e| failed(e.to_string())),
        ArchiveKind::Zip => ZipArchive::new(BufReader::new(file))
            .and_then(|mut zip| zip.extract(destination))
            .map_err(|e| failed(e.to_string())),
    }
}

/// Check that `digest` is a hex-encoded SHA-256 and return it lowercased.
pub fn normalize_sha256(digest: &str) -> Result<String> {
    let trimmed = digest.trim();
    if trimmed.len() == 64 && trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        Ok(trimmed.to_ascii_lowercase())
    } else {
        Err(Error::InvalidDigest {
            digest: digest.to_string(),
        })
    }
}

/// Compute the hex-encoded SHA-256 of a file
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| Error::filesystem(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 1024 * 1024];

    loop {
        let n = reader
            .read(&mut buffer)
            .map_err(|e| Error::filesystem(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Fail with [`Error::Integrity`] unless `path` hashes to `expected`.
pub fn verify_sha256(url: &str, path: &Path, expected: &str) -> Result<()> {
    let actual = sha256_file(path)?;
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(Error::Integrity {
            url: url.to_string(),
            expected: expected.trim().to_lowercase(),
            actual,
        })
    }
}

/// Copy a directory tree, preserving symlinks.
pub fn copy_dir_recursive(source: &Path, destination: &Path) -> Result<()> {
    fs::create_dir_all(destination).map_err(|e| Error::filesystem(destination, e))?;

    for entry in WalkDir::new(source).min_depth(1).follow_links(false) {
        let entry = entry.map_err(|e| Error::Filesystem {
            path: source.to_path_buf(),
            message: e.to_string(),
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| Error::Filesystem {
                path: entry.path().to_path_buf(),
                message: e.to_string(),
            })?;
        let target = destination.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| Error::filesystem(&target, e))?;
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| Error::filesystem(&target, e))?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    let pointee = fs::read_link(link).map_err(|e| Error::filesystem(link, e))?;
    std::os::unix::fs::symlink(&pointee, target).map_err(|e| Error::filesystem(target, e))
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> Result<()> {
    fs::copy(link, target)
        .map(|_| ())
        .map_err(|e| Error::filesystem(target, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_sha256_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hello.txt");
        fs::write(&path, "hello").unwrap();
        assert_eq!(sha256_file(&path).unwrap(), HELLO_SHA256);
    }

    #[test]
    fn test_verify_sha256_accepts_uppercase_hint() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hello.txt");
        fs::write(&path, "hello").unwrap();
        verify_sha256("file:///hello.txt", &path, &HELLO_SHA256.to_uppercase()).unwrap();
    }

    #[test]
    fn test_verify_sha256_mismatch() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hello.txt");
        fs::write(&path, "hello").unwrap();
        match verify_sha256("https://example.com/hello.txt", &path, "00") {
            Err(Error::Integrity { expected, actual, .. }) => {
                assert_eq!(expected, "00");
                assert_eq!(actual, HELLO_SHA256);
            }
            other => panic!("expected integrity error, got {:?}", other),
        }
    }

    #[test]
    fn test_download_file_url() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("BUCK");
        fs::write(&source, "cxx_library(name = 'x')\n").unwrap();
        let url = Url::from_file_path(&source).unwrap();

        let destination = temp.path().join("out/BUCK");
        let bytes = download(url.as_str(), &destination).unwrap();
        assert_eq!(bytes, 24);
        assert_eq!(
            fs::read_to_string(&destination).unwrap(),
            "cxx_library(name = 'x')\n"
        );
    }

    #[test]
    fn test_download_missing_file_url_is_transport_error() {
        let temp = TempDir::new().unwrap();
        let url = Url::from_file_path(temp.path().join("missing")).unwrap();
        let result = download(url.as_str(), &temp.path().join("out"));
        assert!(matches!(result, Err(Error::Transport { .. })));
    }

    #[test]
    fn test_download_rejects_malformed_url() {
        let temp = TempDir::new().unwrap();
        let result = download("not a url", &temp.path().join("out"));
        assert!(matches!(result, Err(Error::UrlParse(_))));
    }

    #[test]
    fn test_copy_dir_recursive() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src");
        fs::create_dir_all(source.join("include/nested")).unwrap();
        fs::write(source.join("BUCK"), "buck").unwrap();
        fs::write(source.join("include/nested/a.h"), "a").unwrap();

        let destination = temp.path().join("dst");
        copy_dir_recursive(&source, &destination).unwrap();

        assert_eq!(fs::read_to_string(destination.join("BUCK")).unwrap(), "buck");
        assert_eq!(
            fs::read_to_string(destination.join("include/nested/a.h")).unwrap(),
            "a"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_dir_recursive_preserves_symlinks() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("src");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("real.h"), "r").unwrap();
        std::os::unix::fs::symlink("real.h", source.join("alias.h")).unwrap();

        let destination = temp.path().join("dst");
        copy_dir_recursive(&source, &destination).unwrap();

        let link = destination.join("alias.h");
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), Path::new("real.h"));
    }

    fn fmt_tree(temp: &TempDir) -> std::path::PathBuf {
        let content = temp.path().join("content");
        fs::create_dir_all(content.join("fmt-5.0.0/include")).unwrap();
        fs::write(content.join("fmt-5.0.0/include/format.h"), "fmt").unwrap();
        content
    }

    #[test]
    fn test_extract_tar_gz() {
        let temp = TempDir::new().unwrap();
        let content = fmt_tree(&temp);
        let archive = temp.path().join("fmt.tar.gz");
        let encoder = flate2::write::GzEncoder::new(
            File::create(&archive).unwrap(),
            flate2::Compression::default(),
        );
        let mut builder = tar::Builder::new(encoder);
        builder
            .append_dir_all("fmt-5.0.0", content.join("fmt-5.0.0"))
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let out = temp.path().join("out");
        fs::create_dir_all(&out).unwrap();
        extract(&archive, ArchiveKind::TarGz, &out).unwrap();
        assert_eq!(
            fs::read_to_string(out.join("fmt-5.0.0/include/format.h")).unwrap(),
            "fmt"
        );
    }

    #[test]
    fn test_extract_zip() {
        use std::io::Write;

        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("fmt.zip");
        let mut writer = zip::ZipWriter::new(File::create(&archive).unwrap());
        writer
            .start_file(
                "fmt-5.0.0/include/format.h",
                zip::write::SimpleFileOptions::default(),
            )
            .unwrap();
        writer.write_all(b"fmt").unwrap();
        writer.finish().unwrap();

        let out = temp.path().join("out");
        fs::create_dir_all(&out).unwrap();
        extract(&archive, ArchiveKind::Zip, &out).unwrap();
        assert_eq!(
            fs::read_to_string(out.join("fmt-5.0.0/include/format.h")).unwrap(),
            "fmt"
        );
    }

    #[test]
    fn test_extract_corrupt_archive_is_filesystem_error() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("broken.zip");
        fs::write(&archive, "not a zip").unwrap();

        let out = temp.path().join("out");
        fs::create_dir_all(&out).unwrap();
        match extract(&archive, ArchiveKind::Zip, &out) {
            Err(Error::Filesystem { message, .. }) => assert!(message.contains("zip")),
            other => panic!("expected filesystem error, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_sha256() {
        assert_eq!(
            normalize_sha256(&format!(" {} ", HELLO_SHA256.to_uppercase())).unwrap(),
            HELLO_SHA256
        );
        let too_long = format!("{}0", HELLO_SHA256);
        for bad in ["", "abc123", "../../outside/secret", too_long.as_str()] {
            assert!(
                matches!(normalize_sha256(bad), Err(Error::InvalidDigest { .. })),
                "expected {:?} to be rejected",
                bad
            );
        }
        let not_hex = format!("{}zz", &HELLO_SHA256[..62]);
        assert!(normalize_sha256(&not_hex).is_err());
    }
}
