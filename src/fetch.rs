//! Retrieval of missing vector files.
//!
//! When the file of an embedder does not exist at build time, it is
//! downloaded as a gzip archive and decompressed in place. The
//! download URL is taken from the embedder configuration or from the
//! environment variable named after the file's base name (a `.env`
//! file in the working directory is consulted as well).

use std::env;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process::Command;

use flate2::read::GzDecoder;
use tracing::info;

use crate::error::{Error, Result};

/// Retrieve a file that is missing locally.
pub trait Fetch {
    /// Retrieve `url` and store the decompressed contents at `path`.
    fn fetch(&self, url: &str, path: &Path) -> Result<()>;
}

/// Fetcher that downloads with `wget` and decompresses with gzip.
///
/// The archive is written next to the target file with an additional
/// `.gz` extension and removed after decompression.
#[derive(Clone, Debug)]
pub struct CommandFetcher {
    program: OsString,
}

impl CommandFetcher {
    /// Fetcher using the given download program.
    ///
    /// The program is invoked as `program -O <output> <url>`.
    pub fn with_program(program: impl Into<OsString>) -> Self {
        CommandFetcher {
            program: program.into(),
        }
    }

    fn archive_path(path: &Path) -> PathBuf {
        let mut archive = path.as_os_str().to_owned();
        archive.push(".gz");
        PathBuf::from(archive)
    }

    fn download(&self, url: &str, archive: &Path) -> Result<()> {
        let status = Command::new(&self.program)
            .arg("-O")
            .arg(archive)
            .arg(url)
            .status()
            .map_err(|e| Error::fetch_error(url, e))?;

        if !status.success() {
            return Err(Error::fetch_error(
                url,
                format!("{:?} exited with {}", self.program, status),
            ));
        }

        Ok(())
    }
}

impl Default for CommandFetcher {
    fn default() -> Self {
        CommandFetcher::with_program("wget")
    }
}

impl Fetch for CommandFetcher {
    fn fetch(&self, url: &str, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::fetch_error(format!("{:?}", parent), format!("cannot create directory: {}", e))
            })?;
        }

        let archive = Self::archive_path(path);
        info!(url, ?archive, "downloading vector file");
        self.download(url, &archive)?;

        decompress_gz(&archive, path)?;
        fs::remove_file(&archive)
            .map_err(|e| Error::fetch_error(format!("{:?}", archive), e))?;

        Ok(())
    }
}

/// Decompress the gzip file `archive` to `path`.
pub fn decompress_gz(archive: &Path, path: &Path) -> Result<()> {
    let input = File::open(archive).map_err(|e| Error::fetch_error(format!("{:?}", archive), e))?;
    let output = File::create(path).map_err(|e| Error::fetch_error(format!("{:?}", path), e))?;

    let mut decoder = GzDecoder::new(BufReader::new(input));
    let mut writer = BufWriter::new(output);
    io::copy(&mut decoder, &mut writer).map_err(|e| {
        // Remove the partial output.
        let _ = fs::remove_file(path);
        Error::fetch_error(format!("{:?}", archive), format!("cannot decompress: {}", e))
    })?;

    Ok(())
}

/// Resolve the download URL for the vector file at `path`.
///
/// An explicit URL takes precedence. Otherwise, the environment
/// variable named after the base name of `path` is used.
pub fn resolve_url(path: &Path, explicit: Option<&str>) -> Result<String> {
    if let Some(url) = explicit {
        return Ok(url.to_owned());
    }

    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| Error::fetch_error(format!("{:?}", path), "path has no file name"))?;

    // The .env file is optional.
    let _ = dotenv::dotenv();

    env::var(name).map_err(|_| {
        Error::fetch_error(
            format!("{:?}", path),
            format!("file is missing and no download URL is set in ${}", name),
        )
    })
}

#[cfg(test)]
mod tests {
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::Path;

    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    use super::{decompress_gz, resolve_url, CommandFetcher, Fetch};
    use crate::error::Error;

    #[test]
    fn decompresses_archive() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("vectors.vec.gz");
        let mut encoder = GzEncoder::new(File::create(&archive).unwrap(), Compression::default());
        encoder.write_all(b"1 2\nA 1 2\n").unwrap();
        encoder.finish().unwrap();

        let path = dir.path().join("vectors.vec");
        decompress_gz(&archive, &path).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"1 2\nA 1 2\n");
    }

    #[test]
    fn corrupt_archive_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("vectors.vec.gz");
        fs::write(&archive, b"not gzip").unwrap();

        let path = dir.path().join("vectors.vec");
        assert!(matches!(
            decompress_gz(&archive, &path),
            Err(Error::Fetch { .. })
        ));
        assert!(!path.exists());
    }

    #[test]
    fn explicit_url_wins() {
        assert_eq!(
            resolve_url(Path::new("/data/wiki.vec"), Some("http://example.com/wiki.vec.gz")).unwrap(),
            "http://example.com/wiki.vec.gz"
        );
    }

    #[test]
    fn url_from_environment() {
        std::env::set_var("wordvecs-test-env.vec", "http://example.com/env.vec.gz");
        assert_eq!(
            resolve_url(Path::new("/data/wordvecs-test-env.vec"), None).unwrap(),
            "http://example.com/env.vec.gz"
        );
    }

    #[test]
    fn missing_url_is_fetch_error() {
        assert!(matches!(
            resolve_url(Path::new("/data/wordvecs-test-unset.vec"), None),
            Err(Error::Fetch { .. })
        ));
    }

    #[test]
    fn failing_download_program_is_fetch_error() {
        let dir = TempDir::new().unwrap();
        let fetcher = CommandFetcher::with_program("false");
        let path = dir.path().join("sub").join("vectors.vec");
        assert!(matches!(
            fetcher.fetch("http://example.com/vectors.vec.gz", &path),
            Err(Error::Fetch { .. })
        ));
        assert!(!path.exists());
    }
}
