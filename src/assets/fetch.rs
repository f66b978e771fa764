//! Fetching the bytes behind an asset source.

use std::path::{Path, PathBuf};

use futures::future::LocalBoxFuture;
use futures::FutureExt;

use crate::error::FetchError;

pub type FetchFuture = LocalBoxFuture<'static, Result<Vec<u8>, FetchError>>;

/// Fetch collaborator used by the asset store.
///
/// The store only needs the bytes or an error.
pub trait Fetcher {
    fn fetch(&self, src: &str) -> FetchFuture;
}

/// Reads asset sources from the local file system.
///
/// Accepts plain paths and `file://` URLs. Relative paths resolve against
/// the configured root. Any other scheme fails with
/// [`FetchError::UnsupportedScheme`].
#[derive(Debug, Clone, Default)]
pub struct FileFetcher {
    root: Option<PathBuf>,
}

impl FileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn resolve_path(&self, src: &str) -> Result<PathBuf, FetchError> {
        let path = match src.split_once("://") {
            Some(("file", rest)) => Path::new(rest).to_path_buf(),
            Some((scheme, _)) if is_scheme(scheme) => {
                return Err(FetchError::UnsupportedScheme(src.to_string()));
            }
            _ => Path::new(src).to_path_buf(),
        };

        Ok(match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        })
    }
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

impl Fetcher for FileFetcher {
    fn fetch(&self, src: &str) -> FetchFuture {
        let src = src.to_string();
        let path = self.resolve_path(&src);

        async move {
            let path = path?;
            tokio::fs::read(&path).await.map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    FetchError::NotFound(src)
                } else {
                    FetchError::Io {
                        src,
                        message: err.to_string(),
                    }
                }
            })
        }
        .boxed_local()
    }
}

/// Downloads `http` and `https` asset sources.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (proxies, timeouts, headers).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, src: &str) -> FetchFuture {
        let src = src.to_string();
        let request = self.client.get(&src);

        async move {
            let response = request.send().await.map_err(|err| FetchError::Io {
                src: src.clone(),
                message: err.to_string(),
            })?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(FetchError::NotFound(src));
            }
            if !status.is_success() {
                return Err(FetchError::Io {
                    src,
                    message: format!("HTTP status {status}"),
                });
            }

            // Headers arrived, so a failure here is an interrupted transfer
            match response.bytes().await {
                Ok(bytes) => Ok(bytes.to_vec()),
                Err(err) => Err(FetchError::Aborted {
                    src,
                    message: err.to_string(),
                }),
            }
        }
        .boxed_local()
    }
}

/// Default fetcher: remote sources over HTTP, everything else from disk.
#[derive(Debug, Clone, Default)]
pub struct SchemeFetcher {
    file: FileFetcher,
    http: HttpFetcher,
}

impl SchemeFetcher {
    pub fn new(file: FileFetcher, http: HttpFetcher) -> Self {
        Self { file, http }
    }
}

/// Whether `src` is an `http` or `https` URL.
pub fn is_remote(src: &str) -> bool {
    src.split_once("://")
        .is_some_and(|(scheme, _)| scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https"))
}

impl Fetcher for SchemeFetcher {
    fn fetch(&self, src: &str) -> FetchFuture {
        if is_remote(src) {
            self.http.fetch(src)
        } else {
            self.file.fetch(src)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_against_root() {
        let fetcher = FileFetcher::with_root("/srv/assets");
        assert_eq!(
            fetcher.resolve_path("img/logo.png").ok(),
            Some(PathBuf::from("/srv/assets/img/logo.png"))
        );
        assert_eq!(
            fetcher.resolve_path("file:///tmp/a.png").ok(),
            Some(PathBuf::from("/tmp/a.png"))
        );
    }

    #[test]
    fn test_remote_scheme_unsupported() {
        let fetcher = FileFetcher::new();
        assert!(matches!(
            fetcher.resolve_path("https://example.com/a.png"),
            Err(FetchError::UnsupportedScheme(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hello").unwrap();

        let fetcher = FileFetcher::with_root(dir.path());
        let bytes = fetcher.fetch("a.txt").await.unwrap();
        assert_eq!(bytes, b"hello");

        let missing = fetcher.fetch("missing.txt").await;
        assert!(matches!(missing, Err(FetchError::NotFound(_))));
    }

    #[test]
    fn test_is_remote() {
        assert!(is_remote("https://example.com/logo.png"));
        assert!(is_remote("HTTP://example.com/logo.png"));
        assert!(!is_remote("file:///tmp/logo.png"));
        assert!(!is_remote("assets/logo.png"));
    }

    #[tokio::test]
    async fn test_scheme_fetcher_reads_paths_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"local").unwrap();

        let fetcher = SchemeFetcher::new(FileFetcher::with_root(dir.path()), HttpFetcher::new());
        assert_eq!(fetcher.fetch("a.txt").await.unwrap(), b"local");
    }
}
