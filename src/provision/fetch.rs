use super::error::FetchError;
use futures::StreamExt;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode, Url};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const MAX_REDIRECTS: usize = 10;

/// Downloads rule sources over HTTP.
///
/// Redirects are followed by hand so the `Location` value is used as sent
/// by the server instead of being decoded and re-encoded.
#[derive(Clone)]
pub struct RemoteFetcher {
    client: Client,
}

impl RemoteFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .user_agent(concat!("secrules-bouncer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    /// Stream `url` into `destination`. The file only exists once the whole
    /// body was written; a failed attempt leaves nothing behind.
    pub async fn fetch(&self, url: &str, destination: &Path) -> Result<(), FetchError> {
        let response = self.get_following_redirects(url).await?;

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| FetchError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let partial = partial_path(destination);
        if let Err(e) = write_body(response, url, &partial).await {
            if let Err(remove_err) = fs::remove_file(&partial).await {
                debug!(path = %partial.display(), "Partial download not removed: {}", remove_err);
            }
            return Err(e);
        }

        fs::rename(&partial, destination)
            .await
            .map_err(|source| FetchError::Io {
                path: destination.to_path_buf(),
                source,
            })?;

        info!(url, path = %destination.display(), "Downloaded rule source");
        Ok(())
    }

    async fn get_following_redirects(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let mut current = url.to_string();

        for _ in 0..=MAX_REDIRECTS {
            let response = self
                .client
                .get(current.as_str())
                .send()
                .await
                .map_err(|source| FetchError::Request {
                    url: current.clone(),
                    source,
                })?;

            let status = response.status();
            if status.is_redirection() {
                let next = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|location| resolve_location(&current, location))
                    .ok_or_else(|| FetchError::BadRedirect {
                        url: current.clone(),
                    })?;
                debug!(from = %current, to = %next, "Following redirect");
                current = next;
                continue;
            }

            if status != StatusCode::OK {
                warn!(url = %current, status = status.as_u16(), "Unexpected response status");
                return Err(FetchError::Status {
                    url: current,
                    status: status.as_u16(),
                });
            }
            return Ok(response);
        }

        Err(FetchError::TooManyRedirects {
            url: url.to_string(),
        })
    }
}

/// Absolute locations are used as-is, relative ones are joined to the
/// current URL.
fn resolve_location(current: &str, location: &str) -> Option<String> {
    if location.starts_with("http://") || location.starts_with("https://") {
        return Some(location.to_string());
    }
    Url::parse(current)
        .ok()?
        .join(location)
        .ok()
        .map(|url| url.to_string())
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

async fn write_body(response: reqwest::Response, url: &str, path: &Path) -> Result<(), FetchError> {
    let io_err = |source: std::io::Error| FetchError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = fs::File::create(path).await.map_err(io_err)?;
    let mut stream = response.bytes_stream();
    let mut written = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| FetchError::Request {
            url: url.to_string(),
            source,
        })?;
        file.write_all(&chunk).await.map_err(io_err)?;
        written += chunk.len();
    }
    file.flush().await.map_err(io_err)?;

    debug!(url, bytes = written, "Response body written");
    Ok(())
}
