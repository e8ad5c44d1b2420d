use crate::error::IngestError;
use reqwest::Client;
use std::path::{Path, PathBuf};
use url::Url;

const TOKEN_HOST: &str = "huggingface.co";

fn accepts_token(host: &str) -> bool {
    host.strip_suffix(TOKEN_HOST)
        .is_some_and(|prefix| prefix.is_empty() || prefix.ends_with('.'))
}

pub fn file_name_from_url(url: &Url) -> Result<String, IngestError> {
    url.path_segments()
        .and_then(|segments| segments.last())
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .ok_or_else(|| IngestError::MissingFileName(url.to_string()))
}

pub async fn download_sources(
    client: &Client,
    folder: &Path,
    urls: &[Url],
    token: Option<&str>,
) -> Result<Vec<PathBuf>, IngestError> {
    if folder.exists() {
        tracing::debug!(folder = %folder.display(), "source folder present, skipping downloads");
        return Ok(Vec::new());
    }

    let names = urls
        .iter()
        .map(file_name_from_url)
        .collect::<Result<Vec<_>, _>>()?;

    // Renamed into place only once every download succeeded.
    let staging = staging_dir(folder);
    if staging.exists() {
        tokio::fs::remove_dir_all(&staging).await?;
    }
    tokio::fs::create_dir_all(&staging).await?;
    tracing::info!(
        folder = %folder.display(),
        files = urls.len(),
        "creating source folder and downloading files"
    );

    for (url, name) in urls.iter().zip(&names) {
        let mut request = client.get(url.clone());
        if let (Some(token), Some(host)) = (token, url.host_str()) {
            if accepts_token(host) {
                request = request.bearer_auth(token);
            }
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IngestError::Download {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        tokio::fs::write(staging.join(name), &bytes).await?;
        tracing::debug!(url = %url, file = %name, bytes = bytes.len(), "downloaded source");
    }

    tokio::fs::rename(&staging, folder).await?;
    Ok(names.iter().map(|name| folder.join(name)).collect())
}

fn staging_dir(folder: &Path) -> PathBuf {
    let mut staging = folder.as_os_str().to_owned();
    staging.push(".download");
    PathBuf::from(staging)
}
