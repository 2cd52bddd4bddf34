use std::io::Write;
use std::path::Path;
use std::time::Duration;

use image::ImageFormat;
use reqwest::header::CONTENT_TYPE;
use sha2::{Digest, Sha256};
use tempfile::TempPath;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::AssetSection;
use crate::publisher::error::{PublishError, PublisherResult};

/// Media staged on local disk, ready for a file-input upload. The
/// backing temp file is deleted when this value drops, so it must stay
/// alive until the browser has consumed the upload.
#[derive(Debug)]
pub struct StagedAsset {
    path: TempPath,
    pub extension: &'static str,
    pub sha256: String,
    pub bytes: u64,
}

impl StagedAsset {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Fetches the media behind a request URL into a temp file. Remote
/// fetches retry with a linearly growing delay; local `file://` URLs
/// are read once.
pub struct AssetStager {
    section: AssetSection,
    client: reqwest::Client,
}

impl AssetStager {
    pub fn new(section: AssetSection) -> PublisherResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(section.user_agent.clone())
            .timeout(Duration::from_secs(section.request_timeout_seconds))
            .build()?;
        Ok(Self { section, client })
    }

    pub async fn stage(&self, media_url: &str) -> PublisherResult<StagedAsset> {
        let url = Url::parse(media_url)
            .map_err(|err| PublishError::InvalidRequest(format!("media url: {err}")))?;

        let (body, content_type) = if url.scheme() == "file" {
            let path = url.to_file_path().map_err(|_| {
                PublishError::InvalidRequest(format!("media url has no local path: {media_url}"))
            })?;
            (tokio::fs::read(&path).await?, None)
        } else {
            self.fetch_with_retries(&url).await?
        };

        if body.is_empty() {
            return Err(PublishError::AssetUnavailable {
                url: media_url.to_string(),
                attempts: 1,
            });
        }

        let extension = extension_for(content_type.as_deref(), &body);
        let mut file = tempfile::Builder::new()
            .prefix("pinwheel-")
            .suffix(&format!(".{extension}"))
            .tempfile()?;
        file.write_all(&body)?;
        file.flush()?;
        let path = file.into_temp_path();

        let sha256 = hex::encode(Sha256::digest(&body));
        info!(
            bytes = body.len(),
            extension,
            digest = %&sha256[..12],
            "media staged"
        );
        Ok(StagedAsset {
            path,
            extension,
            sha256,
            bytes: body.len() as u64,
        })
    }

    async fn fetch_with_retries(&self, url: &Url) -> PublisherResult<(Vec<u8>, Option<String>)> {
        let attempts = self.section.max_retries.max(1);
        let base_delay = Duration::from_secs(self.section.retry_delay_seconds);
        for attempt in 1..=attempts {
            match self.fetch_once(url).await {
                Ok(fetched) => return Ok(fetched),
                Err(err) if attempt < attempts => {
                    let wait = base_delay * attempt;
                    warn!(url = %url, attempt, wait = ?wait, error = %err, "retrying media fetch");
                    sleep(wait).await;
                }
                Err(err) => {
                    warn!(url = %url, attempts, error = %err, "media fetch exhausted retries");
                }
            }
        }
        Err(PublishError::AssetUnavailable {
            url: url.to_string(),
            attempts,
        })
    }

    async fn fetch_once(&self, url: &Url) -> Result<(Vec<u8>, Option<String>), reqwest::Error> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        let body = response.bytes().await?.to_vec();
        debug!(url = %url, bytes = body.len(), content_type = ?content_type, "media fetched");
        Ok((body, content_type))
    }
}

/// Content-Type wins when it names an image format; otherwise the
/// magic bytes decide. Unknown payloads fall back to png so the file
/// input still accepts the name.
fn extension_for(content_type: Option<&str>, body: &[u8]) -> &'static str {
    if let Some(raw) = content_type {
        let value = raw.to_ascii_lowercase();
        if value.contains("jpeg") || value.contains("jpg") {
            return "jpg";
        }
        if value.contains("webp") {
            return "webp";
        }
        if value.contains("gif") {
            return "gif";
        }
        if value.contains("png") {
            return "png";
        }
    }
    match image::guess_format(body) {
        Ok(ImageFormat::Jpeg) => "jpg",
        Ok(ImageFormat::WebP) => "webp",
        Ok(ImageFormat::Gif) => "gif",
        _ => "png",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn content_type_outranks_magic_bytes() {
        assert_eq!(extension_for(Some("image/jpeg"), &PNG_MAGIC), "jpg");
        assert_eq!(extension_for(Some("image/webp; charset=binary"), &[]), "webp");
        assert_eq!(extension_for(Some("image/gif"), &[]), "gif");
    }

    #[test]
    fn magic_bytes_decide_when_content_type_is_useless() {
        assert_eq!(extension_for(Some("application/octet-stream"), &PNG_MAGIC), "png");
        assert_eq!(extension_for(None, &PNG_MAGIC), "png");
        assert_eq!(extension_for(None, &[0xFF, 0xD8, 0xFF, 0xE0]), "jpg");
    }

    #[test]
    fn unknown_payloads_fall_back_to_png() {
        assert_eq!(extension_for(None, b"not an image at all"), "png");
        assert_eq!(extension_for(Some("text/html"), b"<html>"), "png");
    }
}
