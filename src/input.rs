//! Input acquisition: turn a user-supplied path or URL into upload bytes.
//!
//! The workflow itself only ever sees an upload id. Something has to put the
//! document into the [`crate::upload::UploadResolver`] first; this module
//! reads a local file or downloads an HTTP/HTTPS URL and guesses a content
//! type so the upload allow-list can judge it.

use crate::error::DocflowError;
use std::path::PathBuf;
use tracing::{debug, info};

/// A document read into memory, ready for [`crate::upload::UploadResolver::save`].
#[derive(Debug, Clone)]
pub struct AcquiredInput {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: String,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Read a local file or download a URL.
pub async fn acquire(input: &str, timeout_secs: u64) -> Result<AcquiredInput, DocflowError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

/// Content type from the filename extension; octet-stream when unknown.
pub fn guess_content_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

async fn read_local(path_str: &str) -> Result<AcquiredInput, DocflowError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocflowError::PermissionDenied { path });
        }
        Err(_) => return Err(DocflowError::FileNotFound { path }),
    };

    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("uploaded-file")
        .to_string();
    let content_type = guess_content_type(&filename);

    debug!("Read local input: {} ({} bytes)", path.display(), bytes.len());
    Ok(AcquiredInput {
        bytes,
        filename,
        content_type,
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<AcquiredInput, DocflowError> {
    info!("Downloading input from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocflowError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocflowError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocflowError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DocflowError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url);
    let header_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or(v).trim().to_lowercase())
        .filter(|v| !v.is_empty());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DocflowError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let content_type = header_type.unwrap_or_else(|| guess_content_type(&filename));
    info!("Downloaded {} bytes ({})", bytes.len(), content_type);

    Ok(AcquiredInput {
        bytes: bytes.to_vec(),
        filename,
        content_type,
    })
}

/// Extract a reasonable filename from the URL path.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded-file".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/scan.png"));
        assert!(is_url("http://example.com/form.pdf"));
        assert!(!is_url("/tmp/scan.png"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url_path() {
        assert_eq!(extract_filename("https://x.org/a/b/notes.jpg?x=1"), "notes.jpg");
        assert_eq!(extract_filename("https://x.org/a/b/"), "downloaded-file");
        assert_eq!(extract_filename("not a url"), "downloaded-file");
    }

    #[test]
    fn content_type_guessing() {
        assert_eq!(guess_content_type("scan.png"), "image/png");
        assert_eq!(guess_content_type("form.pdf"), "application/pdf");
        assert_eq!(guess_content_type("blob"), "application/octet-stream");
    }

    #[tokio::test]
    async fn local_file_is_read_with_guessed_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.jpeg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF]).unwrap();

        let input = acquire(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(input.filename, "page.jpeg");
        assert_eq!(input.content_type, "image/jpeg");
        assert_eq!(input.bytes.len(), 3);
    }

    #[tokio::test]
    async fn missing_local_file_is_reported() {
        let err = acquire("/definitely/not/here.png", 5).await.unwrap_err();
        assert!(matches!(err, DocflowError::FileNotFound { .. }));
    }
}
