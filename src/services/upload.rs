use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::api::error::AppError;
use crate::services::storage::JobWorkspace;
use crate::utils::validation::{derive_base_name, sanitize_filename, verify_pdf_header};

/// Bytes inspected to recognize the document type
const SNIFF_LEN: usize = 1024;

const COPY_BUF: usize = 64 * 1024;

/// An upload written into a job workspace
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Sanitized name the file is stored under
    pub file_name: String,
    pub size: u64,
}

/// Maps a multipart decoding failure; the error carries its own status
/// (413 when the body limit is hit).
pub fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(e.body_text())
    } else {
        AppError::UploadParse(e.body_text())
    }
}

/// Maps a failure to read the upload body
fn read_error(e: std::io::Error) -> AppError {
    match e.into_inner() {
        Some(inner) => match inner.downcast::<MultipartError>() {
            Ok(multipart) => multipart_error(*multipart),
            Err(other) => AppError::UploadParse(format!("Failed to read upload body: {}", other)),
        },
        None => AppError::UploadParse("Failed to read upload body".to_string()),
    }
}

/// Streams `reader` into the workspace under the sanitized form of `original_name`.
///
/// On any error the partially written file is removed before returning.
pub async fn store_upload<R>(
    workspace: &JobWorkspace,
    original_name: &str,
    mut reader: R,
) -> Result<StoredUpload, AppError>
where
    R: AsyncRead + Unpin,
{
    let file_name =
        sanitize_filename(original_name).map_err(|e| AppError::UploadParse(e.to_string()))?;
    derive_base_name(&file_name).map_err(|e| AppError::UploadParse(e.to_string()))?;

    let mut header = vec![0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < SNIFF_LEN {
        let n = reader.read(&mut header[filled..]).await.map_err(read_error)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    header.truncate(filled);

    verify_pdf_header(&header).map_err(|e| AppError::UploadParse(e.to_string()))?;

    let path = workspace.file(&file_name);
    let file = tokio::fs::File::create(&path)
        .await
        .map_err(AppError::UploadWrite)?;

    match copy_body(file, &header, &mut reader).await {
        Ok(size) => {
            tracing::info!(
                "Stored upload '{}' ({} bytes) for job {}",
                file_name,
                size,
                workspace.job_id
            );
            Ok(StoredUpload { file_name, size })
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&path).await;
            Err(e)
        }
    }
}

async fn copy_body<R>(
    mut file: tokio::fs::File,
    header: &[u8],
    reader: &mut R,
) -> Result<u64, AppError>
where
    R: AsyncRead + Unpin,
{
    file.write_all(header).await.map_err(AppError::UploadWrite)?;
    let mut size = header.len() as u64;

    let mut buffer = vec![0u8; COPY_BUF];
    loop {
        let n = reader.read(&mut buffer).await.map_err(read_error)?;
        if n == 0 {
            break;
        }
        file.write_all(&buffer[..n])
            .await
            .map_err(AppError::UploadWrite)?;
        size += n as u64;
    }

    file.flush().await.map_err(AppError::UploadWrite)?;
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::StorageLayout;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    struct FailingReader;

    impl AsyncRead for FailingReader {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Err(std::io::Error::other("connection reset")))
        }
    }

    async fn workspace() -> (tempfile::TempDir, JobWorkspace) {
        let tmp = tempfile::tempdir().unwrap();
        let layout = StorageLayout::new(tmp.path());
        layout.ensure().await.unwrap();
        let ws = layout.create_workspace().unwrap();
        (tmp, ws)
    }

    fn pdf_body(len: usize) -> Vec<u8> {
        let mut body = b"%PDF-1.4\n".to_vec();
        body.extend((0..len).map(|i| (i % 251) as u8));
        body
    }

    #[tokio::test]
    async fn test_store_upload_is_byte_identical() {
        let (_tmp, ws) = workspace().await;
        let body = pdf_body(200_000);

        let stored = store_upload(&ws, "report.pdf", &body[..]).await.unwrap();
        assert_eq!(stored.file_name, "report.pdf");
        assert_eq!(stored.size, body.len() as u64);
        assert_eq!(std::fs::read(ws.file("report.pdf")).unwrap(), body);
    }

    #[tokio::test]
    async fn test_store_upload_sanitizes_name() {
        let (_tmp, ws) = workspace().await;
        let body = pdf_body(10);

        let stored = store_upload(&ws, "../../etc/evil.pdf", &body[..])
            .await
            .unwrap();
        assert_eq!(stored.file_name, "evil.pdf");
        assert!(ws.file("evil.pdf").exists());
    }

    #[tokio::test]
    async fn test_store_upload_rejects_non_pdf() {
        let (_tmp, ws) = workspace().await;
        let err = store_upload(&ws, "notes.pdf", &b"plain text, not a pdf"[..])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UploadParse(_)));
        assert!(!ws.file("notes.pdf").exists());
    }

    #[tokio::test]
    async fn test_store_upload_rejects_empty() {
        let (_tmp, ws) = workspace().await;
        let err = store_upload(&ws, "empty.pdf", &b""[..]).await.unwrap_err();
        assert!(matches!(err, AppError::UploadParse(_)));
    }

    #[tokio::test]
    async fn test_store_upload_rejects_bare_suffix() {
        let (_tmp, ws) = workspace().await;
        let body = pdf_body(10);
        let err = store_upload(&ws, ".pdf", &body[..]).await.unwrap_err();
        assert!(matches!(err, AppError::UploadParse(_)));
    }

    #[tokio::test]
    async fn test_partial_write_is_removed_on_read_failure() {
        let (_tmp, ws) = workspace().await;
        let head = pdf_body(2048);
        let reader = AsyncReadExt::chain(&head[..], FailingReader);

        let err = store_upload(&ws, "broken.pdf", reader).await.unwrap_err();
        assert!(matches!(err, AppError::UploadParse(_)));
        assert!(!ws.file("broken.pdf").exists());
    }
}
