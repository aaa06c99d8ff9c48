use anyhow::{Result, anyhow};
use std::path::Path;
use uuid::Uuid;

/// Suffix stripped from uploaded names to derive the base name
pub const PDF_SUFFIX: &str = ".pdf";

/// Suffix of every produced archive
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// Longest base name in bytes. Page files (`<base>-<n>.<ext>`) and the archive
/// (`<base>.tar.gz`) must still fit in a 255-byte file name.
pub const MAX_BASE_NAME_LEN: usize = 200;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Sanitizes filename to prevent path traversal and injection attacks
/// Returns the sanitized filename or an error if the name is invalid
pub fn sanitize_filename(filename: &str) -> Result<String> {
    // Browsers on Windows may send the full client path
    let last = filename.rsplit(['/', '\\']).next().unwrap_or("");

    let name = Path::new(last)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() || name == "." || name == ".." {
        return Err(anyhow!(ValidationError {
            code: "INVALID_FILENAME",
            message: "Filename cannot be empty".to_string(),
        }));
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path traversal attempt detected: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    let sanitized = truncate_on_char_boundary(&sanitized, 255).to_string();

    if sanitized.starts_with('.') {
        return Err(anyhow!(ValidationError {
            code: "HIDDEN_FILE",
            message: "Hidden files (starting with '.') are not allowed".to_string(),
        }));
    }

    Ok(sanitized)
}

/// Strips a case-insensitive `.pdf` suffix; names without it are kept whole.
pub fn derive_base_name(stored_name: &str) -> Result<String> {
    let split = stored_name.len().saturating_sub(PDF_SUFFIX.len());
    let base = match stored_name.get(split..) {
        Some(tail) if tail.eq_ignore_ascii_case(PDF_SUFFIX) => &stored_name[..split],
        _ => stored_name,
    };

    if base.is_empty() {
        return Err(anyhow!(ValidationError {
            code: "EMPTY_BASE_NAME",
            message: format!("'{}' has no name besides its suffix", stored_name),
        }));
    }

    Ok(truncate_on_char_boundary(base, MAX_BASE_NAME_LEN).to_string())
}

fn truncate_on_char_boundary(value: &str, max_len: usize) -> &str {
    if value.len() <= max_len {
        return value;
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Verifies the first bytes of an upload identify a PDF document
pub fn verify_pdf_header(header: &[u8]) -> Result<()> {
    if header.is_empty() {
        return Err(anyhow!(ValidationError {
            code: "EMPTY_FILE",
            message: "File appears to be empty".to_string(),
        }));
    }

    match infer::get(header) {
        Some(kind) if kind.mime_type() == "application/pdf" => Ok(()),
        Some(kind) => Err(anyhow!(ValidationError {
            code: "NOT_A_PDF",
            message: format!("Expected a PDF document, got {}", kind.mime_type()),
        })),
        None => Err(anyhow!(ValidationError {
            code: "NOT_A_PDF",
            message: "Expected a PDF document".to_string(),
        })),
    }
}

/// Reference to a finished archive, rendered as `<job id>/<base>.tar.gz`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRef {
    pub job_id: Uuid,
    pub file_name: String,
}

impl ArchiveRef {
    pub fn new(job_id: Uuid, base_name: &str) -> Self {
        Self {
            job_id,
            file_name: format!("{}{}", base_name, ARCHIVE_SUFFIX),
        }
    }

    /// Parses the client-supplied reference; anything that could escape the
    /// archive directory is rejected.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = || {
            anyhow!(ValidationError {
                code: "INVALID_ARCHIVE_REF",
                message: format!("'{}' is not a valid archive reference", value),
            })
        };

        let (id, file_name) = value.split_once('/').ok_or_else(invalid)?;
        let job_id = Uuid::parse_str(id).map_err(|_| invalid())?;

        let sanitized = sanitize_filename(file_name).map_err(|_| invalid())?;
        if sanitized != file_name || !file_name.ends_with(ARCHIVE_SUFFIX) {
            return Err(invalid());
        }

        Ok(Self {
            job_id,
            file_name: sanitized,
        })
    }
}

impl std::fmt::Display for ArchiveRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.job_id, self.file_name)
    }
}
