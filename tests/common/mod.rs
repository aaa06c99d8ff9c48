#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response},
};
use http_body_util::BodyExt;
use pdf2img_web::config::{ConverterConfig, ImageFormat, LogConfig};
use pdf2img_web::services::converter::ConversionService;
use pdf2img_web::services::storage::StorageLayout;
use pdf2img_web::services::tools::{Rasterizer, ToolError, create_archiver};
use pdf2img_web::{AppState, create_app};
use percent_encoding::percent_decode_str;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub const BOUNDARY: &str = "---------------------------735323031399963166993862150";

/// Stands in for pdftoppm: one small image per `/Type /Page ` object in the input
pub struct FakeRasterizer;

#[async_trait]
impl Rasterizer for FakeRasterizer {
    async fn rasterize(
        &self,
        input: &Path,
        format: ImageFormat,
        output_prefix: &Path,
    ) -> Result<(), ToolError> {
        let data = tokio::fs::read(input).await?;
        let pages = count_occurrences(&data, b"/Type /Page ");
        if pages == 0 {
            return Err(ToolError::Exit {
                program: "pdftoppm".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "Syntax Error: Couldn't find trailer dictionary".to_string(),
            });
        }

        let image_format = match format {
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::Png => image::ImageFormat::Png,
        };
        for n in 1..=pages {
            let path = format!("{}-{}.{}", output_prefix.display(), n, format.extension());
            // Page number in the red channel so archives can be told apart
            image::RgbImage::from_pixel(16, 16, image::Rgb([(n * 20 % 256) as u8, 120, 40]))
                .save_with_format(&path, image_format)
                .map_err(|e| ToolError::Io(std::io::Error::other(e)))?;
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .filter(|window| *window == needle)
        .count()
}

pub struct TestApp {
    pub app: Router,
    pub layout: Arc<StorageLayout>,
    pub config: ConverterConfig,
    _work: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_rasterizer(Arc::new(FakeRasterizer)).await
    }

    pub async fn with_rasterizer(rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self::with_archiver_type("native", rasterizer).await
    }

    /// `archiver_type` as in `ARCHIVER`: "native" or "tar"
    pub async fn with_archiver_type(archiver_type: &str, rasterizer: Arc<dyn Rasterizer>) -> Self {
        let work = TempDir::new().unwrap();
        let config = ConverterConfig {
            work_dir: work.path().to_path_buf(),
            static_dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("static"),
            max_file_size: 1024 * 1024,
            archiver_type: archiver_type.to_string(),
            ..ConverterConfig::development()
        };
        Self::with_config(work, config, rasterizer).await
    }

    pub async fn with_config(
        work: TempDir,
        config: ConverterConfig,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Self {
        let layout = Arc::new(StorageLayout::new(config.work_dir.clone()));
        layout.ensure().await.unwrap();

        let archiver = create_archiver(&config);
        let converter = Arc::new(ConversionService::new(
            layout.clone(),
            rasterizer,
            archiver,
            &config,
        ));

        let state = AppState {
            converter,
            config: config.clone(),
            log: LogConfig {
                verbose_requests: true,
                ..LogConfig::default()
            },
        };

        Self {
            app: create_app(state),
            layout,
            config,
            _work: work,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        use tower::ServiceExt;
        self.app.clone().oneshot(request).await.unwrap()
    }

    pub async fn convert(&self, filename: &str, data: &[u8]) -> Response<Body> {
        let (content_type, body) = multipart_body("uploadfile", filename, data);
        self.send(convert_request(content_type, body)).await
    }

    pub async fn download(&self, reference: &str) -> Response<Body> {
        let uri = format!(
            "/download?fn={}",
            percent_encoding::utf8_percent_encode(reference, percent_encoding::NON_ALPHANUMERIC)
        );
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Number of entries left under the scratch directory
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.layout.scratch_root())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub fn convert_request(content_type: String, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/convert")
        .header("Content-Type", content_type)
        .body(Body::from(body))
        .unwrap()
}

/// Single-file multipart form plus its content type
pub fn multipart_body(field: &str, filename: &str, data: &[u8]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"token\"\r\n\r\n\
             0123456789abcdef\r\n\
             --{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    (
        format!("multipart/form-data; boundary={BOUNDARY}"),
        body,
    )
}

/// Smallest well-formed PDF with `pages` blank US-letter pages
pub fn minimal_pdf(pages: usize) -> Vec<u8> {
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            (0..pages)
                .map(|i| format!("{} 0 R", i + 3))
                .collect::<Vec<_>>()
                .join(" "),
            pages
        ),
    ];
    for _ in 0..pages {
        objects.push("<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>".to_string());
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, object) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, object).as_bytes());
    }

    let xref_offset = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    out
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_text(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

/// Pulls the archive reference out of the result page's download link
pub fn archive_ref_from_page(html: &str) -> String {
    let start = html
        .find("download?fn=")
        .expect("result page has no download link")
        + "download?fn=".len();
    let encoded: String = html[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '%')
        .collect();
    percent_decode_str(&encoded)
        .decode_utf8()
        .unwrap()
        .into_owned()
}

/// Entry paths and contents of a gzipped tarball
pub fn read_tar_gz(data: &[u8]) -> Vec<(String, Vec<u8>)> {
    let decoder = flate2::read::GzDecoder::new(data);
    let mut archive = tar::Archive::new(decoder);
    let mut entries = Vec::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path().unwrap().to_string_lossy().into_owned();
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        entries.push((path, content));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}
