//! Image probing and plausibility scoring.
//!
//! Listings frequently point at dead, tiny, or decorative images. The
//! validator probes each candidate URL cheaply, downloads within a hard
//! size cap, decodes off the async threads, and scores how much the result
//! looks like a real product photo. Nothing in here ever fails a listing:
//! every error path degrades to an invalid [`ImageInfo`].

use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, trace};

use crate::error::ImageError;
use crate::models::ImageInfo;

/// Formats product photos actually ship in.
const COMMON_FORMATS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Probes and scores candidate listing images.
#[derive(Clone)]
pub struct ImageValidator {
    client: Client,
    cap_bytes: u64,
}

impl ImageValidator {
    pub fn new(timeout: Duration, cap_bytes: u64) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { client, cap_bytes }
    }

    /// Probe, download, decode, and score one image URL. Infallible by
    /// contract: any trouble yields an invalid record with score zero.
    pub async fn validate(&self, url: &str) -> ImageInfo {
        match self.try_validate(url).await {
            Ok(info) => info,
            Err(err) => {
                debug!(%url, %err, "image rejected");
                ImageInfo::invalid(url)
            }
        }
    }

    async fn try_validate(&self, url: &str) -> Result<ImageInfo, ImageError> {
        // Existence probe first; a HEAD rejection is cheaper than a body.
        // Some CDNs refuse HEAD outright, so transport errors fall through
        // to the GET.
        match self.client.head(url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_client_error() || status.is_server_error() {
                    return Err(ImageError::Status(status.as_u16()));
                }
                if let Some(content_type) = header_str(&response, "content-type") {
                    if !plausible_image_type(&content_type) {
                        return Err(ImageError::NotAnImage(content_type));
                    }
                }
                if let Some(length) = response.content_length() {
                    if length > self.cap_bytes {
                        return Err(ImageError::TooLarge {
                            size: length,
                            cap: self.cap_bytes,
                        });
                    }
                }
            }
            Err(err) => trace!(%url, %err, "HEAD probe failed, trying GET"),
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Status(status.as_u16()));
        }
        if let Some(content_type) = header_str(&response, "content-type") {
            if !plausible_image_type(&content_type) {
                return Err(ImageError::NotAnImage(content_type));
            }
        }
        if let Some(length) = response.content_length() {
            if length > self.cap_bytes {
                return Err(ImageError::TooLarge {
                    size: length,
                    cap: self.cap_bytes,
                });
            }
        }

        // Stream the body so an oversized or lying server is abandoned at
        // the cap instead of buffered whole.
        let mut bytes: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if (bytes.len() + chunk.len()) as u64 > self.cap_bytes {
                return Err(ImageError::TooLarge {
                    size: (bytes.len() + chunk.len()) as u64,
                    cap: self.cap_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }

        // Magic bytes beat headers; CDNs lie about content-type.
        match infer::get(&bytes) {
            Some(kind) if kind.mime_type().starts_with("image/") => {}
            Some(kind) => return Err(ImageError::NotAnImage(kind.mime_type().to_string())),
            None => return Err(ImageError::Undecodable("unrecognized magic bytes".into())),
        }

        let url_owned = url.to_string();
        let decoded = tokio::task::spawn_blocking(move || decode_and_score(&bytes, &url_owned))
            .await
            .map_err(|e| ImageError::Undecodable(format!("decode task failed: {e}")))??;
        Ok(decoded)
    }
}

fn header_str(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn plausible_image_type(content_type: &str) -> bool {
    let content_type = content_type.to_lowercase();
    content_type.starts_with("image/")
        || content_type.starts_with("application/octet-stream")
        || content_type.starts_with("binary/")
}

/// CPU-bound half: decode and produce the scored record. Runs on a blocking
/// thread.
fn decode_and_score(bytes: &[u8], url: &str) -> Result<ImageInfo, ImageError> {
    let format = image::guess_format(bytes)
        .map_err(|e| ImageError::Undecodable(format!("unknown format: {e}")))?;
    let decoded =
        image::load_from_memory(bytes).map_err(|e| ImageError::Undecodable(e.to_string()))?;

    let (width, height) = {
        use image::GenericImageView;
        decoded.dimensions()
    };
    let color = decoded.color();
    let format_name = format
        .extensions_str()
        .first()
        .copied()
        .unwrap_or("unknown")
        .to_string();

    let score = plausibility_score(width, height, &format_name, color.has_color());

    Ok(ImageInfo {
        url: url.to_string(),
        is_valid: true,
        width,
        height,
        format: Some(format_name),
        score,
    })
}

/// Composite plausibility score in [0,1]: moderate dimensions, common
/// format, near-square aspect, real color depth.
pub fn plausibility_score(width: u32, height: u32, format: &str, has_color: bool) -> f64 {
    if width == 0 || height == 0 {
        return 0.0;
    }
    let mut score = 0.0;

    let moderate = |d: u32| (200..=2000).contains(&d);
    let tolerable = |d: u32| (100..=4000).contains(&d);
    if moderate(width) && moderate(height) {
        score += 0.40;
    } else if tolerable(width) && tolerable(height) {
        score += 0.15;
    }

    let aspect = f64::from(width) / f64::from(height);
    if (0.7..=1.3).contains(&aspect) {
        score += 0.25;
    } else if (0.4..=2.5).contains(&aspect) {
        score += 0.10;
    }

    if COMMON_FORMATS.contains(&format) {
        score += 0.20;
    } else {
        score += 0.10;
    }

    score += if has_color { 0.15 } else { 0.05 };

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 255) as u8, (y % 255) as u8, 128])
        });
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn validator() -> ImageValidator {
        ImageValidator::new(Duration::from_secs(5), 10 * 1024 * 1024)
    }

    #[test]
    fn score_rewards_product_photo_shapes() {
        let good = plausibility_score(800, 800, "jpeg", true);
        assert_eq!(good, 1.0);

        let banner = plausibility_score(1200, 90, "jpeg", true);
        assert!(banner < good);

        let tiny_icon = plausibility_score(32, 32, "png", true);
        assert!(tiny_icon < 0.7);

        let grayscale = plausibility_score(800, 800, "jpeg", false);
        assert!(grayscale < good);

        assert_eq!(plausibility_score(0, 100, "png", true), 0.0);
    }

    #[test]
    fn decode_rejects_garbage_without_panicking() {
        assert!(decode_and_score(&[], "https://x.test/i").is_err());
        assert!(decode_and_score(b"not an image at all", "https://x.test/i").is_err());
    }

    #[tokio::test]
    async fn valid_png_is_scored() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(png_bytes(400, 400))
                    .insert_header("content-type", "image/png"),
            )
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/img.png"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/png"))
            .mount(&server)
            .await;

        let info = validator()
            .validate(&format!("{}/img.png", server.uri()))
            .await;
        assert!(info.is_valid);
        assert_eq!((info.width, info.height), (400, 400));
        assert_eq!(info.format.as_deref(), Some("png"));
        assert!(info.score > 0.5);
    }

    #[tokio::test]
    async fn zero_byte_body_is_invalid_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/png"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(Vec::<u8>::new())
                    .insert_header("content-type", "image/png"),
            )
            .mount(&server)
            .await;

        let info = validator().validate(&server.uri()).await;
        assert!(!info.is_valid);
        assert_eq!(info.score, 0.0);
    }

    #[tokio::test]
    async fn oversized_content_length_is_rejected_early() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg")
                    .insert_header("content-length", "999999999"),
            )
            .mount(&server)
            .await;

        let info = validator().validate(&server.uri()).await;
        assert!(!info.is_valid);
    }

    #[tokio::test]
    async fn body_larger_than_cap_is_abandoned() {
        let server = MockServer::start().await;
        let body = vec![0u8; 64 * 1024];
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "image/png"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(body)
                    .insert_header("content-type", "image/png"),
            )
            .mount(&server)
            .await;

        let small_cap = ImageValidator::new(Duration::from_secs(5), 1024);
        let info = small_cap.validate(&server.uri()).await;
        assert!(!info.is_valid);
    }

    #[tokio::test]
    async fn html_masquerading_as_image_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
            .mount(&server)
            .await;

        let info = validator().validate(&server.uri()).await;
        assert!(!info.is_valid);
    }
}
