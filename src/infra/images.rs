//! HTTP image fetch and decode.

use std::time::Instant;

use async_trait::async_trait;
use metrics::histogram;
use reqwest::{Client, Url};
use tracing::debug;

use crate::application::decode::{DecodeError, DecodedImage, ImageDecoder};
use crate::config::ImageSettings;
use crate::domain::media::MediaItem;

use super::error::InfraError;

const SOURCE: &str = "infra::images::HttpImageDecoder";
pub(crate) const METRIC_DECODE_MS: &str = "vitrine_image_decode_ms";

/// Fetches the display-sized rendition of a media item and decodes it to RGBA.
#[derive(Clone)]
pub struct HttpImageDecoder {
    client: Client,
    settings: ImageSettings,
}

impl HttpImageDecoder {
    pub fn new(settings: ImageSettings) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(concat!("vitrine/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        Ok(Self { client, settings })
    }

    /// URL actually fetched for `source`.
    ///
    /// With a transform base the source travels as the `url` parameter next to
    /// `width`, `quality` and `format`; without one the source URL is used as is.
    pub fn transform_url(&self, source: &str) -> Result<Url, DecodeError> {
        let invalid = |err: url::ParseError| DecodeError::InvalidUrl {
            url: source.to_string(),
            message: err.to_string(),
        };

        match self.settings.transform_base.as_ref() {
            Some(base) => {
                let mut url = base.clone();
                url.query_pairs_mut()
                    .append_pair("url", source)
                    .append_pair("width", &self.settings.width.to_string())
                    .append_pair("quality", &self.settings.quality.to_string())
                    .append_pair("format", &self.settings.format);
                Ok(url)
            }
            None => Url::parse(source).map_err(invalid),
        }
    }

    async fn fetch(&self, url: Url) -> Result<Vec<u8>, DecodeError> {
        let display = url.to_string();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| DecodeError::Fetch {
                url: display.clone(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DecodeError::Status {
                url: display,
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(|err| DecodeError::Fetch {
            url: display,
            message: err.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageDecoder for HttpImageDecoder {
    async fn decode(&self, media: &MediaItem) -> Result<DecodedImage, DecodeError> {
        let started = Instant::now();
        let url = self.transform_url(&media.url)?;
        let bytes = self.fetch(url).await?;

        let source = media.url.clone();
        let image = tokio::task::spawn_blocking(move || decode_bytes(&source, &bytes))
            .await
            .map_err(|err| DecodeError::Aborted(err.to_string()))??;

        histogram!(METRIC_DECODE_MS).record(started.elapsed().as_secs_f64() * 1000.0);
        debug!(
            target = SOURCE,
            media_id = %media.id,
            width = image.width(),
            height = image.height(),
            "background decoded"
        );
        Ok(image)
    }
}

fn decode_bytes(source: &str, bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    image::load_from_memory(bytes)
        .map(|image| DecodedImage::new(image.to_rgba8()))
        .map_err(|err| DecodeError::Decode {
            url: source.to_string(),
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::{io::Cursor, num::NonZeroU32, time::Duration};

    use image::{DynamicImage, ImageFormat, RgbaImage};

    use super::*;

    fn settings(transform_base: Option<&str>) -> ImageSettings {
        ImageSettings {
            transform_base: transform_base.map(|base| Url::parse(base).expect("base url")),
            width: NonZeroU32::new(1280).expect("non-zero"),
            quality: 75,
            format: "webp".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn transform_url_carries_rendition_parameters() {
        let decoder =
            HttpImageDecoder::new(settings(Some("https://img.example/render?fit=cover")))
                .expect("decoder");
        let url = decoder
            .transform_url("https://cdn.example/photos/a b.jpg")
            .expect("url");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(url.host_str(), Some("img.example"));
        assert_eq!(
            pairs,
            vec![
                ("fit".to_string(), "cover".to_string()),
                ("url".to_string(), "https://cdn.example/photos/a b.jpg".to_string()),
                ("width".to_string(), "1280".to_string()),
                ("quality".to_string(), "75".to_string()),
                ("format".to_string(), "webp".to_string()),
            ]
        );
    }

    #[test]
    fn raw_url_is_used_without_transform_base() {
        let decoder = HttpImageDecoder::new(settings(None)).expect("decoder");

        let url = decoder
            .transform_url("https://cdn.example/a.jpg")
            .expect("url");
        assert_eq!(url.as_str(), "https://cdn.example/a.jpg");

        assert!(matches!(
            decoder.transform_url("/uploads/a.jpg"),
            Err(DecodeError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn decodes_png_bytes_to_rgba() {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::new(3, 2))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode png");

        let image = decode_bytes("mem://a.png", &bytes).expect("decode");
        assert_eq!((image.width(), image.height()), (3, 2));

        assert!(matches!(
            decode_bytes("mem://broken", b"not an image"),
            Err(DecodeError::Decode { .. })
        ));
    }
}
