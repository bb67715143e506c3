//! Normalization of attached media into externally fetchable URLs

use crosspost_core::models::{MediaKind, MediaRef};
use crosspost_core::PublishConfig;
use url::Url;

use crate::error::PublishError;

/// A media reference ready to hand to a network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub url: String,
    pub kind: MediaKind,
    pub mime_type: String,
}

impl ResolvedMedia {
    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }

    pub fn is_image(&self) -> bool {
        self.kind == MediaKind::Image
    }
}

#[derive(Debug, Clone, Default)]
pub struct MediaResolver {
    public_base_url: Option<String>,
    proxy_prefix: Option<String>,
}

impl MediaResolver {
    pub fn new(public_base_url: Option<String>, proxy_prefix: Option<String>) -> Self {
        Self {
            public_base_url,
            proxy_prefix,
        }
    }

    pub fn from_config(config: &PublishConfig) -> Self {
        Self::new(
            config.public_media_base_url.clone(),
            config.media_proxy_prefix.clone(),
        )
    }

    pub fn resolve_all(&self, media: &[MediaRef]) -> Result<Vec<ResolvedMedia>, PublishError> {
        media.iter().map(|m| self.resolve(m)).collect()
    }

    pub fn resolve(&self, media: &MediaRef) -> Result<ResolvedMedia, PublishError> {
        let absolute = self.absolutize(media.url.trim())?;
        let unwrapped = self.unwrap_proxy(&absolute);
        let url = rewrite_provider_url(&unwrapped);

        let hinted_ext = media
            .filename
            .as_deref()
            .and_then(extension_of)
            .or_else(|| url_extension(&url));

        let kind = media
            .kind
            .or_else(|| hinted_ext.as_deref().and_then(kind_for_extension))
            .unwrap_or(MediaKind::Image);

        let mime_type = hinted_ext
            .as_deref()
            .and_then(mime_for_extension)
            .filter(|(ext_kind, _)| *ext_kind == kind)
            .map(|(_, mime)| mime.to_string())
            .unwrap_or_else(|| default_mime(kind).to_string());

        Ok(ResolvedMedia {
            url,
            kind,
            mime_type,
        })
    }

    fn absolutize(&self, raw: &str) -> Result<String, PublishError> {
        if raw.is_empty() {
            return Err(PublishError::Validation("media URL is empty".to_string()));
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Ok(raw.to_string());
        }

        match &self.public_base_url {
            Some(base) => Ok(format!(
                "{}/{}",
                base.trim_end_matches('/'),
                raw.trim_start_matches('/')
            )),
            None => Err(PublishError::Validation(format!(
                "media URL '{}' is relative and no public media base URL is configured",
                raw
            ))),
        }
    }

    fn unwrap_proxy(&self, url: &str) -> String {
        let Some(prefix) = self.proxy_prefix.as_deref() else {
            return url.to_string();
        };
        if !url.starts_with(prefix) {
            return url.to_string();
        }

        Url::parse(url)
            .ok()
            .and_then(|parsed| {
                parsed
                    .query_pairs()
                    .find(|(key, _)| key == "url")
                    .map(|(_, value)| value.into_owned())
            })
            .filter(|target| target.starts_with("http://") || target.starts_with("https://"))
            .unwrap_or_else(|| url.to_string())
    }
}

/// Turn share links of hosted storage providers into direct download links
fn rewrite_provider_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    match url.host_str() {
        Some("drive.google.com") => {
            let segments: Vec<String> = url
                .path_segments()
                .map(|s| s.map(String::from).collect())
                .unwrap_or_default();
            let file_id = match segments.as_slice() {
                [file, d, id, ..] if file == "file" && d == "d" => Some(id.clone()),
                [open] if open == "open" => url
                    .query_pairs()
                    .find(|(key, _)| key == "id")
                    .map(|(_, v)| v.into_owned()),
                _ => None,
            };
            match file_id {
                Some(id) => format!("https://drive.google.com/uc?export=download&id={}", id),
                None => raw.to_string(),
            }
        }
        Some("www.dropbox.com") | Some("dropbox.com") => {
            let pairs: Vec<(String, String)> = url
                .query_pairs()
                .filter(|(key, _)| key != "dl")
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            url.query_pairs_mut()
                .clear()
                .extend_pairs(pairs)
                .append_pair("dl", "1");
            url.to_string()
        }
        _ => raw.to_string(),
    }
}

fn extension_of(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || ext.contains('/') {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn url_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?.to_string();
    extension_of(&last)
}

fn kind_for_extension(ext: &str) -> Option<MediaKind> {
    mime_for_extension(ext).map(|(kind, _)| kind)
}

fn mime_for_extension(ext: &str) -> Option<(MediaKind, &'static str)> {
    let entry = match ext {
        "jpg" | "jpeg" => (MediaKind::Image, "image/jpeg"),
        "png" => (MediaKind::Image, "image/png"),
        "gif" => (MediaKind::Image, "image/gif"),
        "webp" => (MediaKind::Image, "image/webp"),
        "heic" => (MediaKind::Image, "image/heic"),
        "mp4" => (MediaKind::Video, "video/mp4"),
        "m4v" => (MediaKind::Video, "video/x-m4v"),
        "mov" => (MediaKind::Video, "video/quicktime"),
        "webm" => (MediaKind::Video, "video/webm"),
        "avi" => (MediaKind::Video, "video/x-msvideo"),
        "mkv" => (MediaKind::Video, "video/x-matroska"),
        _ => return None,
    };
    Some(entry)
}

fn default_mime(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Image => "image/jpeg",
        MediaKind::Video => "video/mp4",
    }
}
