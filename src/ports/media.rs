//! Hosted media: upload signing, asset addressing and deletion.
//!
//! Files are uploaded by the browser directly to the media host with a
//! server-issued signature. Deleting a record must delete its asset first,
//! so every stored URL has to map back to the public id it was uploaded as.

use sha2::{Digest, Sha256};

use super::BoxFuture;
use crate::errors::AppError;
use crate::models::SignedUpload;

/// Parameters that are sent with a signed request but never signed.
const UNSIGNED_PARAMS: [&str; 5] = [
    "file",
    "cloud_name",
    "resource_type",
    "api_key",
    "signature_algorithm",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Image,
    Video,
    /// PDFs and other documents; the public id keeps its extension
    Raw,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Image => "image",
            ResourceType::Video => "video",
            ResourceType::Raw => "raw",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(ResourceType::Image),
            "video" => Some(ResourceType::Video),
            "raw" => Some(ResourceType::Raw),
            _ => None,
        }
    }
}

/// A stored asset addressed by public id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub resource_type: ResourceType,
    pub public_id: String,
}

impl MediaAsset {
    /// Recover the public id from a delivery URL.
    ///
    /// Everything after `/upload/` is the path and the query string is
    /// dropped. Leading transformation segments are skipped, then a
    /// `v<digits>` version segment if one follows them; the rest is kept
    /// verbatim. For images and videos the file extension is removed.
    /// Returns `None` for URLs that are not delivery URLs.
    pub fn from_url(url: &str) -> Option<Self> {
        let (prefix, path) = url.trim().split_once("/upload/")?;

        let resource_type = prefix
            .rsplit('/')
            .next()
            .and_then(ResourceType::parse)
            .unwrap_or(ResourceType::Image);

        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        // A version only counts directly after the transformations; a `v2`
        // folder deeper in the path belongs to the public id.
        let transformations = segments
            .iter()
            .take_while(|s| is_transformation_segment(s))
            .count();
        let start = match segments.get(transformations) {
            Some(s) if is_version_segment(s) => transformations + 1,
            _ => transformations,
        };
        let mut public_id = segments[start..].join("/");

        if resource_type != ResourceType::Raw {
            if let Some(dot) = public_id.rfind('.') {
                if !public_id[dot..].contains('/') {
                    public_id.truncate(dot);
                }
            }
        }

        if public_id.is_empty() {
            return None;
        }

        Some(Self {
            resource_type,
            public_id,
        })
    }

    #[cfg(test)]
    fn delivery_url(&self, cloud_name: &str, version: Option<u64>, format: Option<&str>) -> String {
        let mut url = format!(
            "https://res.cloudinary.com/{}/{}/upload/",
            cloud_name,
            self.resource_type.as_str()
        );
        if let Some(version) = version {
            url.push_str(&format!("v{}/", version));
        }
        url.push_str(&self.public_id);
        if let Some(format) = format {
            url.push('.');
            url.push_str(format);
        }
        url
    }
}

/// `c_fill,w_200` style segments: comma-separated `key_value` parameters
/// with short lowercase keys.
fn is_transformation_segment(segment: &str) -> bool {
    segment.split(',').all(|param| match param.split_once('_') {
        Some((key, value)) => {
            (1..=3).contains(&key.len())
                && key.chars().all(|c| c.is_ascii_lowercase())
                && !value.is_empty()
        }
        None => false,
    })
}

fn is_version_segment(segment: &str) -> bool {
    segment.len() > 1
        && segment.starts_with('v')
        && segment[1..].chars().all(|c| c.is_ascii_digit())
}

/// Signature over request parameters: sorted `key=value` pairs joined by `&`,
/// followed by the API secret, hashed with SHA-256.
pub fn sign_params(params: &[(&str, String)], api_secret: &str) -> String {
    let mut signed: Vec<&(&str, String)> = params
        .iter()
        .filter(|(key, value)| !UNSIGNED_PARAMS.contains(key) && !value.is_empty())
        .collect();
    signed.sort_by(|a, b| a.0.cmp(b.0));

    let joined = signed
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    format!("{:x}", Sha256::digest(format!("{}{}", joined, api_secret).as_bytes()))
}

pub trait MediaStore: Send + Sync {
    /// Parameters for a browser upload into `folder`.
    fn sign_upload(&self, folder: &str) -> SignedUpload;

    /// Delete an asset. An asset that is already gone counts as deleted.
    fn destroy<'a>(&'a self, asset: &'a MediaAsset) -> BoxFuture<'a, Result<(), AppError>>;
}

/// Delete the asset behind a stored URL before its record is removed.
///
/// Empty URLs and URLs that do not point at the media host have nothing to
/// delete; any failure from the host is returned so the caller keeps the record.
pub async fn destroy_url(store: &dyn MediaStore, url: &str) -> Result<(), AppError> {
    if url.trim().is_empty() {
        return Ok(());
    }

    match MediaAsset::from_url(url) {
        Some(asset) => store.destroy(&asset).await,
        None => {
            tracing::warn!(url = %url, "Stored media URL is not a delivery URL; nothing to delete");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_id_from_image_url() {
        let asset = MediaAsset::from_url(
            "https://res.cloudinary.com/demo/image/upload/v1712345678/directory/jane-doe.jpg?_a=BAMADK",
        )
        .unwrap();
        assert_eq!(asset.resource_type, ResourceType::Image);
        assert_eq!(asset.public_id, "directory/jane-doe");
    }

    #[test]
    fn test_raw_public_id_keeps_extension() {
        let asset = MediaAsset::from_url(
            "https://res.cloudinary.com/demo/raw/upload/v17/bulletins/2024-06-02.pdf",
        )
        .unwrap();
        assert_eq!(asset.resource_type, ResourceType::Raw);
        assert_eq!(asset.public_id, "bulletins/2024-06-02.pdf");
    }

    #[test]
    fn test_public_id_without_version_or_with_transformations() {
        let plain =
            MediaAsset::from_url("https://res.cloudinary.com/demo/image/upload/families/smith.png")
                .unwrap();
        assert_eq!(plain.public_id, "families/smith");

        let transformed = MediaAsset::from_url(
            "https://res.cloudinary.com/demo/image/upload/c_fill,w_200/v99/families/smith.png",
        )
        .unwrap();
        assert_eq!(transformed.public_id, "families/smith");

        let unversioned = MediaAsset::from_url(
            "https://res.cloudinary.com/demo/image/upload/c_thumb,g_face/families/smith.png",
        )
        .unwrap();
        assert_eq!(unversioned.public_id, "families/smith");
    }

    #[test]
    fn test_version_like_folder_stays_in_public_id() {
        let asset = MediaAsset::from_url(
            "https://res.cloudinary.com/demo/raw/upload/lesson-notes/v2/week1.pdf",
        )
        .unwrap();
        assert_eq!(asset.public_id, "lesson-notes/v2/week1.pdf");

        let versioned = MediaAsset::from_url(
            "https://res.cloudinary.com/demo/image/upload/v1712345678/albums/v3/cover.jpg",
        )
        .unwrap();
        assert_eq!(versioned.public_id, "albums/v3/cover");
    }

    #[test]
    fn test_non_delivery_urls() {
        assert_eq!(MediaAsset::from_url("https://example.com/photo.jpg"), None);
        assert_eq!(
            MediaAsset::from_url("https://res.cloudinary.com/demo/image/upload/v12/"),
            None
        );
    }

    #[test]
    fn test_delivery_url_maps_back_to_public_id() {
        let cases = [
            (ResourceType::Image, "directory/jane-doe", Some(1712345678), Some("jpg")),
            (ResourceType::Video, "sermons/easter.2024", Some(1712345678), Some("mp4")),
            (ResourceType::Raw, "bulletins/2024-06-02.pdf", Some(1712345678), None),
            (ResourceType::Raw, "lesson-notes/v2/week1.pdf", None, None),
            (ResourceType::Image, "v2024/retreat", Some(7), Some("png")),
        ];

        for (resource_type, public_id, version, format) in cases {
            let asset = MediaAsset {
                resource_type,
                public_id: public_id.to_string(),
            };
            let url = asset.delivery_url("demo", version, format);
            assert_eq!(MediaAsset::from_url(&url), Some(asset), "url: {}", url);
        }
    }

    #[test]
    fn test_sign_params_sorts_and_skips_unsigned() {
        let params = [
            ("timestamp", "1315060510".to_string()),
            ("public_id", "sample_image".to_string()),
            ("api_key", "1234".to_string()),
            ("eager", "w_400,h_300,c_pad|w_260,h_200,c_crop".to_string()),
        ];
        let expected = format!(
            "{:x}",
            Sha256::digest(
                b"eager=w_400,h_300,c_pad|w_260,h_200,c_crop&public_id=sample_image&timestamp=1315060510abcd"
            )
        );
        assert_eq!(sign_params(&params, "abcd"), expected);
    }
}
