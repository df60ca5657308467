use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use crate::config::YouTubeConfig;
use crate::errors::AppError;
use crate::models::VideoItem;
use crate::ports::{BoxFuture, VideoSource};

const PLAYLIST_ITEMS_URL: &str = "https://www.googleapis.com/youtube/v3/playlistItems";
const PAGE_SIZE: &str = "50";
const MAX_PAGES: usize = 20;

pub struct YouTubePlaylist {
    config: YouTubeConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistPage {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    published_at: Option<String>,
    resource_id: ResourceId,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    #[serde(default)]
    high: Option<Thumbnail>,
    #[serde(default)]
    medium: Option<Thumbnail>,
    #[serde(default)]
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl YouTubePlaylist {
    pub fn new(config: YouTubeConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn fetch_page(&self, page_token: Option<&str>) -> Result<PlaylistPage, AppError> {
        let mut query = vec![
            ("part", "snippet"),
            ("maxResults", PAGE_SIZE),
            ("playlistId", self.config.playlist_id.as_str()),
            ("key", self.config.api_key.as_str()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response = self
            .client
            .get(PLAYLIST_ITEMS_URL)
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::External(format!(
                "Video list request failed with status {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }
}

impl VideoSource for YouTubePlaylist {
    fn list_videos(&self) -> BoxFuture<'_, Result<Vec<VideoItem>, AppError>> {
        Box::pin(async move {
            let mut videos = Vec::new();
            let mut token: Option<String> = None;

            for _ in 0..MAX_PAGES {
                let page = self.fetch_page(token.as_deref()).await?;
                token = page.next_page_token.clone();
                videos.extend(videos_from_page(page));
                if token.is_none() {
                    break;
                }
            }

            tracing::debug!(count = videos.len(), "Fetched playlist videos");
            Ok(videos)
        })
    }
}

/// Convert a playlist page, skipping private or deleted entries.
fn videos_from_page(page: PlaylistPage) -> Vec<VideoItem> {
    page.items
        .into_iter()
        .filter_map(|item| {
            let snippet = item.snippet;
            let video_id = snippet.resource_id.video_id.filter(|id| !id.is_empty())?;
            if snippet.title == "Private video" || snippet.title == "Deleted video" {
                return None;
            }

            let thumbnails = snippet.thumbnails;
            let thumbnail_url = thumbnails
                .high
                .or(thumbnails.medium)
                .or(thumbnails.default)
                .map(|t| t.url);

            Some(VideoItem {
                video_id,
                title: snippet.title,
                description: Some(snippet.description).filter(|d| !d.trim().is_empty()),
                published_on: snippet.published_at.as_deref().and_then(published_date),
                thumbnail_url,
            })
        })
        .collect()
}

fn published_date(value: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_videos_from_page() {
        let page: PlaylistPage = serde_json::from_value(serde_json::json!({
            "nextPageToken": "CAUQAA",
            "items": [
                {
                    "snippet": {
                        "title": "Sunday Service - Hope",
                        "description": "Pastor Ann on Romans 5",
                        "publishedAt": "2024-06-02T16:30:00Z",
                        "resourceId": { "kind": "youtube#video", "videoId": "abc123" },
                        "thumbnails": {
                            "default": { "url": "https://i.ytimg.com/vi/abc123/default.jpg" },
                            "high": { "url": "https://i.ytimg.com/vi/abc123/hqdefault.jpg" }
                        }
                    }
                },
                {
                    "snippet": {
                        "title": "Private video",
                        "description": "This video is private.",
                        "resourceId": { "kind": "youtube#video", "videoId": "hidden1" }
                    }
                }
            ]
        }))
        .unwrap();

        assert_eq!(page.next_page_token.as_deref(), Some("CAUQAA"));
        let videos = videos_from_page(page);
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].video_id, "abc123");
        assert_eq!(
            videos[0].published_on,
            NaiveDate::from_ymd_opt(2024, 6, 2)
        );
        assert_eq!(
            videos[0].thumbnail_url.as_deref(),
            Some("https://i.ytimg.com/vi/abc123/hqdefault.jpg")
        );
        assert_eq!(
            videos[0].watch_url(),
            "https://www.youtube.com/watch?v=abc123"
        );
    }
}
