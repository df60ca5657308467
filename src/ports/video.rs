use super::BoxFuture;
use crate::errors::AppError;
use crate::models::VideoItem;

/// The church's published video list.
pub trait VideoSource: Send + Sync {
    fn list_videos(&self) -> BoxFuture<'_, Result<Vec<VideoItem>, AppError>>;
}
