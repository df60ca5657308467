//! Production implementations of the outbound ports.

mod cloudinary;
mod push_service;
mod smtp;
mod youtube;

pub use cloudinary::CloudinaryStore;
pub use push_service::WebPushSender;
pub use smtp::SmtpMailer;
pub use youtube::YouTubePlaylist;
