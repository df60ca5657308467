//! Seams to outbound services. Adapters live in `crate::adapters`; tests
//! substitute in-memory fakes.

pub mod mail;
pub mod media;
pub mod push;
pub mod video;

use std::future::Future;
use std::pin::Pin;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use mail::{Mailer, OutgoingEmail};
pub use media::{destroy_url, MediaAsset, MediaStore};
pub use push::{PushError, PushSender};
pub use video::VideoSource;
