use chrono::Utc;
use serde::Deserialize;

use crate::config::CloudinaryConfig;
use crate::errors::AppError;
use crate::models::SignedUpload;
use crate::ports::media::sign_params;
use crate::ports::{BoxFuture, MediaAsset, MediaStore};

const API_BASE: &str = "https://api.cloudinary.com/v1_1";

#[derive(Clone)]
pub struct CloudinaryStore {
    config: CloudinaryConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<DestroyError>,
}

#[derive(Debug, Deserialize)]
struct DestroyError {
    message: String,
}

impl CloudinaryStore {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }
}

impl MediaStore for CloudinaryStore {
    fn sign_upload(&self, folder: &str) -> SignedUpload {
        let timestamp = Utc::now().timestamp();
        let signature = sign_params(
            &[
                ("folder", folder.to_string()),
                ("timestamp", timestamp.to_string()),
            ],
            &self.config.api_secret,
        );

        SignedUpload {
            cloud_name: self.config.cloud_name.clone(),
            api_key: self.config.api_key.clone(),
            folder: folder.to_string(),
            timestamp,
            signature,
            signature_algorithm: "sha256".to_string(),
        }
    }

    fn destroy<'a>(&'a self, asset: &'a MediaAsset) -> BoxFuture<'a, Result<(), AppError>> {
        Box::pin(async move {
            let timestamp = Utc::now().timestamp().to_string();
            let signature = sign_params(
                &[
                    ("public_id", asset.public_id.clone()),
                    ("timestamp", timestamp.clone()),
                    ("invalidate", "true".to_string()),
                ],
                &self.config.api_secret,
            );

            let url = format!(
                "{}/{}/{}/destroy",
                API_BASE,
                self.config.cloud_name,
                asset.resource_type.as_str()
            );
            let response = self
                .client
                .post(url)
                .form(&[
                    ("public_id", asset.public_id.as_str()),
                    ("timestamp", timestamp.as_str()),
                    ("invalidate", "true"),
                    ("api_key", self.config.api_key.as_str()),
                    ("signature", signature.as_str()),
                    ("signature_algorithm", "sha256"),
                ])
                .send()
                .await?;

            let status = response.status();
            let body: DestroyResponse = response.json().await?;

            match (body.result.as_deref(), body.error) {
                (Some("ok"), _) => {
                    tracing::info!(public_id = %asset.public_id, "Deleted media asset");
                    Ok(())
                }
                (Some("not found"), _) => {
                    tracing::warn!(public_id = %asset.public_id, "Media asset already gone");
                    Ok(())
                }
                (_, Some(error)) => Err(AppError::External(format!(
                    "Media delete failed ({}): {}",
                    status, error.message
                ))),
                (other, None) => Err(AppError::External(format!(
                    "Media delete failed ({}): unexpected result {:?}",
                    status, other
                ))),
            }
        })
    }
}
