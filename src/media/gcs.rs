//! Google Cloud Storage relay over the JSON API.
//!
//! Authenticates as a service account: a signed RS256 assertion is exchanged
//! for an OAuth access token, which is cached until shortly before expiry.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;

use super::{check_object_path, MediaError, MediaRelay};

const STORAGE_HOST: &str = "https://storage.googleapis.com";
const SCOPE: &str = "https://www.googleapis.com/auth/devstorage.read_write";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    value: String,
    expires_at: i64,
}

pub struct GcsRelay {
    bucket: String,
    key: ServiceAccountKey,
    signing_key: EncodingKey,
    client: Client,
    token: RwLock<Option<CachedToken>>,
}

impl GcsRelay {
    /// `service_account_key` is the base64-encoded JSON key file.
    pub fn new(bucket: &str, service_account_key: &str) -> Result<Self, MediaError> {
        if bucket.is_empty() {
            return Err(MediaError::Config("GCP_BUCKET_NAME is not set".into()));
        }
        let raw = STANDARD
            .decode(service_account_key.trim())
            .map_err(|e| MediaError::Config(format!("service account key is not base64: {e}")))?;
        let key: ServiceAccountKey = serde_json::from_slice(&raw)
            .map_err(|e| MediaError::Config(format!("service account key is not valid JSON: {e}")))?;
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| MediaError::Config(format!("service account private key: {e}")))?;
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        tracing::info!("GCS media relay configured for bucket {}", bucket);

        Ok(Self {
            bucket: bucket.to_string(),
            key,
            signing_key,
            client,
            token: RwLock::new(None),
        })
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}/{}", STORAGE_HOST, self.bucket, path)
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            STORAGE_HOST,
            self.bucket,
            encode_object_name(path)
        )
    }

    async fn access_token(&self) -> Result<String, MediaError> {
        let now = chrono::Utc::now().timestamp();
        if let Some(token) = self.token.read().await.as_ref() {
            if token.expires_at - TOKEN_REFRESH_MARGIN_SECS > now {
                return Ok(token.value.clone());
            }
        }

        let mut slot = self.token.write().await;
        if let Some(token) = slot.as_ref() {
            if token.expires_at - TOKEN_REFRESH_MARGIN_SECS > now {
                return Ok(token.value.clone());
            }
        }

        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| MediaError::Config(format!("failed to sign token assertion: {e}")))?;

        let response = self
            .client
            .post(&self.key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        let token: TokenResponse = check(response).await?.json().await?;

        tracing::debug!("Obtained GCS access token, valid for {}s", token.expires_in);
        *slot = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: now + token.expires_in,
        });
        Ok(token.access_token)
    }
}

/// Percent-encode an object name for use as a single URL path segment.
fn encode_object_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for b in name.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, MediaError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(MediaError::Upstream {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl MediaRelay for GcsRelay {
    fn name(&self) -> &'static str {
        "gcs"
    }

    async fn put(&self, path: &str, content_type: &str, bytes: Bytes) -> Result<String, MediaError> {
        check_object_path(path)?;
        let token = self.access_token().await?;
        let size = bytes.len();
        let response = self
            .client
            .post(format!("{}/upload/storage/v1/b/{}/o", STORAGE_HOST, self.bucket))
            .query(&[
                ("uploadType", "media"),
                ("name", path),
                ("predefinedAcl", "publicRead"),
            ])
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        check(response).await?;

        tracing::info!("Image uploaded to GCS: {} ({} bytes)", path, size);
        Ok(self.public_url(path))
    }

    async fn exists(&self, path: &str) -> Result<bool, MediaError> {
        check_object_path(path)?;
        let token = self.access_token().await?;
        let response = self
            .client
            .get(self.object_url(path))
            .bearer_auth(token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(response).await?;
        Ok(true)
    }

    async fn remove(&self, path: &str) -> Result<(), MediaError> {
        check_object_path(path)?;
        let token = self.access_token().await?;
        let response = self
            .client
            .delete(self.object_url(path))
            .bearer_auth(token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response).await?;
        Ok(())
    }

    fn path_from_url(&self, url: &str) -> Option<String> {
        let prefix = format!("{}/{}/", STORAGE_HOST, self.bucket);
        url.strip_prefix(&prefix)
            .filter(|path| check_object_path(path).is_ok())
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_object_name_escapes_slashes() {
        assert_eq!(
            encode_object_name("projects/main/2024__a b.png"),
            "projects%2Fmain%2F2024__a%20b.png"
        );
    }

    #[test]
    fn test_new_rejects_bad_configuration() {
        assert!(matches!(
            GcsRelay::new("", "e30="),
            Err(MediaError::Config(_))
        ));
        assert!(matches!(
            GcsRelay::new("bucket", "not base64!"),
            Err(MediaError::Config(_))
        ));
        // "{}" is valid JSON but lacks the key fields.
        assert!(matches!(
            GcsRelay::new("bucket", "e30="),
            Err(MediaError::Config(_))
        ));
    }
}
