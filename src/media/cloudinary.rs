//! Cloudinary relay using the signed upload API.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;

use super::{check_object_path, MediaError, MediaRelay};

const API_HOST: &str = "https://api.cloudinary.com/v1_1";

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

pub struct CloudinaryRelay {
    cloud_name: String,
    api_key: String,
    api_secret: String,
    folder: String,
    client: Client,
}

impl CloudinaryRelay {
    pub fn new(
        cloud_name: &str,
        api_key: &str,
        api_secret: &str,
        folder: &str,
    ) -> Result<Self, MediaError> {
        if cloud_name.is_empty() || api_key.is_empty() || api_secret.is_empty() {
            return Err(MediaError::Config(
                "CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY and CLOUDINARY_API_SECRET must be set"
                    .into(),
            ));
        }
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        tracing::info!("Cloudinary media relay configured for cloud {}", cloud_name);

        Ok(Self {
            cloud_name: cloud_name.to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            folder: folder.trim_matches('/').to_string(),
            client,
        })
    }

    /// Object paths map to public ids inside the configured folder, without
    /// the file extension.
    fn public_id(&self, path: &str) -> String {
        let stem = strip_extension(path);
        if self.folder.is_empty() {
            stem.to_string()
        } else {
            format!("{}/{}", self.folder, stem)
        }
    }

    fn sign(&self, params: &[(&str, &str)]) -> String {
        sign_params(params, &self.api_secret)
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/image/{}", API_HOST, self.cloud_name, action)
    }
}

fn strip_extension(path: &str) -> &str {
    let file_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[file_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..file_start + dot],
        _ => path,
    }
}

/// Cloudinary signature: parameters sorted by name, joined as `k=v&k=v`,
/// the API secret appended, then SHA-256 in lowercase hex.
fn sign_params(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{:x}", Sha256::digest(format!("{joined}{secret}").as_bytes()))
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
impl MediaRelay for CloudinaryRelay {
    fn name(&self) -> &'static str {
        "cloudinary"
    }

    async fn put(&self, path: &str, content_type: &str, bytes: Bytes) -> Result<String, MediaError> {
        check_object_path(path)?;
        let public_id = self.public_id(path);
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("public_id", public_id.as_str()),
            ("timestamp", timestamp.as_str()),
        ]);
        let file_name = path.rsplit('/').next().unwrap_or(path).to_string();
        let size = bytes.len();

        let file = multipart::Part::bytes(bytes.to_vec())
            .file_name(file_name)
            .mime_str(content_type)?;
        let form = multipart::Form::new()
            .part("file", file)
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("public_id", public_id)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;
        let uploaded: UploadResponse = check(response).await?.json().await?;

        tracing::info!("Image uploaded to Cloudinary: {} ({} bytes)", path, size);
        Ok(uploaded.secure_url)
    }

    async fn exists(&self, path: &str) -> Result<bool, MediaError> {
        check_object_path(path)?;
        let response = self
            .client
            .get(format!(
                "{}/{}/resources/image/upload/{}",
                API_HOST,
                self.cloud_name,
                self.public_id(path)
            ))
            .basic_auth(&self.api_key, Some(&self.api_secret))
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
        let public_id = self.public_id(path);
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("public_id", public_id.as_str()),
            ("timestamp", timestamp.as_str()),
        ]);

        let response = self
            .client
            .post(self.endpoint("destroy"))
            .form(&[
                ("public_id", public_id.as_str()),
                ("timestamp", timestamp.as_str()),
                ("api_key", self.api_key.as_str()),
                ("signature", signature.as_str()),
                ("signature_algorithm", "sha256"),
            ])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// `https://res.cloudinary.com/<cloud>/image/upload/v123/<folder>/<path>.png`
    /// yields `<path>` without its extension.
    fn path_from_url(&self, url: &str) -> Option<String> {
        let marker = format!("/{}/image/upload/", self.cloud_name);
        let (_, rest) = url.split_once(&marker)?;
        let rest = match rest.split_once('/') {
            Some((version, tail))
                if version.len() > 1
                    && version.starts_with('v')
                    && version[1..].chars().all(|c| c.is_ascii_digit()) =>
            {
                tail
            }
            _ => rest,
        };
        let public_id = strip_extension(rest);
        let path = if self.folder.is_empty() {
            public_id
        } else {
            public_id.strip_prefix(&format!("{}/", self.folder))?
        };
        check_object_path(path).ok()?;
        Some(path.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay() -> CloudinaryRelay {
        CloudinaryRelay::new("demo", "key", "secret", "blog-images").unwrap()
    }

    #[test]
    fn test_signature_sorts_parameters() {
        let a = sign_params(&[("timestamp", "1"), ("public_id", "x")], "s");
        let b = sign_params(&[("public_id", "x"), ("timestamp", "1")], "s");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_eq!(
            a,
            format!("{:x}", Sha256::digest(b"public_id=x&timestamp=1s"))
        );
    }

    #[test]
    fn test_public_id_and_url_round_trip() {
        let relay = relay();
        assert_eq!(
            relay.public_id("blog_images/2024__a.png"),
            "blog-images/blog_images/2024__a"
        );
        let url = "https://res.cloudinary.com/demo/image/upload/v1712/blog-images/blog_images/2024__a.png";
        let path = relay.path_from_url(url).unwrap();
        assert_eq!(path, "blog_images/2024__a");
        assert_eq!(relay.public_id(&path), "blog-images/blog_images/2024__a");
    }

    #[test]
    fn test_foreign_urls_are_not_owned() {
        let relay = relay();
        assert_eq!(relay.path_from_url("https://cdn.test/a.png"), None);
        assert_eq!(
            relay.path_from_url("https://res.cloudinary.com/demo/image/upload/other/a.png"),
            None
        );
    }

    #[test]
    fn test_strip_extension_only_touches_file_name() {
        assert_eq!(strip_extension("a.b/c"), "a.b/c");
        assert_eq!(strip_extension("dir/.hidden"), "dir/.hidden");
        assert_eq!(strip_extension("dir/x.tar.gz"), "dir/x.tar");
    }
}
