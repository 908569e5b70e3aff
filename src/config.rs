//! Application configuration, read once from the environment at startup.

use chrono::Duration;
use std::{env, path::PathBuf, str::FromStr};

use crate::db::DbConfig;

pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";

/// Which object store uploaded media is relayed to
#[derive(Debug, Clone)]
pub enum MediaBackend {
    /// Files written under `dir` and served by this process under `public_prefix`.
    Local { dir: PathBuf, public_prefix: String },
    Gcs {
        bucket: String,
        /// Base64-encoded service-account JSON key.
        service_account_key: String,
    },
    Cloudinary {
        cloud_name: String,
        api_key: String,
        api_secret: String,
        folder: String,
    },
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub max_file_size: usize,
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: 5 * 1024 * 1024,
            allowed_mime_types: ["image/jpeg", "image/png", "image/gif", "image/webp"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl UploadConfig {
    pub fn is_allowed(&self, mime: &str) -> bool {
        self.allowed_mime_types.iter().any(|m| m == mime)
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            token_ttl: Duration::hours(24),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    /// `None` runs against the in-memory store.
    pub database: Option<DbConfig>,
    pub auth: AuthConfig,
    pub allowed_origins: Vec<String>,
    pub upload: UploadConfig,
    pub media: MediaBackend,
    pub cleanup_max_attempts: u32,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let database = env::var("DATABASE_URL").ok().map(|_| DbConfig::default());

        let token_ttl = env::var("JWT_EXPIRES_IN")
            .ok()
            .and_then(|s| {
                let parsed = parse_duration(&s);
                if parsed.is_none() {
                    tracing::warn!("Ignoring unparseable JWT_EXPIRES_IN value '{}'", s);
                }
                parsed
            })
            .unwrap_or_else(|| Duration::hours(24));

        let auth = AuthConfig {
            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| DEFAULT_JWT_SECRET.to_string()),
            token_ttl,
        };

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .ok()
            .or_else(|| env::var("FRONTEND_ORIGIN").ok())
            .map(|s| split_list(&s))
            .unwrap_or_default();

        let mut upload = UploadConfig::default();
        upload.max_file_size = parse_var("MAX_FILE_SIZE", upload.max_file_size);
        if let Ok(types) = env::var("ALLOWED_FILE_TYPES") {
            let types = split_list(&types);
            if !types.is_empty() {
                upload.allowed_mime_types = types;
            }
        }

        Self {
            environment,
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 5000),
            database,
            auth,
            allowed_origins,
            upload,
            media: media_backend_from_env(),
            cleanup_max_attempts: parse_var("CLEANUP_MAX_ATTEMPTS", 5),
        }
    }

    /// In-memory development settings with a fast cleanup retry budget.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            environment: "test".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            database: None,
            auth: AuthConfig::default(),
            allowed_origins: Vec::new(),
            upload: UploadConfig::default(),
            media: MediaBackend::Local {
                dir: env::temp_dir().join("cms-backend-test-uploads"),
                public_prefix: "/uploads".to_string(),
            },
            cleanup_max_attempts: 1,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Refuse configurations that must never reach production.
    pub fn validate(&self) -> Result<(), String> {
        if self.is_production() {
            if self.auth.jwt_secret.is_empty() || self.auth.jwt_secret == DEFAULT_JWT_SECRET {
                return Err("JWT_SECRET must be set to a secure, unique value in production".into());
            }
            if self.database.is_none() {
                return Err("DATABASE_URL must be set in production".into());
            }
        }
        Ok(())
    }
}

fn media_backend_from_env() -> MediaBackend {
    let kind = env::var("MEDIA_BACKEND").unwrap_or_else(|_| "local".to_string());
    match kind.to_lowercase().as_str() {
        "gcs" => MediaBackend::Gcs {
            bucket: env::var("GCP_BUCKET_NAME").unwrap_or_default(),
            service_account_key: env::var("GCP_SERVICE_ACCOUNT_KEY").unwrap_or_default(),
        },
        "cloudinary" => MediaBackend::Cloudinary {
            cloud_name: env::var("CLOUDINARY_CLOUD_NAME").unwrap_or_default(),
            api_key: env::var("CLOUDINARY_API_KEY").unwrap_or_default(),
            api_secret: env::var("CLOUDINARY_API_SECRET").unwrap_or_default(),
            folder: env::var("CLOUDINARY_FOLDER").unwrap_or_else(|_| "blog-images".to_string()),
        },
        other => {
            if other != "local" {
                tracing::warn!("Unknown MEDIA_BACKEND '{}', falling back to local storage", other);
            }
            MediaBackend::Local {
                dir: PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string())),
                public_prefix: env::var("PUBLIC_UPLOAD_PREFIX")
                    .unwrap_or_else(|_| "/uploads".to_string()),
            }
        }
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {} value '{}', using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse durations such as `90s`, `30m`, `24h` or `7d`. A bare number is seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let value: i64 = digits.parse().ok()?;
    match unit {
        "" | "s" => Some(Duration::seconds(value)),
        "m" => Some(Duration::minutes(value)),
        "h" => Some(Duration::hours(value)),
        "d" => Some(Duration::days(value)),
        _ => None,
    }
}
