use axum::extract::Multipart;
use bytes::Bytes;
use std::collections::HashMap;

use crate::config::UploadConfig;
use crate::error::ApiError;
use crate::media::{validate_upload, Upload};

/// A file part as received, not yet validated
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub bytes: Bytes,
}

impl FilePart {
    pub fn validate(&self, config: &UploadConfig) -> Result<Upload, ApiError> {
        Ok(validate_upload(config, &self.file_name, self.bytes.clone())?)
    }
}

/// A fully buffered multipart body: text fields by name plus file parts in
/// arrival order.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: Vec<FilePart>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            tracing::warn!("Multipart error: {}", e);
            ApiError::bad_request("Invalid multipart data")
        })? {
            let name = field.name().unwrap_or_default().to_string();
            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field.bytes().await.map_err(|e| {
                        tracing::warn!("Failed to read upload bytes: {}", e);
                        ApiError::bad_request("Failed to read file data")
                    })?;
                    // Browsers send an empty part for an untouched file input.
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.files.push(FilePart {
                        field: name,
                        file_name,
                        bytes,
                    });
                }
                None => {
                    let text = field.text().await.map_err(|e| {
                        tracing::warn!("Failed to read form field {}: {}", name, e);
                        ApiError::bad_request("Invalid multipart data")
                    })?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    #[cfg(test)]
    pub fn from_parts(fields: &[(&str, &str)], files: Vec<FilePart>) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            files,
        }
    }

    /// A text field, `None` when absent or blank.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// Files sent under `name` or `name[]`, in arrival order.
    pub fn files(&self, name: &str) -> Vec<&FilePart> {
        let bracketed = format!("{name}[]");
        self.files
            .iter()
            .filter(|f| f.field == name || f.field == bracketed)
            .collect()
    }

    pub fn file(&self, name: &str) -> Option<&FilePart> {
        self.files(name).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_treats_blank_as_missing() {
        let form = MultipartForm::from_parts(&[("title", "  "), ("slug", "x")], vec![]);
        assert_eq!(form.text("title"), None);
        assert_eq!(form.text("slug"), Some("x"));
        assert_eq!(form.text("absent"), None);
    }

    #[test]
    fn test_files_accepts_bracketed_names() {
        let part = |field: &str, name: &str| FilePart {
            field: field.to_string(),
            file_name: name.to_string(),
            bytes: Bytes::from_static(b"x"),
        };
        let form = MultipartForm::from_parts(
            &[],
            vec![
                part("section_images", "a.png"),
                part("mainImage", "m.png"),
                part("section_images[]", "b.png"),
            ],
        );
        let names: Vec<&str> = form
            .files("section_images")
            .iter()
            .map(|f| f.file_name.as_str())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
        assert_eq!(form.file("mainImage").unwrap().file_name, "m.png");
    }
}
