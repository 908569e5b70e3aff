/**
 * Contact Routes
 * Public form submission and admin inbox
 */
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::{non_blank, path_id, ItemResponse, ListResponse};
use crate::auth::AdminUser;
use crate::db::models::Contact;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub message: Option<String>,
}

impl ContactRequest {
    /// Every field is mandatory.
    fn into_contact(self) -> Option<Contact> {
        Some(Contact {
            id: Uuid::new_v4(),
            first_name: non_blank(self.first_name)?,
            last_name: non_blank(self.last_name)?,
            phone_number: non_blank(self.phone_number)?,
            email: non_blank(self.email)?,
            address: non_blank(self.address)?,
            message: ammonia::clean(&non_blank(self.message)?),
            created_at: Utc::now(),
        })
    }
}

/// POST /api/contact/submit
pub async fn submit(
    State(state): State<AppState>,
    Json(payload): Json<ContactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let contact = payload
        .into_contact()
        .ok_or_else(|| ApiError::bad_request("All fields are required"))?;
    let contact = state.store.insert_contact(&contact).await?;
    tracing::info!("Contact submission received: {}", contact.id);
    Ok((
        StatusCode::CREATED,
        Json(ItemResponse::new("Contact form submitted successfully", contact)),
    ))
}

/// GET /api/contact/all
pub async fn list(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(ListResponse::new(state.store.list_contacts().await?)))
}

/// DELETE /api/contact/{id}
pub async fn delete(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = path_id(&id, "contact")?;
    state.store.delete_contact(id).await.map_err(|e| match e {
        StoreError::NotFound { .. } => {
            ApiError::not_found("Contact submission not found")
        }
        other => other.into(),
    })?;
    Ok(Json(ItemResponse::message(
        "Contact submission deleted successfully",
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_requires_every_field() {
        let complete = ContactRequest {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            phone_number: Some("555".to_string()),
            email: Some("ada@example.com".to_string()),
            address: Some("London".to_string()),
            message: Some("Hello".to_string()),
        };
        assert!(complete.into_contact().is_some());

        let blank_message = ContactRequest {
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            phone_number: Some("555".to_string()),
            email: Some("ada@example.com".to_string()),
            address: Some("London".to_string()),
            message: Some("   ".to_string()),
        };
        assert!(blank_message.into_contact().is_none());
    }
}
