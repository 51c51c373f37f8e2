//! Progress API route handlers.
//!
//! The caller's identity comes from the `x-user-id` header. Requests
//! without it are anonymous: init returns empty progress and saves are
//! acknowledged without being stored.

use alchemy_core::{InitResponse, SaveRequest, SaveResponse};
use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue},
    Json,
};

use crate::error::ApiError;
use crate::metrics;
use crate::store::SaveOutcome;
use crate::validation::validate_user_id;
use crate::AppState;

/// Header carrying the user identity.
pub const USER_HEADER: &str = "x-user-id";

/// Extract and validate the user id. `None` means anonymous.
///
/// # Errors
///
/// Returns [`ApiError::UnreadableUser`] for a non-text header and
/// [`ApiError::InvalidUser`] for an id that fails validation.
pub fn user_id(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(value) = headers.get(USER_HEADER).map(HeaderValue::to_str) else {
        return Ok(None);
    };
    let value = value.map_err(|_| ApiError::UnreadableUser)?.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if let Err(e) = validate_user_id(value) {
        metrics::record_validation_failure(e.kind());
        return Err(e.into());
    }
    Ok(Some(value.to_string()))
}

/// `GET /api/init` - the caller's saved progress.
///
/// # Errors
///
/// Returns an error if the user id header is invalid.
#[tracing::instrument(name = "get_init", skip(state, headers))]
pub async fn get_init(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<InitResponse>, ApiError> {
    let Some(user) = user_id(&headers)? else {
        metrics::record_load(true);
        tracing::debug!("Anonymous init");
        return Ok(Json(InitResponse::default()));
    };

    metrics::record_load(false);
    let progress = state.store.load(&user);
    metrics::set_records(state.store.len());
    tracing::info!(
        "Init for {user}: {} discovered, {} tokens",
        progress.discovered.len(),
        progress.elements.len()
    );
    Ok(Json(progress.into_init(Some(user))))
}

/// `POST /api/progress` - replace the caller's saved progress.
///
/// Oversized records are acknowledged but not stored.
///
/// # Errors
///
/// Returns an error if the user id header is invalid or storage fails.
#[tracing::instrument(name = "save_progress", skip_all)]
pub async fn save_progress(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SaveRequest>,
) -> Result<Json<SaveResponse>, ApiError> {
    let Some(user) = user_id(&headers)? else {
        metrics::record_save("anonymous", None);
        tracing::debug!("Anonymous save acknowledged, not stored");
        return Ok(Json(SaveResponse { success: true }));
    };

    tracing::debug!(
        "Save for {user}: {} discovered, {} tokens",
        request.discovered_names.len(),
        request.table_tokens.len()
    );
    match state.store.save(&user, request.into()) {
        Ok(SaveOutcome::Stored { size }) => {
            metrics::record_save("stored", Some(size));
            metrics::set_records(state.store.len());
        }
        Ok(SaveOutcome::TooLarge { size }) => {
            metrics::record_save("too_large", Some(size));
        }
        Err(e) => {
            metrics::record_save("failed", None);
            return Err(e.into());
        }
    }
    Ok(Json(SaveResponse { success: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ValidationError;

    fn headers(user: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, HeaderValue::from_str(user).expect("header value"));
        headers
    }

    #[test]
    fn test_user_id_extraction() {
        assert_eq!(user_id(&HeaderMap::new()).expect("anonymous"), None);
        assert_eq!(user_id(&headers("  ")).expect("blank"), None);
        assert_eq!(
            user_id(&headers("t2_ash")).expect("valid"),
            Some("t2_ash".to_string())
        );
        assert!(matches!(
            user_id(&headers("ash/../x")),
            Err(ApiError::InvalidUser(ValidationError::UserIdInvalidChars))
        ));
    }

    #[test]
    fn test_non_text_header_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_HEADER,
            HeaderValue::from_bytes(&[0xff, 0xfe]).expect("opaque header value"),
        );
        assert!(matches!(user_id(&headers), Err(ApiError::UnreadableUser)));
    }
}
