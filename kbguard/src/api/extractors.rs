use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::request::Parts;

use crate::error::KbError;
use crate::models::UserIdentity;

/// Header carrying the end user on whose behalf a request runs.
pub const USER_HEADER: &str = "x-kbguard-user";

#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(KbError))]
pub struct AppJson<T>(pub T);

impl From<JsonRejection> for KbError {
    fn from(rejection: JsonRejection) -> Self {
        map_json_rejection(rejection)
    }
}

/// The calling user taken from [`USER_HEADER`]. Missing or blank values
/// are rejected before any directory lookup happens.
#[derive(Debug, Clone)]
pub struct RequestUser(pub UserIdentity);

impl<S> FromRequestParts<S> for RequestUser
where
    S: Send + Sync,
{
    type Rejection = KbError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| KbError::Validation(format!("Missing {USER_HEADER} header")))?
            .to_str()
            .map_err(|_| KbError::Validation(format!("Invalid {USER_HEADER} header")))?;

        UserIdentity::new(raw).map(RequestUser)
    }
}

fn map_json_rejection(rejection: JsonRejection) -> KbError {
    match rejection {
        JsonRejection::JsonDataError(err) => {
            let message = err.body_text();
            if let Some(field) = extract_missing_field(&message) {
                KbError::Validation(format!("Missing required field: {field}"))
            } else {
                KbError::Validation(format!("Invalid JSON: {message}"))
            }
        }
        JsonRejection::JsonSyntaxError(err) => {
            KbError::Validation(format!("JSON syntax error: {err}"))
        }
        JsonRejection::MissingJsonContentType(_) => {
            KbError::Validation("Missing `Content-Type: application/json` header".to_string())
        }
        JsonRejection::BytesRejection(_) => {
            KbError::Internal("Failed to read request body".to_string())
        }
        _ => KbError::Validation(rejection.to_string()),
    }
}

fn extract_missing_field(message: &str) -> Option<&str> {
    let prefix = "missing field `";
    let start = message.find(prefix)? + prefix.len();
    let remaining = message.get(start..)?;
    let end = remaining.find('`')?;
    remaining.get(..end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(header: Option<&str>) -> Result<RequestUser, KbError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(USER_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        RequestUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_user_header_extracted_and_trimmed() {
        let RequestUser(user) = extract(Some("  alice ")).await.unwrap();
        assert_eq!(user.as_str(), "alice");
    }

    #[tokio::test]
    async fn test_missing_or_blank_user_rejected() {
        assert!(matches!(extract(None).await, Err(KbError::Validation(_))));
        assert!(matches!(extract(Some("   ")).await, Err(KbError::Validation(_))));
    }

    #[test]
    fn test_extract_missing_field() {
        assert_eq!(
            extract_missing_field("Failed: missing field `query` at line 1"),
            Some("query")
        );
        assert_eq!(extract_missing_field("something else"), None);
    }
}
