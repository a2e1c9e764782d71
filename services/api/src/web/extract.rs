//! services/api/src/web/extract.rs
//!
//! Request extractors whose rejections use the service's JSON error body.

use axum::extract::{
    rejection::{JsonRejection, PathRejection, QueryRejection},
    FromRequest, FromRequestParts,
};

use crate::error::ApiError;

/// `axum::Json` with rejections reported as `ApiError::BadRequest`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// `axum::extract::Query` with rejections reported as `ApiError::BadRequest`.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

/// `axum::extract::Path` with rejections reported as `ApiError::BadRequest`.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header::CONTENT_TYPE, Request, StatusCode},
        response::IntoResponse,
    };
    use serde::Deserialize;
    use serde_json::Value;

    #[derive(Debug, Deserialize)]
    struct Window {
        days: Option<u32>,
    }

    #[derive(Debug, Deserialize)]
    struct SlotPayload {
        #[allow(dead_code)]
        slot_id: uuid::Uuid,
    }

    async fn json_error(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn bad_query_strings_get_a_json_error() {
        for uri in ["/me/calendar?days=abc", "/me/calendar?days=-3"] {
            let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
            let err = AppQuery::<Window>::from_request_parts(&mut parts, &())
                .await
                .unwrap_err();
            let (status, body) = json_error(err).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "validation_error");
        }

        let (mut parts, _) = Request::builder()
            .uri("/me/calendar?days=7")
            .body(())
            .unwrap()
            .into_parts();
        let AppQuery(window) = AppQuery::<Window>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(window.days, Some(7));
    }

    #[tokio::test]
    async fn bad_bodies_get_a_json_error() {
        let request = Request::builder()
            .method("POST")
            .uri("/absences")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let err = AppJson::<SlotPayload>::from_request(request, &()).await.unwrap_err();
        let (status, body) = json_error(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation_error");
        assert!(body["message"].as_str().unwrap().contains("slot_id"));

        let request = Request::builder()
            .method("POST")
            .uri("/absences")
            .body(Body::from("{}"))
            .unwrap();
        let err = AppJson::<SlotPayload>::from_request(request, &()).await.unwrap_err();
        let (status, _) = json_error(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
