//! services/api/src/web/middleware.rs
//!
//! Identity middleware for protecting routes.
//!
//! Authentication happens at the gateway in front of this service, which forwards
//! the caller's identity as `x-member-id` and `x-member-role` headers.

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use club_schedule_core::{Actor, Role};
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;

pub const MEMBER_ID_HEADER: &str = "x-member-id";
pub const MEMBER_ROLE_HEADER: &str = "x-member-role";

/// Reads the caller's identity from the forwarded headers.
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let member_id = headers
        .get(MEMBER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthenticated(format!("{} header is required", MEMBER_ID_HEADER)))?;
    let member_id = Uuid::parse_str(member_id.trim())
        .map_err(|_| ApiError::Unauthenticated(format!("invalid {} format", MEMBER_ID_HEADER)))?;

    let role = match headers.get(MEMBER_ROLE_HEADER).map(|v| v.to_str()) {
        None => Role::Member,
        Some(Ok(raw)) if raw.trim().eq_ignore_ascii_case("member") => Role::Member,
        Some(Ok(raw)) if raw.trim().eq_ignore_ascii_case("admin") => Role::Admin,
        Some(_) => {
            return Err(ApiError::Unauthenticated(format!(
                "invalid {} value",
                MEMBER_ROLE_HEADER
            )))
        }
    };

    Ok(Actor { member_id, role })
}

/// Middleware that resolves the caller and inserts the `Actor` into request extensions.
///
/// Missing or malformed identity yields 401 Unauthorized.
pub async fn require_identity(mut req: Request, next: Next) -> Response {
    match actor_from_headers(req.headers()) {
        Ok(actor) => {
            req.extensions_mut().insert(actor);
            next.run(req).await
        }
        Err(e) => {
            warn!("Rejected request without a valid identity: {}", e);
            e.into_response()
        }
    }
}

/// Middleware for admin-only routes. Must run after `require_identity`.
pub async fn require_admin(req: Request, next: Next) -> Response {
    match req.extensions().get::<Actor>() {
        Some(actor) if actor.is_admin() => next.run(req).await,
        Some(actor) => {
            warn!(member_id = %actor.member_id, "Non-admin attempted an admin route");
            ApiError::Forbidden("this action requires the admin role".to_string()).into_response()
        }
        None => ApiError::Unauthenticated("no identity on request".to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    #[test]
    fn member_is_the_default_role() {
        let id = Uuid::new_v4();
        let actor = actor_from_headers(&headers(&[(MEMBER_ID_HEADER, &id.to_string())])).unwrap();
        assert_eq!(actor, Actor::member(id));
    }

    #[test]
    fn admin_role_is_case_insensitive() {
        let id = Uuid::new_v4();
        let actor = actor_from_headers(&headers(&[
            (MEMBER_ID_HEADER, &id.to_string()),
            (MEMBER_ROLE_HEADER, "Admin"),
        ]))
        .unwrap();
        assert!(actor.is_admin());
    }

    #[test]
    fn missing_or_malformed_identity_is_rejected() {
        assert!(matches!(
            actor_from_headers(&HeaderMap::new()),
            Err(ApiError::Unauthenticated(_))
        ));
        assert!(matches!(
            actor_from_headers(&headers(&[(MEMBER_ID_HEADER, "not-a-uuid")])),
            Err(ApiError::Unauthenticated(_))
        ));
        assert!(matches!(
            actor_from_headers(&headers(&[
                (MEMBER_ID_HEADER, &Uuid::new_v4().to_string()),
                (MEMBER_ROLE_HEADER, "coach"),
            ])),
            Err(ApiError::Unauthenticated(_))
        ));
    }
}
