//! Per-request context: trace id and the caller's session.

use crate::api::response::{ApiError, ResponseDetails};

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::convert::Infallible;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const HOUSEHOLD_ID_HEADER: &str = "x-household-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: String,
    pub active_household_id: Option<String>,
}

/// Extracted for every handler. Never rejects; handlers that need a session
/// call [`RequestContext::session`] so the 401 carries the trace id.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub trace_id: String,
    pub session: Option<SessionContext>,
}

impl RequestContext {
    pub fn new(session: Option<SessionContext>) -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().simple().to_string(),
            session,
        }
    }

    pub fn details(&self) -> ResponseDetails {
        ResponseDetails {
            trace_id: self.trace_id.clone(),
            current_household_id: self
                .session
                .as_ref()
                .and_then(|session| session.active_household_id.clone()),
        }
    }

    pub fn session(&self) -> Result<&SessionContext, ApiError> {
        self.session.as_ref().ok_or_else(|| {
            tracing::debug!(trace_id = %self.trace_id, "request has no session context");
            ApiError::unauthenticated(self.details())
        })
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = header_value(parts, USER_ID_HEADER).map(|user_id| SessionContext {
            user_id,
            active_household_id: header_value(parts, HOUSEHOLD_ID_HEADER),
        });

        Ok(Self::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};

    async fn extract(request: Request<()>) -> RequestContext {
        let (mut parts, ()) = request.into_parts();
        let Ok(context) = RequestContext::from_request_parts(&mut parts, &()).await;
        context
    }

    #[tokio::test]
    async fn reads_user_and_household_headers() {
        let request = Request::builder()
            .header(USER_ID_HEADER, "user-1")
            .header(HOUSEHOLD_ID_HEADER, "household-1")
            .body(())
            .expect("request");

        let context = extract(request).await;
        let session = context.session().expect("session");
        assert_eq!(session.user_id, "user-1");
        assert_eq!(
            context.details().current_household_id.as_deref(),
            Some("household-1")
        );
        assert_eq!(context.trace_id.len(), 32);
    }

    #[tokio::test]
    async fn missing_user_is_unauthenticated() {
        let request = Request::builder()
            .header(USER_ID_HEADER, "  ")
            .body(())
            .expect("request");

        let context = extract(request).await;
        let error = context.session().unwrap_err();
        assert_eq!(error.status, StatusCode::UNAUTHORIZED);
        assert_eq!(error.body.details.trace_id, context.trace_id);
    }
}
