//! Authentication Middleware
//! Mission: Gate protected routes on a verified token and, where required, a role
//!
//! Gates are plain interceptors run in an explicit order by a [`Pipeline`]. Each one
//! either lets the request continue or halts it with a response; the downstream handler
//! only runs when every stage continued.

use crate::auth::{jwt::TokenService, models::Role};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-request identity attached by [`AuthGate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub role: Role,
}

/// Outcome of one interceptor stage
pub enum Flow {
    Continue,
    Halt(Response),
}

pub trait Interceptor: Send + Sync {
    fn intercept(&self, req: &mut Request) -> Flow;
}

/// Ordered list of interceptors; the first halt wins.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Interceptor>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then<I: Interceptor + 'static>(mut self, stage: I) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn run(&self, req: &mut Request) -> Flow {
        for stage in &self.stages {
            if let Flow::Halt(response) = stage.intercept(req) {
                return Flow::Halt(response);
            }
        }
        Flow::Continue
    }
}

/// Axum adapter: `middleware::from_fn_with_state(Arc::new(pipeline), run_pipeline)`
pub async fn run_pipeline(
    State(pipeline): State<Arc<Pipeline>>,
    mut req: Request,
    next: Next,
) -> Response {
    match pipeline.run(&mut req) {
        Flow::Continue => next.run(req).await,
        Flow::Halt(response) => response,
    }
}

/// Verifies the access token in the `Authorization` header.
/// Accepts either the bare token or `Bearer <token>`.
pub struct AuthGate {
    tokens: Arc<TokenService>,
}

impl AuthGate {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }
}

fn bearer_token(req: &Request) -> Option<Result<&str, ()>> {
    let value = req.headers().get(AUTHORIZATION)?;
    let Ok(raw) = value.to_str() else {
        return Some(Err(()));
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let token = raw
        .strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .unwrap_or(raw)
        .trim();
    Some(Ok(token))
}

impl Interceptor for AuthGate {
    fn intercept(&self, req: &mut Request) -> Flow {
        let token = match bearer_token(req) {
            None => {
                warn!(path = %req.uri().path(), "Missing Authorization header");
                return Flow::Halt(GateRejection::MissingToken.into_response());
            }
            Some(Err(())) => {
                warn!(path = %req.uri().path(), "Unreadable Authorization header");
                return Flow::Halt(GateRejection::InvalidToken.into_response());
            }
            Some(Ok(token)) => token,
        };

        let claims = match self.tokens.verify(token) {
            Ok(claims) => claims,
            Err(e) => {
                // Reason is logged only; the client sees one generic rejection.
                warn!(path = %req.uri().path(), reason = %e, "Token rejected");
                return Flow::Halt(GateRejection::InvalidToken.into_response());
            }
        };

        debug!(username = %claims.sub, role = %claims.role, "Request authenticated");
        req.extensions_mut().insert(Identity {
            username: claims.sub,
            role: claims.role,
        });
        Flow::Continue
    }
}

/// Rejects requests whose identity lacks the required role. Must run after [`AuthGate`].
pub struct RoleGuard {
    required: Role,
}

impl RoleGuard {
    pub fn require(required: Role) -> Self {
        Self { required }
    }
}

impl Interceptor for RoleGuard {
    fn intercept(&self, req: &mut Request) -> Flow {
        match req.extensions().get::<Identity>() {
            Some(identity) if identity.role == self.required => Flow::Continue,
            identity => {
                warn!(
                    path = %req.uri().path(),
                    username = identity.map(|i| i.username.as_str()).unwrap_or("-"),
                    required = %self.required,
                    "Insufficient privileges"
                );
                Flow::Halt(GateRejection::InsufficientRole.into_response())
            }
        }
    }
}

/// Extract identity from request (use after the auth gate)
pub fn extract_identity(req: &Request) -> Option<&Identity> {
    req.extensions().get::<Identity>()
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(GateRejection::MissingToken)
    }
}

/// Gate rejection types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    MissingToken,
    InvalidToken,
    InsufficientRole,
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            GateRejection::MissingToken => (StatusCode::UNAUTHORIZED, "authorization required"),
            GateRejection::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid or expired token"),
            GateRejection::InsufficientRole => (StatusCode::FORBIDDEN, "insufficient privileges"),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::TokenType;
    use axum::body::Body;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn tokens() -> Arc<TokenService> {
        Arc::new(TokenService::new(
            b"middleware-secret",
            Duration::from_secs(900),
            Duration::from_secs(3600),
        ))
    }

    fn request(auth: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/books");
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    fn halted_status(flow: Flow) -> Option<StatusCode> {
        match flow {
            Flow::Continue => None,
            Flow::Halt(response) => Some(response.status()),
        }
    }

    #[test]
    fn test_gate_missing_header() {
        let gate = AuthGate::new(tokens());
        let mut req = request(None);

        assert_eq!(halted_status(gate.intercept(&mut req)), Some(StatusCode::UNAUTHORIZED));
        assert!(extract_identity(&req).is_none());

        let mut blank = request(Some("   "));
        assert_eq!(halted_status(gate.intercept(&mut blank)), Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_gate_rejects_bad_tokens_uniformly() {
        let svc = tokens();
        let gate = AuthGate::new(svc.clone());

        let expired = svc
            .issue_at("alice", Role::User, TokenType::Access, Utc::now().timestamp() - 901)
            .unwrap();
        let refresh = svc.issue_refresh("alice", Role::User).unwrap();
        let foreign = TokenService::new(b"other", Duration::from_secs(900), Duration::from_secs(900))
            .issue("alice", Role::Admin)
            .unwrap();

        for bad in ["garbage", expired.as_str(), refresh.as_str(), foreign.as_str()] {
            let mut req = request(Some(bad));
            assert_eq!(
                halted_status(gate.intercept(&mut req)),
                Some(StatusCode::UNAUTHORIZED),
                "{bad}"
            );
            assert!(extract_identity(&req).is_none());
        }
    }

    #[test]
    fn test_gate_attaches_identity() {
        let svc = tokens();
        let gate = AuthGate::new(svc.clone());
        let token = svc.issue("alice", Role::User).unwrap();

        for header in [token.clone(), format!("Bearer {}", token)] {
            let mut req = request(Some(&header));
            assert!(matches!(gate.intercept(&mut req), Flow::Continue));
            assert_eq!(
                extract_identity(&req),
                Some(&Identity {
                    username: "alice".to_string(),
                    role: Role::User,
                })
            );
        }
    }

    #[test]
    fn test_role_guard() {
        let guard = RoleGuard::require(Role::Admin);

        let mut anonymous = request(None);
        assert_eq!(halted_status(guard.intercept(&mut anonymous)), Some(StatusCode::FORBIDDEN));

        let mut user = request(None);
        user.extensions_mut().insert(Identity {
            username: "u".to_string(),
            role: Role::User,
        });
        assert_eq!(halted_status(guard.intercept(&mut user)), Some(StatusCode::FORBIDDEN));

        let mut admin = request(None);
        admin.extensions_mut().insert(Identity {
            username: "a".to_string(),
            role: Role::Admin,
        });
        assert!(matches!(guard.intercept(&mut admin), Flow::Continue));
    }

    struct Counting(Arc<AtomicUsize>);

    impl Interceptor for Counting {
        fn intercept(&self, _req: &mut Request) -> Flow {
            self.0.fetch_add(1, Ordering::SeqCst);
            Flow::Continue
        }
    }

    #[test]
    fn test_pipeline_stops_at_first_halt() {
        let after = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new()
            .then(AuthGate::new(tokens()))
            .then(Counting(after.clone()));
        assert_eq!(pipeline.len(), 2);

        let mut req = request(None);
        assert!(matches!(pipeline.run(&mut req), Flow::Halt(_)));
        assert_eq!(after.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_pipeline_order_matters() {
        let svc = tokens();
        let token = svc.issue("root", Role::Admin).unwrap();

        let gate_first = Pipeline::new()
            .then(AuthGate::new(svc.clone()))
            .then(RoleGuard::require(Role::Admin));
        let mut req = request(Some(&token));
        assert!(matches!(gate_first.run(&mut req), Flow::Continue));

        // Guard ahead of the gate has no identity to inspect yet
        let guard_first = Pipeline::new()
            .then(RoleGuard::require(Role::Admin))
            .then(AuthGate::new(svc));
        let mut req = request(Some(&token));
        assert!(matches!(guard_first.run(&mut req), Flow::Halt(_)));
    }

    #[test]
    fn test_rejection_responses() {
        assert_eq!(
            GateRejection::MissingToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GateRejection::InvalidToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GateRejection::InsufficientRole.into_response().status(),
            StatusCode::FORBIDDEN
        );
    }
}
