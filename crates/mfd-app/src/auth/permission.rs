use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use axum::{
    extract::Request,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use mfd_types::claim::{Authorization as _, Permission, UserClaim};
use tower::{Layer, Service};
use tower_sessions::Session;
use tracing::debug;

use super::SESSION_USER_KEY;

/// Guards the wrapped routes with a capability check: 401 without a logged in
/// user, 403 when the user lacks the permission. The inner service is not
/// called in either case, so gated writes cannot mutate anything.
#[derive(Clone)]
pub struct RequiredPermissionLayer {
    permission: Permission,
}

impl RequiredPermissionLayer {
    pub fn new(permission: Permission) -> Self {
        Self { permission }
    }
}

impl<S> Layer<S> for RequiredPermissionLayer {
    type Service = RequiredPermission<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequiredPermission {
            inner,
            permission: self.permission,
        }
    }
}

#[derive(Clone)]
pub struct RequiredPermission<S> {
    inner: S,
    permission: Permission,
}

impl<S> Service<Request> for RequiredPermission<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let permission = self.permission;
        // the original service must be the polled one
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move {
            let session = req.extensions().get::<Session>().cloned();
            let claim = match session {
                Some(session) => session
                    .get::<UserClaim>(SESSION_USER_KEY)
                    .await
                    .unwrap_or_default(),
                None => None,
            };
            match claim {
                None => {
                    debug!("Rejecting anonymous request requiring {permission}");
                    Ok(StatusCode::UNAUTHORIZED.into_response())
                }
                Some(claim) if !claim.has_permission(permission) => {
                    debug!(
                        "User {} is missing permission {permission}",
                        claim.username
                    );
                    Ok(StatusCode::FORBIDDEN.into_response())
                }
                Some(_) => inner.call(req).await,
            }
        })
    }
}
