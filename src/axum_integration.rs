//! Axum integration: one container scope per request.
//!
//! [`RequestScopeLayer`] opens a [`Scope`] for every request, stores it in the
//! request extensions, makes it the ambient scope seen by
//! [`RequestContext::current`] for the whole handler task and disposes it once
//! the response is produced. Handlers take it with the [`DiScope`] extractor.

use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};

use crate::accessor::RequestContext;
use crate::provider::{Scope, ServiceProvider};

/// Tower layer opening a container scope per request.
#[derive(Clone)]
pub struct RequestScopeLayer {
    provider: ServiceProvider,
}

impl RequestScopeLayer {
    pub fn new(provider: ServiceProvider) -> Self {
        Self { provider }
    }
}

impl<S> tower::Layer<S> for RequestScopeLayer {
    type Service = RequestScopeService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestScopeService {
            inner,
            provider: self.provider.clone(),
        }
    }
}

/// Service produced by [`RequestScopeLayer`].
#[derive(Clone)]
pub struct RequestScopeService<S> {
    inner: S,
    provider: ServiceProvider,
}

impl<S, B> tower::Service<Request<B>> for RequestScopeService<S>
where
    S: tower::Service<Request<B>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<B>) -> Self::Future {
        // The clone may not be ready; keep the one poll_ready was called on.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let scope = Arc::new(self.provider.create_scope());
        req.extensions_mut().insert(scope.clone());

        Box::pin(async move {
            tracing::trace!(method = %req.method(), uri = %req.uri(), "request scope opened");
            // Call inside the task scope so work done eagerly by `call` sees it too.
            let response = RequestContext::scope(scope.clone(), async move { inner.call(req).await }).await;
            scope.dispose_all().await;
            tracing::trace!("request scope disposed");
            response
        })
    }
}

/// Extractor for the request's container scope.
///
/// Uses the scope opened by [`RequestScopeLayer`]. Without the layer, falls
/// back to a fresh scope from an `Arc<ServiceProvider>` request extension.
pub struct DiScope {
    scope: Arc<Scope>,
}

impl DiScope {
    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }
}

impl Deref for DiScope {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        &self.scope
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for DiScope
where
    S: Send + Sync,
{
    type Rejection = DiRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(scope) = parts.extensions.get::<Arc<Scope>>() {
            return Ok(DiScope {
                scope: scope.clone(),
            });
        }

        let provider = parts.extensions.get::<Arc<ServiceProvider>>().ok_or_else(|| {
            DiRejection::Configuration(
                "No request scope found in extensions. Add RequestScopeLayer or use create_app_with_di()"
                    .to_string(),
            )
        })?;

        Ok(DiScope {
            scope: Arc::new(provider.create_scope()),
        })
    }
}

/// Rejection returned when no scope can be extracted.
#[derive(Debug)]
pub enum DiRejection {
    Configuration(String),
}

impl IntoResponse for DiRejection {
    fn into_response(self) -> Response {
        match self {
            DiRejection::Configuration(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg).into_response(),
        }
    }
}

/// Builds a router from `configure` and wraps it in a [`RequestScopeLayer`].
///
/// ```rust,no_run
/// use axum::routing::get;
/// use ferrous_intercept::axum_integration::{create_app_with_di, DiScope};
/// use ferrous_intercept::{Resolver, ServiceCollection};
///
/// async fn handler(scope: DiScope) -> String {
///     scope.get_required::<String>().to_string()
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped_factory::<String, _>(|_| "hello".to_string());
///
/// let app = create_app_with_di(services.build(), |router| router.route("/", get(handler)));
/// ```
pub fn create_app_with_di<F>(provider: ServiceProvider, configure: F) -> Router
where
    F: FnOnce(Router) -> Router,
{
    configure(Router::new()).layer(RequestScopeLayer::new(provider))
}
