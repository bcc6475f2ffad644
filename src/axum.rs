//! Axum integration utilities.

use std::future::poll_fn;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use crate::engine::{Decision, Engine};
use crate::types::{Action, Credential, GatewayId, PrincipalId};

use ::axum::body::Body;
use ::axum::http::{Request, StatusCode};
use ::axum::response::{IntoResponse, Response};
use ::tower::{Layer, Service};
use tracing::warn;

/// Authorization context extracted from a request.
#[derive(Debug, Clone)]
pub struct AuthzContext {
    /// Gateway the request targets.
    pub gateway: GatewayId,
    /// Principal the caller claims to be.
    pub principal: PrincipalId,
    /// Credential presented by the caller.
    pub credential: Credential,
}

impl AuthzContext {
    pub(crate) fn new(gateway: GatewayId, principal: PrincipalId, credential: Credential) -> Self {
        Self {
            gateway,
            principal,
            credential,
        }
    }
}

/// Middleware layer that authorizes a request using [`Engine`].
#[derive(Debug, Clone)]
pub struct AuthorizeLayer<B, C> {
    engine: Arc<Engine<B, C>>,
    action: Action,
}

impl<B, C> AuthorizeLayer<B, C> {
    /// Creates a new authorization layer guarding one action.
    pub fn new(engine: Arc<Engine<B, C>>, action: Action) -> Self {
        Self { engine, action }
    }
}

impl<B, C, Inner> Layer<Inner> for AuthorizeLayer<B, C>
where
    B: crate::backend::IdentityBackend,
    C: crate::cache::DecisionCache,
{
    type Service = AuthorizeService<Inner, B, C>;

    fn layer(&self, inner: Inner) -> Self::Service {
        AuthorizeService {
            inner,
            engine: self.engine.clone(),
            action: self.action.clone(),
        }
    }
}

/// Middleware service that enforces authorization decisions.
#[derive(Debug, Clone)]
pub struct AuthorizeService<Inner, B, C> {
    inner: Inner,
    engine: Arc<Engine<B, C>>,
    action: Action,
}

impl<Inner, B, C> Service<Request<Body>> for AuthorizeService<Inner, B, C>
where
    Inner: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    Inner::Future: Send + 'static,
    B: crate::backend::IdentityBackend + 'static,
    C: crate::cache::DecisionCache + 'static,
{
    type Response = Response;
    type Error = Inner::Error;
    type Future = Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let mut inner = self.inner.clone();
        let engine = self.engine.clone();
        let action = self.action.clone();

        Box::pin(async move {
            let context = req.extensions().get::<AuthzContext>().cloned();
            let Some(context) = context else {
                return Ok(
                    (StatusCode::UNAUTHORIZED, "missing authorization context").into_response()
                );
            };

            match engine
                .is_authorized(
                    context.principal,
                    context.gateway,
                    context.credential,
                    action,
                )
                .await
            {
                Ok(Decision::Allow) => {
                    poll_fn(|cx| inner.poll_ready(cx)).await?;
                    inner.call(req).await
                }
                Ok(Decision::Deny) => Ok((StatusCode::FORBIDDEN, "forbidden").into_response()),
                Err(err) => {
                    warn!(error = %err, "authorization check failed");
                    Ok((StatusCode::INTERNAL_SERVER_ERROR, "authorization error").into_response())
                }
            }
        })
    }
}

#[cfg(feature = "axum-jwt")]
pub mod jwt {
    use std::fmt;
    use std::future::poll_fn;
    use std::marker::PhantomData;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};

    use jsonwebtoken::{DecodingKey, Validation, decode};
    use serde::de::DeserializeOwned;
    use thiserror::Error;

    use crate::axum::AuthzContext;
    use crate::types::{Credential, GatewayId, PrincipalId};

    use ::axum::body::Body;
    use ::axum::extract::FromRequestParts;
    use ::axum::http::header::AUTHORIZATION;
    use ::axum::http::request::Parts;
    use ::axum::http::{HeaderMap, Request, StatusCode};
    use ::axum::response::{IntoResponse, Response};
    use ::tower::{Layer, Service};

    /// Errors returned by JWT auth helpers.
    #[derive(Debug, Error)]
    pub enum AuthError {
        /// Authorization header is missing.
        #[error("missing authorization header")]
        MissingAuthorization,
        /// Authorization header format is invalid.
        #[error("invalid authorization header")]
        InvalidAuthorization,
        /// JWT validation error.
        #[error("invalid token")]
        InvalidToken,
        /// Required claims are missing or invalid.
        #[error("invalid claims: {0}")]
        InvalidClaims(String),
        /// Invalid identifier.
        #[error("invalid id: {0}")]
        InvalidId(String),
        /// Credential failed validation.
        #[error("invalid credential: {0}")]
        InvalidCredential(String),
    }

    /// Rejection type for axum extractors.
    #[derive(Debug)]
    pub struct AuthRejection {
        status: StatusCode,
        message: String,
    }

    impl From<AuthError> for AuthRejection {
        fn from(err: AuthError) -> Self {
            let status = StatusCode::UNAUTHORIZED;
            Self {
                status,
                message: err.to_string(),
            }
        }
    }

    impl IntoResponse for AuthRejection {
        fn into_response(self) -> Response {
            (self.status, self.message).into_response()
        }
    }

    /// Claims type used to extract gateway/principal identifiers from JWTs.
    pub trait JwtClaims: DeserializeOwned + Send + Sync + Clone + 'static {
        /// Returns the gateway identifier string.
        fn gateway_id(&self) -> &str;
        /// Returns the principal identifier string.
        fn principal_id(&self) -> &str;
    }

    /// Default JWT claims shape: `{ gateway_id, preferred_username }`.
    #[derive(Debug, Clone, serde::Deserialize)]
    pub struct DefaultClaims {
        /// Gateway identifier.
        pub gateway_id: String,
        /// Username the token was issued to.
        pub preferred_username: String,
        /// Standard JWT subject.
        pub sub: Option<String>,
        /// Standard JWT expiration.
        pub exp: Option<usize>,
    }

    impl JwtClaims for DefaultClaims {
        fn gateway_id(&self) -> &str {
            &self.gateway_id
        }

        fn principal_id(&self) -> &str {
            &self.preferred_username
        }
    }

    /// JWT auth state holding decoding settings.
    #[derive(Clone)]
    pub struct JwtAuthState<C: JwtClaims> {
        decoding_key: Arc<DecodingKey>,
        validation: Validation,
        _marker: PhantomData<fn() -> C>,
    }

    impl<C: JwtClaims> fmt::Debug for JwtAuthState<C> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("JwtAuthState")
                .field("decoding_key", &"<redacted>")
                .field("validation", &self.validation)
                .finish()
        }
    }

    impl<C: JwtClaims> JwtAuthState<C> {
        /// Creates a new JWT auth state.
        pub fn new(decoding_key: DecodingKey, validation: Validation) -> Self {
            Self {
                decoding_key: Arc::new(decoding_key),
                validation,
                _marker: PhantomData,
            }
        }

        fn decode_from_headers(&self, headers: &HeaderMap) -> Result<JwtAuth<C>, AuthError> {
            let token = bearer_token(headers)?;
            let data = decode::<C>(&token, &self.decoding_key, &self.validation)
                .map_err(|_| AuthError::InvalidToken)?;
            JwtAuth::from_claims(data.claims, token)
        }
    }

    /// Provides access to [`JwtAuthState`] for extractors.
    pub trait JwtAuthProvider<C: JwtClaims> {
        /// Returns the JWT auth state for decoding.
        fn jwt_auth(&self) -> &JwtAuthState<C>;
    }

    /// Extracted JWT auth context plus claims.
    #[derive(Debug, Clone)]
    pub struct JwtAuth<C: JwtClaims> {
        /// Parsed authorization context.
        pub context: AuthzContext,
        /// Full claims.
        pub claims: C,
    }

    impl<C: JwtClaims> JwtAuth<C> {
        fn from_claims(claims: C, token: String) -> Result<Self, AuthError> {
            let gateway = GatewayId::try_from(claims.gateway_id())
                .map_err(|err| AuthError::InvalidId(err.to_string()))?;
            let principal = PrincipalId::try_from(claims.principal_id())
                .map_err(|err| AuthError::InvalidId(err.to_string()))?;
            let credential = Credential::new(token)
                .map_err(|err| AuthError::InvalidCredential(err.to_string()))?;
            Ok(Self {
                context: AuthzContext::new(gateway, principal, credential),
                claims,
            })
        }
    }

    impl<S, C> FromRequestParts<S> for JwtAuth<C>
    where
        S: Send + Sync + JwtAuthProvider<C>,
        C: JwtClaims,
    {
        type Rejection = AuthRejection;

        async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
            if let Some(existing) = parts.extensions.get::<JwtAuth<C>>() {
                return Ok(existing.clone());
            }
            let auth = state.jwt_auth().decode_from_headers(&parts.headers)?;
            parts.extensions.insert(auth.clone());
            parts.extensions.insert(auth.context.clone());
            Ok(auth)
        }
    }

    impl<S> FromRequestParts<S> for AuthzContext
    where
        S: Send + Sync + JwtAuthProvider<DefaultClaims>,
    {
        type Rejection = AuthRejection;

        async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
            let auth = JwtAuth::<DefaultClaims>::from_request_parts(parts, state).await?;
            Ok(auth.context)
        }
    }

    /// Middleware layer that decodes JWT and inserts auth context into request extensions.
    #[derive(Debug, Clone)]
    pub struct JwtAuthLayer<C: JwtClaims> {
        state: Arc<JwtAuthState<C>>,
    }

    impl<C: JwtClaims> JwtAuthLayer<C> {
        /// Creates a new JWT auth layer.
        pub fn new(state: JwtAuthState<C>) -> Self {
            Self {
                state: Arc::new(state),
            }
        }
    }

    impl<S, C> Layer<S> for JwtAuthLayer<C>
    where
        C: JwtClaims,
    {
        type Service = JwtAuthService<S, C>;

        fn layer(&self, inner: S) -> Self::Service {
            JwtAuthService {
                inner,
                state: self.state.clone(),
            }
        }
    }

    /// Middleware service that decodes JWT and attaches [`AuthzContext`].
    #[derive(Debug, Clone)]
    pub struct JwtAuthService<S, C: JwtClaims> {
        inner: S,
        state: Arc<JwtAuthState<C>>,
    }

    impl<S, C> Service<Request<Body>> for JwtAuthService<S, C>
    where
        S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
        S::Future: Send + 'static,
        C: JwtClaims,
    {
        type Response = Response;
        type Error = S::Error;
        type Future =
            Pin<Box<dyn std::future::Future<Output = Result<Response, Self::Error>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, mut req: Request<Body>) -> Self::Future {
            let state = self.state.clone();
            let mut inner = self.inner.clone();

            Box::pin(async move {
                match state.decode_from_headers(req.headers()) {
                    Ok(auth) => {
                        req.extensions_mut().insert(auth.context.clone());
                        req.extensions_mut().insert(auth);
                        poll_fn(|cx| inner.poll_ready(cx)).await?;
                        inner.call(req).await
                    }
                    Err(err) => Ok(AuthRejection::from(err).into_response()),
                }
            })
        }
    }

    fn bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
        let value = headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingAuthorization)?;
        let value = value
            .to_str()
            .map_err(|_| AuthError::InvalidAuthorization)?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidAuthorization)?;
        if token.is_empty() {
            return Err(AuthError::InvalidAuthorization);
        }
        Ok(token.to_string())
    }
}
