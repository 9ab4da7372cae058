//! `HmsClient`: the composed data layer plus sign-in and sign-out.

use hms_cache::{CacheConfig, CacheStore};
use hms_core::{
    ApiRequest, AuthUser, Credentials, HmsResult, LoginResponse, Mutation, QueryDescriptor,
    SignupPayload, SignupResponse, Transport, UpdateProfile, LOGIN_PATH, LOGOUT_PATH,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use crate::api::account::{self, REGISTER_PATH};
use crate::config::ClientConfig;
use crate::coordinator::{QueryCoordinator, QueryHandle};
use crate::error::ClientResult;
use crate::session::{SessionGuard, SessionStatus};
use crate::transport::HttpTransport;

#[derive(Clone, Debug)]
pub struct HmsClient {
    guard: SessionGuard,
    coordinator: QueryCoordinator,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    user: Option<AuthUser>,
}

impl HmsClient {
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        let transport = HttpTransport::new(config)?;
        tracing::debug!(base_url = transport.base_url(), "http transport ready");
        Ok(Self::with_transport(
            Arc::new(transport),
            config.cache.clone(),
            config.identity_path.clone(),
        ))
    }

    /// Compose the layer over any transport.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        cache: CacheConfig,
        identity_path: Option<PathBuf>,
    ) -> Self {
        let guard = SessionGuard::new(transport, identity_path);
        let store = Arc::new(CacheStore::new(cache));
        let coordinator = QueryCoordinator::new(store, guard.clone());
        Self { guard, coordinator }
    }

    pub fn guard(&self) -> &SessionGuard {
        &self.guard
    }

    pub fn coordinator(&self) -> &QueryCoordinator {
        &self.coordinator
    }

    pub fn store(&self) -> &Arc<CacheStore> {
        self.coordinator.store()
    }

    pub fn session(&self) -> SessionStatus {
        self.guard.status()
    }

    pub fn query(&self, descriptor: QueryDescriptor) -> QueryHandle {
        self.coordinator.query(descriptor)
    }

    pub async fn fetch(&self, descriptor: QueryDescriptor) -> HmsResult<Arc<Value>> {
        self.coordinator.fetch(descriptor).await
    }

    pub async fn fetch_as<T: DeserializeOwned>(&self, descriptor: QueryDescriptor) -> ClientResult<T> {
        self.coordinator.fetch_as(descriptor).await
    }

    pub async fn mutate(&self, mutation: &Mutation) -> HmsResult<Value> {
        self.coordinator.mutate(mutation).await
    }

    /// Load the persisted identity snapshot, if any.
    pub fn restore(&self) -> ClientResult<Option<AuthUser>> {
        Ok(self.guard.restore()?)
    }

    /// Sign in. A rejected login never triggers a session refresh; the
    /// server's message is kept for display.
    pub async fn login(&self, credentials: &Credentials) -> ClientResult<AuthUser> {
        let request = ApiRequest::post(LOGIN_PATH).json(credentials);
        let body = self.guard.guarded_send(&request).await?;
        let response: LoginResponse = serde_json::from_value(body)?;
        self.guard.establish(response.user.clone());
        Ok(response.user)
    }

    /// Create an account. When the server returns the new user the session
    /// is established as on login.
    pub async fn register(&self, payload: &SignupPayload) -> ClientResult<SignupResponse> {
        let request = ApiRequest::post(REGISTER_PATH).json(payload);
        let body = self.guard.guarded_send(&request).await?;
        let response: SignupResponse = serde_json::from_value(body)?;
        if let Some(user) = &response.user {
            self.guard.establish(user.clone());
        }
        Ok(response)
    }

    /// Sign out. The server call is best effort; local session state,
    /// the persisted snapshot and every cached result are dropped regardless.
    pub async fn logout(&self) {
        if let Err(err) = self.guard.transport().send(&ApiRequest::post(LOGOUT_PATH)).await {
            tracing::debug!(error = %err, "logout request failed, clearing locally");
        }
        self.guard.reset();
        self.store().clear();
    }

    /// Update name and email, keeping the session snapshot in step.
    pub async fn update_profile(&self, profile: &UpdateProfile) -> ClientResult<Option<AuthUser>> {
        let body = self.mutate(&account::update_profile(profile)).await?;
        let response: ProfileResponse = serde_json::from_value(body)?;
        let user = response.user.or_else(|| {
            self.guard.user().map(|user| AuthUser {
                name: profile.name.clone(),
                email: profile.email.clone(),
                ..user
            })
        });
        if let Some(user) = &user {
            self.guard.update_user(user.clone());
        }
        Ok(user)
    }
}
