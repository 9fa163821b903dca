use crate::{
    remote::{client::GeoDataApi, error::RemoteError},
    store::record::{FeatureRecord, Identifier},
};

use super::gate::SessionHandle;

/// Wraps a geodata client and logs the session out as soon as any call comes back unauthorized.
pub struct SessionGuard<G: GeoDataApi> {
    inner: G,
    session: SessionHandle,
}

impl<G: GeoDataApi> SessionGuard<G> {
    pub fn new(inner: G, session: SessionHandle) -> Self {
        Self { inner, session }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    fn observe<T>(&self, result: Result<T, RemoteError>) -> Result<T, RemoteError> {
        if let Err(RemoteError::Unauthorized) = &result {
            self.session.invalidate();
        }
        result
    }
}

impl<G: GeoDataApi> GeoDataApi for SessionGuard<G> {
    fn list(&self) -> Result<Vec<FeatureRecord>, RemoteError> {
        self.observe(self.inner.list())
    }

    fn create(&self, feature: &geojson::Feature) -> Result<Identifier, RemoteError> {
        self.observe(self.inner.create(feature))
    }

    fn update(
        &self,
        id: &Identifier,
        feature: &geojson::Feature,
    ) -> Result<Identifier, RemoteError> {
        self.observe(self.inner.update(id, feature))
    }

    fn delete(&self, id: &Identifier) -> Result<(), RemoteError> {
        self.observe(self.inner.delete(id))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;

    use crate::{
        remote::{client::GeoDataApi, error::RemoteError, fake::FakeGeoDataApi},
        session::{
            gate::{SessionHandle, SessionState},
            token::{MemoryTokenStore, TokenStore},
        },
        store::record::Identifier,
    };

    use super::SessionGuard;

    fn authenticated_handle(tokens: Arc<MemoryTokenStore>) -> SessionHandle {
        let handle = SessionHandle::new(tokens);
        handle.set_state(SessionState::Authenticated);
        handle
    }

    #[test]
    fn test_unauthorized_list_logs_out() {
        let tokens = Arc::new(MemoryTokenStore::with_token("token"));
        let handle = authenticated_handle(tokens.clone());
        let api = SessionGuard::new(
            FakeGeoDataApi::new().fail_list(RemoteError::Unauthorized),
            handle.clone(),
        );

        assert_eq!(Err(RemoteError::Unauthorized), api.list());
        assert_eq!(SessionState::Unauthenticated, handle.state());
        assert_eq!(None, tokens.load());
    }

    #[test]
    fn test_unauthorized_delete_logs_out() {
        let tokens = Arc::new(MemoryTokenStore::with_token("token"));
        let handle = authenticated_handle(tokens.clone());
        let api = SessionGuard::new(
            FakeGeoDataApi::new().fail_id(Identifier::Number(1), RemoteError::Unauthorized),
            handle.clone(),
        );

        assert!(api.delete(&Identifier::Number(1)).is_err());
        assert_eq!(SessionState::Unauthenticated, handle.state());
        assert_eq!(None, tokens.load());
    }

    #[rstest]
    #[case(RemoteError::Transport("timeout".to_string()))]
    #[case(RemoteError::Rejected { status: 500, body: String::new() })]
    #[case(RemoteError::MalformedResponse("missing id".to_string()))]
    fn test_other_errors_keep_session(#[case] err: RemoteError) {
        let tokens = Arc::new(MemoryTokenStore::with_token("token"));
        let handle = authenticated_handle(tokens.clone());
        let api = SessionGuard::new(FakeGeoDataApi::new().fail_list(err.clone()), handle.clone());

        assert_eq!(Err(err), api.list());
        assert_eq!(SessionState::Authenticated, handle.state());
        assert_eq!(Some("token".to_string()), tokens.load());
    }
}
