use std::path::Path;

use anyhow::anyhow;

use crate::{
    import::bulk::{import_file, ImportReport},
    notify::Notifier,
    reconcile::{
        batch::{BatchReport, EditPolicy},
        reconciler::Reconciler,
    },
    remote::client::{AuthApi, GeoDataApi},
    session::{gate::SessionGate, guard::SessionGuard},
    store::{cache::CacheStore, feature_store::FeatureStore, record::Identifier},
    surface::{
        layer::{Layer, LayerHandle, LayerState},
        map_surface::MapSurface,
    },
};

/// The authenticated map view. Every operation requires an authenticated session, and every
/// remote call goes through a [`SessionGuard`] so that an unauthorized response logs the user out.
pub struct Dashboard<A, G, C, S, N>
where
    A: AuthApi,
    G: GeoDataApi,
    C: CacheStore,
    S: MapSurface,
    N: Notifier,
{
    session: SessionGate<A>,
    reconciler: Reconciler<SessionGuard<G>, C, S, N>,
}

impl<A, G, C, S, N> Dashboard<A, G, C, S, N>
where
    A: AuthApi,
    G: GeoDataApi,
    C: CacheStore,
    S: MapSurface,
    N: Notifier,
{
    pub fn new(
        session: SessionGate<A>,
        api: G,
        store: FeatureStore<C>,
        surface: S,
        notifier: N,
    ) -> Self {
        let api = SessionGuard::new(api, session.handle());
        Self {
            session,
            reconciler: Reconciler::new(api, store, surface, notifier),
        }
    }

    pub fn with_edit_policy(mut self, edit_policy: EditPolicy) -> Self {
        self.reconciler = self.reconciler.with_edit_policy(edit_policy);
        self
    }

    pub fn session(&self) -> &SessionGate<A> {
        &self.session
    }

    pub fn reconciler(&self) -> &Reconciler<SessionGuard<G>, C, S, N> {
        &self.reconciler
    }

    /// Show the cached features, then replace them with the server's list.
    ///
    /// If the list call fails the cached preview stays on the surface and the error is returned.
    pub fn open(&mut self) -> anyhow::Result<()> {
        self.session.require_authenticated()?;
        if self.reconciler.preview_from_cache() {
            log::info!(
                "Showing {} cached features",
                self.reconciler.store().len()
            );
        }
        self.reconciler.refresh_from_remote()?;
        log::info!("Loaded {} features", self.reconciler.store().len());
        Ok(())
    }

    /// Draw `feature` on the map and save it.
    pub fn draw(&mut self, feature: geojson::Feature) -> anyhow::Result<Identifier> {
        self.session.require_authenticated()?;
        let layer = Layer::from_feature(feature, LayerState::Pending)?;
        let handle = self.reconciler.surface_mut().add_layer(layer);
        self.reconciler.handle_created(handle)
    }

    /// Reshape the feature `id` to `geometry`.
    pub fn edit(
        &mut self,
        id: &Identifier,
        geometry: geo::Geometry,
    ) -> anyhow::Result<BatchReport<Identifier>> {
        self.session.require_authenticated()?;
        let handle = self
            .reconciler
            .surface()
            .handles_for(id)
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No shape with id {} on the map", id))?;
        if let Some(layer) = self.reconciler.surface_mut().layer_mut(handle) {
            layer.set_geometry(geometry);
        }
        self.reconciler.handle_edited(&[handle])
    }

    /// Remove the features `ids` from the map and delete them.
    ///
    /// Every id must be on the map; otherwise nothing is removed. Repeated ids are deleted once.
    pub fn delete(&mut self, ids: &[Identifier]) -> anyhow::Result<BatchReport<()>> {
        self.session.require_authenticated()?;
        let mut targets: Vec<(&Identifier, Vec<LayerHandle>)> = Vec::new();
        for id in ids {
            if targets.iter().any(|(target, _)| *target == id) {
                continue;
            }
            let handles = self.reconciler.surface().handles_for(id);
            if handles.is_empty() {
                return Err(anyhow!("No shape with id {} on the map", id));
            }
            targets.push((id, handles));
        }

        let removed: Vec<Layer> = targets
            .into_iter()
            .flat_map(|(_, handles)| handles)
            .filter_map(|handle| self.reconciler.surface_mut().remove_layer(handle))
            .collect();
        self.reconciler.handle_deleted(&removed)
    }

    pub fn import_file(&mut self, filepath: &Path) -> anyhow::Result<ImportReport> {
        self.session.require_authenticated()?;
        import_file(&mut self.reconciler, filepath)
    }

    pub fn logout(&mut self) {
        self.session.logout();
    }
}
