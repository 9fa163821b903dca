use anyhow::anyhow;

use crate::{
    notify::Notifier,
    remote::{client::GeoDataApi, error::RemoteError},
    store::{
        cache::CacheStore,
        feature_store::{FeatureStore, Mutation},
        record::{stamp_id, FeatureRecord, Identifier},
    },
    surface::{
        layer::{Layer, LayerHandle, LayerState},
        map_surface::MapSurface,
    },
};

use super::batch::{run_batch, BatchReport, DeleteBatchError, EditPolicy};

/// Keeps the feature store, the remote geodata store and the drawing surface consistent while
/// the user draws, edits and deletes shapes.
///
/// Every rendered layer either carries the id of exactly one stored record in
/// `properties.id`, or is a pending draft waiting for its create call.
pub struct Reconciler<G, C, S, N>
where
    G: GeoDataApi,
    C: CacheStore,
    S: MapSurface,
    N: Notifier,
{
    api: G,
    store: FeatureStore<C>,
    surface: S,
    notifier: N,
    edit_policy: EditPolicy,
}

impl<G, C, S, N> Reconciler<G, C, S, N>
where
    G: GeoDataApi,
    C: CacheStore,
    S: MapSurface,
    N: Notifier,
{
    pub fn new(api: G, store: FeatureStore<C>, surface: S, notifier: N) -> Self {
        Self {
            api,
            store,
            surface,
            notifier,
            edit_policy: EditPolicy::default(),
        }
    }

    pub fn with_edit_policy(mut self, edit_policy: EditPolicy) -> Self {
        self.edit_policy = edit_policy;
        self
    }

    pub fn api(&self) -> &G {
        &self.api
    }

    pub fn store(&self) -> &FeatureStore<C> {
        &self.store
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Show the cached snapshot while the remote list is still on its way.
    pub fn preview_from_cache(&mut self) -> bool {
        if !self.store.hydrate_from_cache() {
            return false;
        }
        self.render();
        true
    }

    /// Replace the store with the server's list and re-render everything.
    pub fn refresh_from_remote(&mut self) -> anyhow::Result<()> {
        let records = self.api.list().map_err(|err| {
            log::error!("Failed to fetch geo data: {}", err);
            err
        })?;
        self.store.hydrate_from_remote(records)?;
        self.render();
        Ok(())
    }

    /// Rebuild all layers from the store and fit the viewport to them.
    ///
    /// Records that do not hold a renderable GeoJSON feature are skipped. Returns the number of
    /// layers rendered.
    pub fn render(&mut self) -> usize {
        self.surface.clear_layers();
        let mut rendered = 0;
        for record in self.store.records() {
            match layers_for_record(record) {
                Ok(layers) => {
                    for layer in layers {
                        self.surface.add_layer(layer);
                        rendered += 1;
                    }
                }
                Err(err) => log::error!("Error parsing GeoJSON for item {}: {:?}", record.id, err),
            }
        }
        if let Some(bounds) = self.surface.bounds() {
            self.surface.fit_bounds(bounds);
        }
        log::debug!(
            "Rendered {} layers from {} records",
            rendered,
            self.store.len()
        );
        rendered
    }

    /// The single create call shared by drawing and bulk import.
    pub fn create_remote(&self, feature: &geojson::Feature) -> Result<Identifier, RemoteError> {
        self.api.create(feature)
    }

    /// A draw gesture finished: persist the draft layer at `handle`.
    ///
    /// On failure the draft is removed from the surface, the user is alerted and nothing enters
    /// the store.
    pub fn handle_created(&mut self, handle: LayerHandle) -> anyhow::Result<Identifier> {
        let feature = self
            .surface
            .layer(handle)
            .map(Layer::to_geojson)
            .ok_or_else(|| anyhow!("No drawn layer {:?}", handle))?;

        self.surface.set_busy(true);
        let result = self.create_remote(&feature);
        self.surface.set_busy(false);

        let id = match result {
            Ok(id) => id,
            Err(err) => {
                log::error!("Error saving geodata: {}", err);
                self.surface.remove_layer(handle);
                self.notifier.alert(&format!("Failed to save shape: {}", err));
                return Err(err.into());
            }
        };

        let layer = self
            .surface
            .layer_mut(handle)
            .ok_or_else(|| anyhow!("Drawn layer {:?} disappeared", handle))?;
        layer.commit(&id);
        let record = FeatureRecord::new(id.clone(), &layer.to_geojson());
        self.store.apply(Mutation::Create(record))?;
        log::info!("Saved shape {}", id);
        Ok(id)
    }

    /// An edit gesture finished on the layers at `handles`.
    ///
    /// One update per committed layer, all issued together. Failed updates are logged, never
    /// alerted. Once every call has settled, the store takes the current geometry of the layers
    /// selected by the edit policy.
    pub fn handle_edited(
        &mut self,
        handles: &[LayerHandle],
    ) -> anyhow::Result<BatchReport<Identifier>> {
        let items: Vec<(Identifier, geojson::Feature)> = handles
            .iter()
            .filter_map(|handle| self.surface.layer(*handle))
            .filter_map(|layer| layer.committed_id().map(|id| (id, layer.to_geojson())))
            .collect();

        let api = &self.api;
        let report = run_batch(&items, |id, feature| api.update(id, feature));
        for (id, err) in report.failures() {
            log::error!("Error updating geodata {}: {}", id, err);
        }

        let policy = self.edit_policy;
        let mutations: Vec<Mutation> = items
            .iter()
            .zip(report.outcomes.iter())
            .filter(|((id, _), outcome)| {
                policy.commits(outcome.result.is_ok()) && self.store.contains(id)
            })
            .map(|((id, feature), _)| Mutation::Update {
                id: id.clone(),
                data: FeatureRecord::new(id.clone(), feature).data,
            })
            .collect();
        self.store.apply_batch(mutations)?;
        Ok(report)
    }

    /// A delete gesture removed `layers` from the surface.
    ///
    /// One delete per committed record, all issued together; layers rendering the same record
    /// share one call. The records are removed from the store whatever the outcome of the calls.
    /// If any call failed the user is alerted once and a [`DeleteBatchError`] is returned, even
    /// when the cache write failed as well.
    pub fn handle_deleted(&mut self, layers: &[Layer]) -> anyhow::Result<BatchReport<()>> {
        let mut items: Vec<(Identifier, ())> = Vec::new();
        for id in layers.iter().filter_map(Layer::committed_id) {
            if !items.iter().any(|(seen, _)| seen == &id) {
                items.push((id, ()));
            }
        }

        let api = &self.api;
        let report = run_batch(&items, |id, _| api.delete(id));

        let persisted = self
            .store
            .apply_batch(items.iter().map(|(id, _)| Mutation::Delete(id.clone())));

        if report.all_succeeded() {
            persisted?;
            return Ok(report);
        }
        if let Err(cache_err) = persisted {
            log::error!("Error writing the cache after batch delete: {:?}", cache_err);
        }
        let err = DeleteBatchError {
            failures: report
                .failures()
                .map(|(id, err)| (id.clone(), err.clone()))
                .collect(),
        };
        log::error!("Error during batch delete: {}", err);
        self.notifier.alert(&err.to_string());
        Err(err.into())
    }
}

/// Layers rendering `record`, each stamped with the record id.
fn layers_for_record(record: &FeatureRecord) -> anyhow::Result<Vec<Layer>> {
    let features = match record.geojson()? {
        geojson::GeoJson::Feature(feature) => vec![feature],
        geojson::GeoJson::FeatureCollection(collection) => collection.features,
        geojson::GeoJson::Geometry(geometry) => vec![geojson::Feature::from(geometry)],
    };
    features
        .into_iter()
        .map(|mut feature| {
            stamp_id(&mut feature, &record.id);
            Layer::from_feature(feature, LayerState::Committed)
        })
        .collect()
}
