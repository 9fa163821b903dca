use std::collections::BTreeMap;

use crate::store::record::Identifier;

use super::layer::{merge_bounds, Layer, LayerHandle};

/// Default view: centered on India at zoom level 5.
const DEFAULT_CENTER_LON: f64 = 78.9629;
const DEFAULT_CENTER_LAT: f64 = 20.5937;
const DEFAULT_ZOOM: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Viewport {
    Centered { center: geo::Point, zoom: u8 },
    Fitted(geo::Rect),
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport::Centered {
            center: geo::Point::new(DEFAULT_CENTER_LON, DEFAULT_CENTER_LAT),
            zoom: DEFAULT_ZOOM,
        }
    }
}

/// Interactive drawing surface holding the rendered layers. Rendering and hit-testing belong to
/// the mapping library behind it; the reconciler only adds, removes and inspects layers.
pub trait MapSurface {
    fn add_layer(&mut self, layer: Layer) -> LayerHandle;

    fn remove_layer(&mut self, handle: LayerHandle) -> Option<Layer>;

    fn layer(&self, handle: LayerHandle) -> Option<&Layer>;

    fn layer_mut(&mut self, handle: LayerHandle) -> Option<&mut Layer>;

    fn clear_layers(&mut self);

    fn handles(&self) -> Vec<LayerHandle>;

    fn fit_bounds(&mut self, bounds: geo::Rect);

    /// Show or hide the "saving" indicator.
    fn set_busy(&mut self, busy: bool);

    /// Bounds of all layers, `None` if there are none or none has an extent.
    fn bounds(&self) -> Option<geo::Rect> {
        self.handles()
            .into_iter()
            .filter_map(|handle| self.layer(handle).and_then(Layer::bounds))
            .reduce(merge_bounds)
    }

    /// Handles of the committed layers rendering record `id`.
    fn handles_for(&self, id: &Identifier) -> Vec<LayerHandle> {
        self.handles()
            .into_iter()
            .filter(|handle| {
                self.layer(*handle)
                    .and_then(Layer::committed_id)
                    .map_or(false, |layer_id| &layer_id == id)
            })
            .collect()
    }
}

/// In-memory layer group, the surface used when running headless.
#[derive(Debug, Default)]
pub struct FeatureGroup {
    layers: BTreeMap<LayerHandle, Layer>,
    next_handle: u64,
    viewport: Viewport,
    busy: bool,
}

impl FeatureGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }
}

impl MapSurface for FeatureGroup {
    fn add_layer(&mut self, layer: Layer) -> LayerHandle {
        let handle = LayerHandle(self.next_handle);
        self.next_handle += 1;
        self.layers.insert(handle, layer);
        handle
    }

    fn remove_layer(&mut self, handle: LayerHandle) -> Option<Layer> {
        self.layers.remove(&handle)
    }

    fn layer(&self, handle: LayerHandle) -> Option<&Layer> {
        self.layers.get(&handle)
    }

    fn layer_mut(&mut self, handle: LayerHandle) -> Option<&mut Layer> {
        self.layers.get_mut(&handle)
    }

    fn clear_layers(&mut self) {
        self.layers.clear();
    }

    fn handles(&self) -> Vec<LayerHandle> {
        self.layers.keys().copied().collect()
    }

    fn fit_bounds(&mut self, bounds: geo::Rect) {
        log::debug!("Fitting viewport to {:?}", bounds);
        self.viewport = Viewport::Fitted(bounds);
    }

    fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }
}
