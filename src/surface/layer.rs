use anyhow::{anyhow, Context};
use geo::BoundingRect;

use crate::store::record::{feature_id, stamp_id, Identifier};

/// Handle of a layer on a drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    /// Drawn, waiting for the server to confirm it. Has no id yet.
    Pending,
    Committed,
}

/// A rendered shape: the GeoJSON feature it was built from and its geometry.
#[derive(Debug, Clone)]
pub struct Layer {
    feature: geojson::Feature,
    geometry: geo::Geometry,
    state: LayerState,
}

impl Layer {
    /// Build a layer from a feature. Fails if the feature has no geometry or its geometry cannot
    /// be converted.
    pub fn from_feature(feature: geojson::Feature, state: LayerState) -> anyhow::Result<Self> {
        let value = feature
            .geometry
            .as_ref()
            .map(|geometry| geometry.value.clone())
            .ok_or_else(|| anyhow!("Feature has no geometry"))?;
        let geometry = geo::Geometry::try_from(value).context("Converting GeoJSON geometry")?;
        Ok(Self {
            feature,
            geometry,
            state,
        })
    }

    /// A freshly drawn shape, not yet known to the server.
    pub fn draft(geometry: geo::Geometry) -> Self {
        let feature = geojson::Feature::from(geojson::Geometry::new(geojson::Value::from(
            &geometry,
        )));
        Self {
            feature,
            geometry,
            state: LayerState::Pending,
        }
    }

    pub fn state(&self) -> LayerState {
        self.state
    }

    pub fn geometry(&self) -> &geo::Geometry {
        &self.geometry
    }

    /// Id of the record this layer renders, read from `properties.id`.
    pub fn committed_id(&self) -> Option<Identifier> {
        match self.state {
            LayerState::Committed => feature_id(&self.feature),
            LayerState::Pending => None,
        }
    }

    /// Current shape of the layer as a GeoJSON feature.
    pub fn to_geojson(&self) -> geojson::Feature {
        self.feature.clone()
    }

    /// Replace the geometry, as an edit gesture does.
    pub fn set_geometry(&mut self, geometry: geo::Geometry) {
        self.feature.geometry = Some(geojson::Geometry::new(geojson::Value::from(&geometry)));
        self.geometry = geometry;
    }

    /// Attach the server id and mark the layer as committed.
    pub fn commit(&mut self, id: &Identifier) {
        stamp_id(&mut self.feature, id);
        self.state = LayerState::Committed;
    }

    pub fn bounds(&self) -> Option<geo::Rect> {
        self.geometry.bounding_rect()
    }
}

/// Smallest rectangle containing both `a` and `b`.
pub fn merge_bounds(a: geo::Rect, b: geo::Rect) -> geo::Rect {
    geo::Rect::new(
        geo::Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        geo::Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}
