//! In-memory stand-in for the geodata API with scriptable failures.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use crate::store::record::{FeatureRecord, Identifier};

use super::{client::GeoDataApi, error::RemoteError};

#[derive(Default)]
struct FakeState {
    records: Vec<FeatureRecord>,
    next_id: i64,
    create_calls: usize,
    update_calls: usize,
    delete_calls: usize,
    list_calls: usize,
    failing_creates: HashMap<usize, RemoteError>,
    failing_ids: HashMap<Identifier, RemoteError>,
    list_error: Option<RemoteError>,
}

#[derive(Default)]
pub struct FakeGeoDataApi {
    state: Mutex<FakeState>,
}

impl FakeGeoDataApi {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    /// Server already holding `records`. New ids continue after the largest numeric id.
    pub fn with_records(records: Vec<FeatureRecord>) -> Self {
        let next_id = records
            .iter()
            .filter_map(|record| match record.id {
                Identifier::Number(number) => Some(number),
                Identifier::Text(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;
        Self {
            state: Mutex::new(FakeState {
                records,
                next_id,
                ..Default::default()
            }),
        }
    }

    /// Make the `call`-th create call (1-based) fail.
    pub fn fail_create_call(self, call: usize, err: RemoteError) -> Self {
        self.state.lock().unwrap().failing_creates.insert(call, err);
        self
    }

    /// Make every update and delete of `id` fail.
    pub fn fail_id(self, id: Identifier, err: RemoteError) -> Self {
        self.state.lock().unwrap().failing_ids.insert(id, err);
        self
    }

    pub fn fail_list(self, err: RemoteError) -> Self {
        self.state.lock().unwrap().list_error = Some(err);
        self
    }

    pub fn records(&self) -> Vec<FeatureRecord> {
        self.state.lock().unwrap().records.clone()
    }

    pub fn ids(&self) -> HashSet<Identifier> {
        self.records().into_iter().map(|record| record.id).collect()
    }

    pub fn create_calls(&self) -> usize {
        self.state.lock().unwrap().create_calls
    }

    pub fn update_calls(&self) -> usize {
        self.state.lock().unwrap().update_calls
    }

    pub fn delete_calls(&self) -> usize {
        self.state.lock().unwrap().delete_calls
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }
}

impl GeoDataApi for FakeGeoDataApi {
    fn list(&self) -> Result<Vec<FeatureRecord>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        match &state.list_error {
            Some(err) => Err(err.clone()),
            None => Ok(state.records.clone()),
        }
    }

    fn create(&self, feature: &geojson::Feature) -> Result<Identifier, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.create_calls += 1;
        if let Some(err) = state.failing_creates.get(&state.create_calls) {
            return Err(err.clone());
        }
        let id = Identifier::Number(state.next_id);
        state.next_id += 1;
        state.records.push(FeatureRecord::new(id.clone(), feature));
        Ok(id)
    }

    fn update(
        &self,
        id: &Identifier,
        feature: &geojson::Feature,
    ) -> Result<Identifier, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.update_calls += 1;
        if let Some(err) = state.failing_ids.get(id) {
            return Err(err.clone());
        }
        match state.records.iter_mut().find(|record| &record.id == id) {
            Some(record) => {
                *record = FeatureRecord::new(id.clone(), feature);
                Ok(id.clone())
            }
            None => Err(RemoteError::Rejected {
                status: 404,
                body: format!("geodata {} not found", id),
            }),
        }
    }

    fn delete(&self, id: &Identifier) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls += 1;
        if let Some(err) = state.failing_ids.get(id) {
            return Err(err.clone());
        }
        state.records.retain(|record| &record.id != id);
        Ok(())
    }
}
