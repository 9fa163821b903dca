//! Translation between the typed model and the geodata API wire format.
//!
//! Features travel wrapped as `{"data": <Feature>}`. Responses are read here as well, so that a
//! change of the server contract only touches this module.

use serde::{Deserialize, Serialize};

use crate::store::record::{FeatureRecord, Identifier};

use super::error::RemoteError;

/// Geometry members that are forwarded to the server.
const GEOMETRY_MEMBERS: [&str; 3] = ["type", "coordinates", "geometries"];

#[derive(Serialize, Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Wrap a feature in the request envelope used by create and update.
pub fn feature_envelope(feature: &geojson::Feature) -> Result<serde_json::Value, RemoteError> {
    let geometry = feature
        .geometry
        .as_ref()
        .ok_or_else(|| RemoteError::InvalidRequest("feature has no geometry".to_string()))?;
    let mut geometry = geojson::JsonObject::from(geometry);
    geometry.retain(|key, _| GEOMETRY_MEMBERS.contains(&key.as_str()));

    Ok(serde_json::json!({
        "data": {
            "type": "Feature",
            "geometry": geometry,
            "properties": feature.properties.clone().unwrap_or_default(),
        }
    }))
}

#[derive(Deserialize)]
struct CreatedGeoData {
    #[serde(rename = "ID")]
    id: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct CreateResponse {
    geo_data: Option<CreatedGeoData>,
}

#[derive(Deserialize)]
struct UpdateResponse {
    id: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

fn parse_body<'a, T: Deserialize<'a>>(body: &'a str) -> Result<T, RemoteError> {
    serde_json::from_str(body).map_err(|err| RemoteError::MalformedResponse(err.to_string()))
}

/// Read the server-assigned id from `{"geo_data": {"ID": ...}}`.
pub fn parse_create_response(body: &str) -> Result<Identifier, RemoteError> {
    let response: CreateResponse = parse_body(body)?;
    response
        .geo_data
        .and_then(|geo_data| geo_data.id)
        .as_ref()
        .and_then(Identifier::from_json)
        .ok_or_else(|| RemoteError::MalformedResponse("missing geo_data.ID".to_string()))
}

/// Read the id echoed back by an update, `{"id": ...}`.
pub fn parse_update_response(body: &str) -> Result<Identifier, RemoteError> {
    let response: UpdateResponse = parse_body(body)?;
    response
        .id
        .as_ref()
        .and_then(Identifier::from_json)
        .ok_or_else(|| RemoteError::MalformedResponse("missing id".to_string()))
}

pub fn parse_list_response(body: &str) -> Result<Vec<FeatureRecord>, RemoteError> {
    parse_body(body)
}

pub fn parse_login_response(body: &str) -> Result<String, RemoteError> {
    let response: LoginResponse = parse_body(body)?;
    response
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| RemoteError::MalformedResponse("missing token".to_string()))
}
