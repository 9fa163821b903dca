use std::{fmt, str::FromStr};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Server-assigned identifier of a stored feature.
///
/// The geodata API hands ids out as JSON numbers, but string ids are accepted as well and kept in
/// whatever form the server used, so that a record read back from the cache compares equal to the
/// record the server returns.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(untagged)]
pub enum Identifier {
    Number(i64),
    Text(String),
}

impl Identifier {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Identifier::Number(number) => serde_json::Value::from(*number),
            Identifier::Text(text) => serde_json::Value::from(text.as_str()),
        }
    }

    /// Read an id from a JSON value, e.g. `feature.properties.id` or `geo_data.ID`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(number) => number.as_i64().map(Identifier::Number),
            serde_json::Value::String(text) if !text.is_empty() => {
                Some(Identifier::Text(text.to_owned()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Number(number) => write!(f, "{}", number),
            Identifier::Text(text) => write!(f, "{}", text),
        }
    }
}

/// Parses ids typed by the user. Numeric strings become numeric ids, as the server issues them.
impl FromStr for Identifier {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.parse::<i64>() {
            Ok(number) => Identifier::Number(number),
            Err(_) => Identifier::Text(s.to_string()),
        })
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Identifier::Number(value)
    }
}

/// Write `id` into `feature.properties.id`, creating the properties object if needed.
pub fn stamp_id(feature: &mut geojson::Feature, id: &Identifier) {
    feature.set_property("id", id.to_json());
}

/// Read the committed id of a feature from `properties.id`.
pub fn feature_id(feature: &geojson::Feature) -> Option<Identifier> {
    feature.property("id").and_then(Identifier::from_json)
}

/// A stored feature: the server id paired with a single GeoJSON Feature.
///
/// `data` holds the raw JSON of the feature. It is only parsed when rendered, so one malformed
/// record coming from the server or the cache does not take the whole list down with it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub id: Identifier,
    pub data: serde_json::Value,
}

impl FeatureRecord {
    /// Build a record from a typed feature, mirroring `id` into its properties.
    pub fn new(id: Identifier, feature: &geojson::Feature) -> Self {
        let mut feature = feature.clone();
        stamp_id(&mut feature, &id);
        Self {
            data: serde_json::Value::Object(geojson::JsonObject::from(&feature)),
            id,
        }
    }

    pub fn from_raw(id: Identifier, data: serde_json::Value) -> Self {
        Self { id, data }
    }

    /// Parse the record data as a GeoJSON document.
    pub fn geojson(&self) -> anyhow::Result<geojson::GeoJson> {
        geojson::GeoJson::from_json_value(self.data.clone())
            .with_context(|| format!("Record {} does not hold valid GeoJSON", self.id))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{feature_id, FeatureRecord, Identifier};

    fn point_feature() -> geojson::Feature {
        geojson::Feature::from(geojson::Geometry::new(geojson::Value::Point(vec![
            78.9629, 20.5937,
        ])))
    }

    #[rstest]
    #[case("42", Identifier::Number(42))]
    #[case("-7", Identifier::Number(-7))]
    #[case("a1b2", Identifier::Text("a1b2".to_string()))]
    fn test_identifier_from_str(#[case] input: &str, #[case] expected: Identifier) {
        assert_eq!(expected, input.parse::<Identifier>().unwrap());
    }

    #[rstest]
    #[case(serde_json::json!(12), Some(Identifier::Number(12)))]
    #[case(serde_json::json!("abc"), Some(Identifier::Text("abc".to_string())))]
    #[case(serde_json::json!(""), None)]
    #[case(serde_json::json!(null), None)]
    #[case(serde_json::json!(1.5), None)]
    fn test_identifier_from_json(
        #[case] value: serde_json::Value,
        #[case] expected: Option<Identifier>,
    ) {
        assert_eq!(expected, Identifier::from_json(&value));
    }

    #[test]
    fn test_identifier_keeps_wire_form() {
        let ids: Vec<Identifier> = serde_json::from_str(r#"[3, "3"]"#).unwrap();
        assert_eq!(
            vec![Identifier::Number(3), Identifier::Text("3".to_string())],
            ids
        );
        assert_eq!(r#"[3,"3"]"#, serde_json::to_string(&ids).unwrap());
    }

    #[test]
    fn test_new_record_mirrors_id_into_properties() {
        let record = FeatureRecord::new(Identifier::Number(5), &point_feature());
        assert_eq!(serde_json::json!(5), record.data["properties"]["id"]);

        match record.geojson().unwrap() {
            geojson::GeoJson::Feature(feature) => {
                assert_eq!(Some(Identifier::Number(5)), feature_id(&feature))
            }
            other => panic!("Expected a feature, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_data_fails_to_parse() {
        let record = FeatureRecord::from_raw(
            Identifier::Number(1),
            serde_json::json!({"type": "Feature", "geometry": {"type": "Polygon"}}),
        );
        assert!(record.geojson().is_err());
    }
}
