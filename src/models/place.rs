//! Place data structure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{AppError, Result};
use crate::models::Coordinate;

/// A place returned by a nearby search.
///
/// The provider's record is kept verbatim in `payload`; the typed fields are
/// a view over it. Serializing a place writes the payload back unchanged, so
/// snapshots hold exactly what the provider returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Place {
    /// Stable provider identifier (`place_id`)
    pub id: String,

    /// Display name
    pub name: String,

    /// Short address, when the provider sends one
    pub vicinity: Option<String>,

    /// Position of the place
    pub location: Coordinate,

    /// Raw provider record
    pub payload: Value,
}

impl Place {
    /// Build a place with a minimal provider-shaped payload.
    pub fn new(id: impl Into<String>, name: impl Into<String>, location: Coordinate) -> Self {
        let id = id.into();
        let name = name.into();
        let payload = json!({
            "place_id": id,
            "name": name,
            "geometry": { "location": { "lat": location.lat, "lng": location.lng } },
        });
        Self {
            id,
            name,
            vicinity: None,
            location,
            payload,
        }
    }

    /// Parse a raw provider record.
    pub fn from_value(payload: Value) -> Result<Self> {
        let record = payload
            .as_object()
            .ok_or_else(|| AppError::validation("place record is not a JSON object"))?;

        let id = string_field(record, "place_id")
            .ok_or_else(|| AppError::validation("place record has no place_id"))?;
        let name = string_field(record, "name").unwrap_or_default();
        let vicinity = string_field(record, "vicinity");

        let location = record
            .get("geometry")
            .and_then(|g| g.get("location"))
            .and_then(|l| Some(Coordinate::new(l.get("lat")?.as_f64()?, l.get("lng")?.as_f64()?)))
            .ok_or_else(|| AppError::validation(format!("place {id} has no geometry.location")))?;

        Ok(Self {
            id,
            name,
            vicinity,
            location,
            payload,
        })
    }
}

fn string_field(record: &Map<String, Value>, key: &str) -> Option<String> {
    record.get(key).and_then(Value::as_str).map(str::to_string)
}

impl TryFrom<Value> for Place {
    type Error = AppError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<Place> for Value {
    fn from(place: Place) -> Self {
        place.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> Value {
        json!({
            "business_status": "OPERATIONAL",
            "geometry": {
                "location": { "lat": 37.5663339, "lng": -122.3223532 },
                "viewport": {
                    "northeast": { "lat": 37.5674944302915, "lng": -122.3212776197085 },
                    "southwest": { "lat": 37.5647964697085, "lng": -122.3239755802915 }
                }
            },
            "name": "Cinemark Century San Mateo 12",
            "place_id": "ChIJd3dEm3Cej4ARl8USef836uE",
            "rating": 4.4,
            "types": ["movie_theater", "restaurant"],
            "vicinity": "320 2nd Avenue, San Mateo"
        })
    }

    #[test]
    fn test_parse_provider_record() {
        let place = Place::from_value(sample_record()).unwrap();
        assert_eq!(place.id, "ChIJd3dEm3Cej4ARl8USef836uE");
        assert_eq!(place.name, "Cinemark Century San Mateo 12");
        assert_eq!(place.vicinity.as_deref(), Some("320 2nd Avenue, San Mateo"));
        assert_eq!(place.location, Coordinate::new(37.5663339, -122.3223532));
    }

    #[test]
    fn test_serialize_writes_raw_record() {
        let place = Place::from_value(sample_record()).unwrap();
        let written = serde_json::to_value(&place).unwrap();
        assert_eq!(written, sample_record());
    }

    #[test]
    fn test_missing_place_id_rejected() {
        let record = json!({ "name": "Nameless", "geometry": { "location": { "lat": 1.0, "lng": 2.0 } } });
        assert!(Place::from_value(record).is_err());
    }

    #[test]
    fn test_missing_location_rejected() {
        let record = json!({ "place_id": "abc", "name": "Nowhere" });
        assert!(serde_json::from_value::<Place>(record).is_err());
    }

    #[test]
    fn test_new_builds_parseable_payload() {
        let place = Place::new("p1", "Taqueria", Coordinate::new(1.5, -2.5));
        let reparsed = Place::from_value(place.payload.clone()).unwrap();
        assert_eq!(reparsed, place);
    }
}
