use serde::{de, Deserialize, Deserializer, Serialize};

/// Parameter names every request must carry inside `model_params`.
pub const REQUIRED_MODEL_PARAMS: [&str; 16] = [
    "floor",
    "is_apartment",
    "kitchen_area",
    "living_area",
    "rooms",
    "studio",
    "total_area",
    "building_id",
    "build_year",
    "building_type_int",
    "latitude",
    "longitude",
    "ceiling_height",
    "flats_count",
    "floors_total",
    "has_elevator",
];

/// Raw listing attributes as submitted by the client.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ListingParams {
    pub floor: f64,
    #[serde(deserialize_with = "flag")]
    pub is_apartment: bool,
    pub kitchen_area: f64,
    pub living_area: f64,
    pub rooms: f64,
    #[serde(deserialize_with = "flag")]
    pub studio: bool,
    pub total_area: f64,
    pub building_id: f64,
    pub build_year: f64,
    pub building_type_int: f64, // encoded building material/series
    pub latitude: f64,
    pub longitude: f64,
    pub ceiling_height: f64, // metres
    pub flats_count: f64,
    pub floors_total: f64,
    #[serde(deserialize_with = "flag")]
    pub has_elevator: bool,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub user_id: String,
    pub model_params: ListingParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub user_id: String,
    pub prediction: f64,
}

// Flags arrive as JSON booleans, but 0/1 integers are accepted as well.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => Ok(b),
        Flag::Int(0) => Ok(false),
        Flag::Int(1) => Ok(true),
        Flag::Int(other) => Err(de::Error::custom(format!("expected 0 or 1, got {other}"))),
    }
}
