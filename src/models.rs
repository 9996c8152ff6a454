use serde::{Deserialize, Serialize};

/// Posts are stored and returned verbatim.
pub(crate) type Post = serde_json::Value;

/// The record persisted under `toilets/{id}`. The id lives in the key, not the value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct LocationCommand {
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Location {
    pub id: String,
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
}

impl Location {
    pub(crate) fn from_command(id: String, cmd: LocationCommand) -> Self {
        Self {
            id,
            name: cmd.name,
            longitude: cmd.longitude,
            latitude: cmd.latitude,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct LocationDetail {
    #[serde(flatten)]
    pub location: Location,
    pub posts: Vec<Post>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct CreatedLocation {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct QueryPoint {
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct RankedLocation {
    pub id: String,
    pub name: String,
    /// Meters from the query point.
    pub distance: f64,
}
