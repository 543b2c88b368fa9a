//! Component, configuration and flight models
//!
//! These three entity types are never restricted: they have no visibility
//! field, their constructors take no flags, and the repositories always
//! store `staff`, `private` and `superprivate` as false.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Drone component (propeller, battery, motor, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub author_id: Option<i64>,
    pub category_id: i64,
    /// Free-form technical characteristics
    #[serde(default)]
    pub specs: Map<String, Value>,
    /// Link to the datasheet
    pub datasheet: Option<String>,
    /// Path of the uploaded photo
    pub photo: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Component {
    pub fn new(title: String, body: String, category_id: i64) -> Self {
        Self {
            id: 0,
            title,
            body,
            author_id: None,
            category_id,
            specs: Map::new(),
            datasheet: None,
            photo: None,
            created_at: Utc::now(),
        }
    }
}

/// A drone build: a versioned list of components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub author_id: Option<i64>,
    pub version_number: String,
    /// Flight controller firmware version
    #[serde(default)]
    pub firmware_version: String,
    pub photo: Option<String>,
    /// IDs of the components used to build it
    #[serde(default)]
    pub component_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

impl Configuration {
    pub fn new(title: String, body: String, version_number: String) -> Self {
        Self {
            id: 0,
            title,
            body,
            author_id: None,
            version_number,
            firmware_version: String::new(),
            photo: None,
            component_ids: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Flight log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub author_id: Option<i64>,
    /// Configuration that flew
    pub configuration_id: i64,
    /// Weather: `couverture`, `force_vent`, `direction_vent`, all optional
    #[serde(default)]
    pub meteo: Map<String, Value>,
    /// Path of the flight controller log
    pub datalog: Option<String>,
    /// Path of the flight video
    pub video: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Flight {
    pub fn new(title: String, body: String, configuration_id: i64) -> Self {
        Self {
            id: 0,
            title,
            body,
            author_id: None,
            configuration_id,
            meteo: Map::new(),
            datalog: None,
            video: None,
            created_at: Utc::now(),
        }
    }
}
