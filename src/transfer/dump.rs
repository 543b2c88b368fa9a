//! Dump artifact records
//!
//! The artifact is a JSON array of records shaped
//! `{"model": ..., "natural_key": ..., "fields": {...}}`. Records never carry
//! database ids: every record is identified by its natural key and every
//! reference is the natural key of the referenced record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::{Read, Write};

use crate::models::ContentKind;

/// Username
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserKey(pub String);

/// Group name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey(pub String);

/// Category name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryKey(pub String);

/// (title, date)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArticleKey(pub String, pub DateTime<Utc>);

/// (title, category name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentKey(pub String, pub CategoryKey);

/// (title, version number)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigurationKey(pub String, pub String);

/// (title, date)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlightKey(pub String, pub DateTime<Utc>);

/// Natural key of a comment's parent
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "key", rename_all = "lowercase")]
pub enum ParentKey {
    Article(ArticleKey),
    Component(ComponentKey),
    Configuration(ConfigurationKey),
    Flight(FlightKey),
}

impl ParentKey {
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Article(_) => ContentKind::Article,
            Self::Component(_) => ContentKind::Component,
            Self::Configuration(_) => ContentKind::Configuration,
            Self::Flight(_) => ContentKind::Flight,
        }
    }
}

/// (parent, author, date)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommentKey {
    pub parent: ParentKey,
    pub author: UserKey,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupFields {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserFields {
    pub email: String,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
    #[serde(default)]
    pub groups: Vec<GroupKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryFields {
    pub on_board: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleFields {
    pub body: String,
    pub author: Option<UserKey>,
    #[serde(default)]
    pub staff: bool,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub superprivate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentFields {
    pub body: String,
    pub author: Option<UserKey>,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub specs: Map<String, Value>,
    pub datasheet: Option<String>,
    pub photo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationFields {
    pub body: String,
    pub author: Option<UserKey>,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub firmware_version: String,
    pub photo: Option<String>,
    #[serde(default)]
    pub components: Vec<ComponentKey>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightFields {
    pub body: String,
    pub author: Option<UserKey>,
    pub configuration: ConfigurationKey,
    #[serde(default)]
    pub meteo: Map<String, Value>,
    pub datalog: Option<String>,
    pub video: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentFields {
    pub content: String,
    pub active: bool,
}

/// One record of the dump artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum DumpRecord {
    Group {
        natural_key: GroupKey,
        #[serde(default)]
        fields: GroupFields,
    },
    User {
        natural_key: UserKey,
        fields: UserFields,
    },
    ComponentCategory {
        natural_key: CategoryKey,
        fields: CategoryFields,
    },
    Article {
        natural_key: ArticleKey,
        fields: ArticleFields,
    },
    Component {
        natural_key: ComponentKey,
        fields: ComponentFields,
    },
    Configuration {
        natural_key: ConfigurationKey,
        fields: ConfigurationFields,
    },
    Flight {
        natural_key: FlightKey,
        fields: FlightFields,
    },
    Comment {
        natural_key: CommentKey,
        fields: CommentFields,
    },
}

impl DumpRecord {
    /// Model tag, as written in the artifact
    pub fn model(&self) -> &'static str {
        match self {
            Self::Group { .. } => "group",
            Self::User { .. } => "user",
            Self::ComponentCategory { .. } => "component_category",
            Self::Article { .. } => "article",
            Self::Component { .. } => "component",
            Self::Configuration { .. } => "configuration",
            Self::Flight { .. } => "flight",
            Self::Comment { .. } => "comment",
        }
    }

    /// Load order: a record only references records of a lower rank.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Group { .. } => 0,
            Self::User { .. } => 1,
            Self::ComponentCategory { .. } => 2,
            Self::Article { .. } => 3,
            Self::Component { .. } => 4,
            Self::Configuration { .. } => 5,
            Self::Flight { .. } => 6,
            Self::Comment { .. } => 7,
        }
    }

    /// Natural key rendered as JSON, for messages
    pub fn key_text(&self) -> String {
        match self {
            Self::Group { natural_key, .. } => key_text(natural_key),
            Self::User { natural_key, .. } => key_text(natural_key),
            Self::ComponentCategory { natural_key, .. } => key_text(natural_key),
            Self::Article { natural_key, .. } => key_text(natural_key),
            Self::Component { natural_key, .. } => key_text(natural_key),
            Self::Configuration { natural_key, .. } => key_text(natural_key),
            Self::Flight { natural_key, .. } => key_text(natural_key),
            Self::Comment { natural_key, .. } => key_text(natural_key),
        }
    }
}

/// JSON text of any natural key, for messages
pub fn key_text<K: Serialize>(key: &K) -> String {
    serde_json::to_string(key).unwrap_or_default()
}

/// Serialize the records as one JSON array
pub fn write_artifact<W: Write>(records: &[DumpRecord], writer: W) -> serde_json::Result<()> {
    let mut writer = std::io::BufWriter::new(writer);
    serde_json::to_writer(&mut writer, records)?;
    writer.flush().map_err(serde_json::Error::io)
}

pub fn read_artifact<R: Read>(reader: R) -> serde_json::Result<Vec<DumpRecord>> {
    serde_json::from_reader(std::io::BufReader::new(reader))
}
