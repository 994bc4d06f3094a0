//! # Migration Configuration
//!
//! A migration config is owned by the external configuration store. The pipeline
//! reads it by id and never mutates it; jobs carry a snapshot, while workers that
//! talk to the source system re-resolve the live copy so rotated credentials apply.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level migration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Connection to the source system
    pub source: ConnectionConfig,
    /// Ordered data items to migrate
    #[serde(default)]
    pub data_items: Vec<DataItemConfig>,
}

impl MigrationConfig {
    pub fn data_item(&self, data_item_id: &str) -> Option<&DataItemConfig> {
        self.data_items.iter().find(|item| item.id == data_item_id)
    }
}

/// How to reach one analytics instance
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Personal access token; wins over basic credentials when both are set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Resolved authentication scheme for a connection
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    Basic { username: String, password: String },
    Anonymous,
}

impl ConnectionConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: None,
            password: None,
            token: None,
        }
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn credentials(&self) -> Credentials {
        if let Some(token) = self.token.as_ref().filter(|t| !t.is_empty()) {
            return Credentials::Token(token.clone());
        }
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Credentials::Basic {
                username: username.clone(),
                password: password.clone(),
            },
            _ => Credentials::Anonymous,
        }
    }

    /// Base URL without a trailing slash
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Token(_) => write!(f, "Token([REDACTED])"),
            Credentials::Basic { username, .. } => write!(f, "Basic({username}, [REDACTED])"),
            Credentials::Anonymous => write!(f, "Anonymous"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataItemType {
    #[serde(rename = "DX_VALUES")]
    DxValues,
    #[serde(rename = "ATTRIBUTE_VALUES")]
    AttributeValues,
}

/// One source item and the destination item its values land on.
///
/// Destination ids may carry a category option combo suffix (`dataElement.coc`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMapping {
    pub source: String,
    pub destination: String,
}

impl ItemMapping {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// Which source items migrate to which destination items for one data domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataItemConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: DataItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub mapping: Vec<ItemMapping>,
    pub period_type_id: String,
    pub parent_org_unit_id: String,
    pub org_unit_level: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_id: Option<String>,
    #[serde(default)]
    pub attribute_options: Vec<String>,
}

impl DataItemConfig {
    pub fn is_attribute(&self) -> bool {
        self.item_type == DataItemType::AttributeValues
    }

    /// Source item ids in mapping order, duplicates removed
    pub fn source_ids(&self) -> Vec<String> {
        dedup_in_order(self.mapping.iter().map(|m| m.source.as_str()))
    }

    /// Destination item ids in mapping order, duplicates removed
    pub fn destination_ids(&self) -> Vec<String> {
        dedup_in_order(self.mapping.iter().map(|m| m.destination.as_str()))
    }

    /// Destination id for a source id; the first mapping entry wins
    pub fn destination_for(&self, source_id: &str) -> Option<&str> {
        self.mapping
            .iter()
            .find(|m| m.source == source_id)
            .map(|m| m.destination.as_str())
    }
}

fn dedup_in_order<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_item_deserializes_from_store_shape() {
        let json = serde_json::json!({
            "id": "anc",
            "type": "ATTRIBUTE_VALUES",
            "mapping": [
                {"source": "srcA", "destination": "dstA.coc1"},
                {"source": "srcB", "destination": "dstB"}
            ],
            "periodTypeId": "MONTHLY",
            "parentOrgUnitId": "ImspTQPwCqd",
            "orgUnitLevel": 4,
            "attributeId": "attr1",
            "attributeOptions": ["optA", "optB"]
        });

        let item: DataItemConfig = serde_json::from_value(json).unwrap();
        assert!(item.is_attribute());
        assert_eq!(item.attribute_id.as_deref(), Some("attr1"));
        assert_eq!(item.destination_for("srcA"), Some("dstA.coc1"));
        assert_eq!(item.destination_for("missing"), None);
    }

    #[test]
    fn test_id_lists_keep_order_and_drop_duplicates() {
        let item = DataItemConfig {
            id: "x".into(),
            item_type: DataItemType::DxValues,
            name: None,
            mapping: vec![
                ItemMapping::new("b", "d1"),
                ItemMapping::new("a", "d1"),
                ItemMapping::new("b", "d2"),
            ],
            period_type_id: "MONTHLY".into(),
            parent_org_unit_id: "root".into(),
            org_unit_level: 2,
            attribute_id: None,
            attribute_options: vec![],
        };

        assert_eq!(item.source_ids(), vec!["b", "a"]);
        assert_eq!(item.destination_ids(), vec!["d1", "d2"]);
    }

    #[test]
    fn test_credentials_prefer_token_and_redact_debug() {
        let conn = ConnectionConfig::new("https://play.example.org/")
            .with_basic_auth("admin", "district")
            .with_token("d2p_secret");

        assert_eq!(conn.base(), "https://play.example.org");
        assert!(matches!(conn.credentials(), Credentials::Token(_)));

        let debug = format!("{conn:?}");
        assert!(!debug.contains("district"));
        assert!(!debug.contains("d2p_secret"));
    }
}
