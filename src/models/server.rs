// src/models/server.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

/// Server-reported metadata, as returned by an info query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub address: SocketAddr,
    pub name: String,
    #[serde(default)]
    pub map: String,
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub app_id: u32,
    #[serde(default)]
    pub players: u32,
    #[serde(default)]
    pub max_players: u32,
    #[serde(default)]
    pub bots: u32,
    #[serde(default)]
    pub server_type: String,
    #[serde(default)]
    pub environment: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_secure: bool,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub ping: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    #[serde(default)]
    pub score: i32,
    #[serde(default)]
    pub time: f32,
}

/// One raw rule pair as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub value: String,
}

impl Rule {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Opaque geo location attached for display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub country_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// A display value computed by a game extension for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}
