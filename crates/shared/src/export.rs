//! Settings export/import file format.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::settings::Settings;

pub const EXPORT_VERSION: &str = "1.0";

/// Versioned settings backup. The `settings` object reuses the storage
/// schema, so an exported file round-trips byte-for-byte into [`Settings`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportFile {
    pub version: String,
    /// ISO-8601 creation time.
    pub timestamp: String,
    pub settings: Settings,
}

impl ExportFile {
    pub fn new(settings: Settings) -> Self {
        Self {
            version: EXPORT_VERSION.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            settings,
        }
    }

    /// Parse and structurally validate an exported document.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
