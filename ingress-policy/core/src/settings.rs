use crate::protocol::SettingsValidationResponse;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Configures how an ingress's backends are checked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Rejects ingresses that reference services that do not exist.
    pub enforce_service_exists: bool,

    /// Asks the host to bypass its resource cache when looking up services.
    pub disable_cache: bool,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot parse settings JSON: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("nested settings contains empty signatures")]
    EmptySignatures,
}

/// The current settings shape, with each field at the top level. Unknown keys are ignored.
#[derive(Debug, Default, Deserialize)]
struct Flat {
    enforce_service_exists: Option<bool>,
    disable_cache: Option<bool>,
}

/// The legacy shape, which wraps the settings in a `signatures` list.
#[derive(Debug, Deserialize)]
struct Nested {
    signatures: Vec<Settings>,
}

#[derive(Debug)]
enum Format {
    Flat(Flat),
    Nested(Nested),
}

// === impl Settings ===

impl Default for Settings {
    fn default() -> Self {
        Self {
            enforce_service_exists: true,
            disable_cache: false,
        }
    }
}

impl Settings {
    /// Resolves the settings embedded in a validation request.
    ///
    /// Absent settings resolve to the defaults. Otherwise the flat shape is tried before the
    /// legacy nested shape, and fields omitted by either are left at their defaults.
    pub fn resolve(raw: &[u8]) -> Result<Self, SettingsError> {
        if raw.is_empty() {
            return Ok(Self::default());
        }

        let value = serde_json::from_slice::<serde_json::Value>(raw)
            .map_err(SettingsError::Malformed)?;
        if value.is_null() {
            return Ok(Self::default());
        }

        match Format::decode(&value).map_err(SettingsError::Malformed)? {
            Format::Flat(flat) => Ok(flat.overlay(Self::default())),
            Format::Nested(Nested { signatures }) => signatures
                .into_iter()
                .next()
                .ok_or(SettingsError::EmptySignatures),
        }
    }
}

// === impl Flat ===

impl Flat {
    fn overlay(self, mut settings: Settings) -> Settings {
        if let Some(enforce) = self.enforce_service_exists {
            settings.enforce_service_exists = enforce;
        }
        if let Some(disable_cache) = self.disable_cache {
            settings.disable_cache = disable_cache;
        }
        settings
    }
}

// === impl Format ===

impl Format {
    /// Documents with a `signatures` key use the legacy shape; all others are flat.
    fn decode(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        if value.get("signatures").is_some() {
            return Nested::deserialize(value).map(Self::Nested);
        }
        Flat::deserialize(value).map(Self::Flat)
    }
}

/// Validates settings when the policy is loaded.
///
/// This only checks that the settings decode as a flat record; it applies neither the legacy
/// shape nor request-time defaults.
pub fn validate_settings(raw: &[u8]) -> SettingsValidationResponse {
    match serde_json::from_slice::<Settings>(raw) {
        Ok(settings) => {
            debug!(?settings, "Settings are valid");
            SettingsValidationResponse::accept()
        }
        Err(error) => {
            SettingsValidationResponse::reject(format!("Provided settings are not valid: {error}"))
        }
    }
}
