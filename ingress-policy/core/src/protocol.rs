//! The envelopes exchanged with the policy host.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// The status code attached to rejections of malformed input.
pub const BAD_REQUEST: u16 = 400;

/// A request to validate the object in an admission request under the given settings.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ValidationRequest {
    #[serde(default)]
    pub request: AdmissionRequest,

    /// The policy settings, as provided by the operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Box<RawValue>>,
}

/// The subset of a Kubernetes admission request that the policy reads.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionRequest {
    #[serde(default)]
    pub uid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object: Option<Box<RawValue>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ValidationResponse {
    pub accepted: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SettingsValidationResponse {
    pub valid: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// === impl ValidationRequest ===

impl ValidationRequest {
    /// The raw settings bytes; empty when no settings were provided.
    pub fn settings_bytes(&self) -> &[u8] {
        self.settings
            .as_deref()
            .map_or(&[][..], |settings| settings.get().as_bytes())
    }
}

// === impl ValidationResponse ===

impl ValidationResponse {
    pub fn accept() -> Self {
        Self {
            accepted: true,
            message: None,
            code: None,
        }
    }

    pub fn reject(message: impl ToString) -> Self {
        Self {
            accepted: false,
            message: Some(message.to_string()),
            code: None,
        }
    }

    /// Rejects input that could not be interpreted.
    pub fn bad_request(message: impl ToString) -> Self {
        Self {
            code: Some(BAD_REQUEST),
            ..Self::reject(message)
        }
    }
}

// === impl SettingsValidationResponse ===

impl SettingsValidationResponse {
    pub fn accept() -> Self {
        Self {
            valid: true,
            message: None,
        }
    }

    pub fn reject(message: impl ToString) -> Self {
        Self {
            valid: false,
            message: Some(message.to_string()),
        }
    }
}
