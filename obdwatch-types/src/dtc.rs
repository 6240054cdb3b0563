//! Diagnostic trouble codes.
//!
//! Bridges report stored codes either as bare identifiers (`"P0301"`) or as
//! annotated records. [`DiagnosticTroubleCode`] accepts both on the wire;
//! [`DtcEntry`] is the one shape consumers work with.

use serde::{Deserialize, Serialize};

/// A trouble code as received: bare identifier or annotated record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiagnosticTroubleCode {
    Code(String),
    Detailed(DtcEntry),
}

impl DiagnosticTroubleCode {
    /// The code identifier regardless of representation.
    pub fn code(&self) -> &str {
        match self {
            DiagnosticTroubleCode::Code(code) => code,
            DiagnosticTroubleCode::Detailed(entry) => &entry.code,
        }
    }
}

/// Display shape of a trouble code: `{code, status|null, description|null}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtcEntry {
    pub code: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl DtcEntry {
    /// An entry with only the identifier known.
    pub fn bare(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            status: None,
            description: None,
        }
    }

    /// Vehicle system the code belongs to, from its leading letter.
    pub fn system(&self) -> DtcSystem {
        match self.code.chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('P') => DtcSystem::Powertrain,
            Some('C') => DtcSystem::Chassis,
            Some('B') => DtcSystem::Body,
            Some('U') => DtcSystem::Network,
            _ => DtcSystem::Unknown,
        }
    }
}

impl From<DiagnosticTroubleCode> for DtcEntry {
    fn from(dtc: DiagnosticTroubleCode) -> Self {
        match dtc {
            DiagnosticTroubleCode::Code(code) => DtcEntry::bare(code),
            DiagnosticTroubleCode::Detailed(entry) => entry,
        }
    }
}

/// The vehicle system encoded in the first character of a code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DtcSystem {
    Powertrain,
    Chassis,
    Body,
    Network,
    Unknown,
}
