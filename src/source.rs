use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{CipeWatchError, Result};
use crate::model::Cipe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchErrorKind {
    Authentication,
    Network,
    Other,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Authentication => "authentication",
            Self::Network => "network",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Error reported by the data source alongside (or instead of) CIPE data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchError {
    #[serde(rename = "type")]
    pub kind: FetchErrorKind,
    #[serde(default)]
    pub message: String,
}

impl FetchError {
    pub fn authentication(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Authentication,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: FetchErrorKind::Other,
            message: message.into(),
        }
    }

    pub fn is_authentication(&self) -> bool {
        self.kind == FetchErrorKind::Authentication
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind, self.message)
    }
}

/// Result of one fetch of recent CIPEs.
///
/// `info` is `None` when the source could not produce a snapshot at all, which is
/// different from an empty list of CIPEs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOutcome {
    #[serde(default, rename = "ciPipelineExecutions", alias = "info")]
    pub info: Option<Vec<Cipe>>,
    #[serde(default)]
    pub error: Option<FetchError>,
    #[serde(default)]
    pub workspace_url: Option<String>,
}

impl FetchOutcome {
    pub fn cipes(cipes: Vec<Cipe>) -> Self {
        Self {
            info: Some(cipes),
            ..Self::default()
        }
    }

    pub fn failed(error: FetchError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// The fetched CIPEs, or an empty slice when the fetch produced none.
    pub fn cipes_or_empty(&self) -> &[Cipe] {
        self.info.as_deref().unwrap_or_default()
    }

    pub fn is_authentication_error(&self) -> bool {
        self.error.as_ref().is_some_and(FetchError::is_authentication)
    }
}

/// Source of recent CIPE snapshots, usually backed by the cloud service.
///
/// Implementations own their transport, timeouts and authentication. An `Err`
/// means the fetch itself broke; expected failures such as a rejected token are
/// reported through [`FetchOutcome::error`].
pub trait CipeSource {
    fn fetch_recent(&self) -> impl Future<Output = Result<FetchOutcome>> + Send;
}

/// Reads the CIPE feed from a JSON document on disk on every fetch.
///
/// The document has the shape returned by the cloud endpoint:
/// `{"ciPipelineExecutions": [...], "workspaceUrl": "..."}`, optionally with an
/// `"error": {"type": "authentication", "message": "..."}` entry.
pub struct SnapshotFileSource {
    path: PathBuf,
}

impl SnapshotFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and parses the snapshot document.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid feed document.
    pub async fn load(&self) -> Result<FetchOutcome> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        parse_feed(&contents)
    }
}

impl CipeSource for SnapshotFileSource {
    async fn fetch_recent(&self) -> Result<FetchOutcome> {
        debug!("Reading CIPE snapshot from {}", self.path.display());

        match self.load().await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!("Failed to read CIPE snapshot {}: {e}", self.path.display());
                Ok(FetchOutcome::failed(FetchError::other(e.to_string())))
            }
        }
    }
}

/// Parses a feed document, accepting a bare array of CIPEs as well.
pub fn parse_feed(contents: &str) -> Result<FetchOutcome> {
    if contents.trim_start().starts_with('[') {
        let cipes: Vec<Cipe> = serde_json::from_str(contents)?;
        return Ok(FetchOutcome::cipes(cipes));
    }

    let outcome: FetchOutcome = serde_json::from_str(contents)?;
    if outcome.info.is_none() && outcome.error.is_none() {
        return Err(CipeWatchError::Source(
            "feed document has neither CIPEs nor an error".into(),
        ));
    }
    Ok(outcome)
}
