//! Versioned format tables: the hand-tuned selections of known format IDs,
//! the cascades for unknown ones, per-format download tuning and the static
//! format list used as a last resort.

mod resolver;

use std::{collections::HashSet, path::Path};

use config::{Config, File, FileFormat};
use miette::{miette, Context, IntoDiagnostic, Result};
use serde::Deserialize;
use tracing::debug;

use crate::types::{ByteRate, StreamKind};

/// Tables shipped with the binary
const BUILTIN_TABLES: &str = include_str!("../../data/formats.toml");

/// Layout version this code understands
pub const TABLE_VERSION: u32 = 1;

#[derive(Debug, Clone, Deserialize)]
pub struct FormatTable {
    version: u32,
    selection: Vec<SelectionEntry>,
    cascade: Cascades,
    #[serde(default)]
    tuning: Vec<Tuning>,
    fallback: Vec<FallbackFormat>,
}

/// Hand-tuned selection of one known format ID
#[derive(Debug, Clone, Deserialize)]
pub struct SelectionEntry {
    pub id: String,
    pub kind: StreamKind,
    /// Audio stream merged with a video-only stream
    #[serde(default)]
    pub companion: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    /// Clauses tried when the exact stream is unavailable
    #[serde(default)]
    pub fallback: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cascades {
    pub audio: Vec<String>,
    pub video: Vec<String>,
}

/// Download tuning applied to a group of format IDs
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tuning {
    pub ids: Vec<String>,
    pub concurrent_fragments: u32,
    pub throttled_rate: ByteRate,
}

/// Entry of the static format list
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackFormat {
    pub itag: u32,
    pub kind: StreamKind,
    pub quality: String,
    pub label: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    /// Video bitrate in kbps
    #[serde(default)]
    pub bitrate: u32,
    /// Audio bitrate in kbps
    #[serde(default)]
    pub audio_bitrate: u32,
}

impl FormatTable {
    /// The tables embedded at build time
    pub fn builtin() -> Result<Self> {
        Self::from_toml(BUILTIN_TABLES).wrap_err("Embedded format tables are invalid")
    }

    /// The embedded tables, or the given replacement file
    pub fn load(formats_file: Option<&Path>) -> Result<Self> {
        match formats_file {
            Some(path) => {
                debug!("Loading format tables from {}", path.display());
                let table = Config::builder()
                    .add_source(File::from(path).format(FileFormat::Toml))
                    .build()
                    .into_diagnostic()
                    .wrap_err_with(|| format!("Could not read {}", path.display()))?
                    .try_deserialize::<Self>()
                    .into_diagnostic()
                    .wrap_err_with(|| format!("Invalid format tables in {}", path.display()))?;
                table.validate()?;
                Ok(table)
            }
            None => Self::builtin(),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let table = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .into_diagnostic()?
            .try_deserialize::<Self>()
            .into_diagnostic()
            .wrap_err("Could not parse format tables")?;

        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<()> {
        if self.version != TABLE_VERSION {
            return Err(miette!(
                "Unsupported format table version {} (expected {TABLE_VERSION})",
                self.version
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.selection {
            if !seen.insert(entry.id.as_str()) {
                return Err(miette!("Format ID {} is listed twice", entry.id));
            }

            match (entry.kind, &entry.companion) {
                (StreamKind::Video, None) => {
                    return Err(miette!(
                        "Video-only format {} has no companion audio stream",
                        entry.id
                    ))
                }
                (StreamKind::Audio | StreamKind::Combined, Some(companion)) => {
                    return Err(miette!(
                        "Format {} already has audio but lists companion {companion}",
                        entry.id
                    ))
                }
                _ => {}
            }
        }

        Ok(())
    }

    pub fn selection(&self, id: &str) -> Option<&SelectionEntry> {
        self.selection.iter().find(|entry| entry.id == id)
    }

    /// Download tuning of the format, if it belongs to a tuned group
    pub fn tuning(&self, id: &str) -> Option<&Tuning> {
        self.tuning
            .iter()
            .find(|tuning| tuning.ids.iter().any(|tuned| tuned == id))
    }

    pub fn fallback_formats(&self) -> &[FallbackFormat] {
        &self.fallback
    }
}
