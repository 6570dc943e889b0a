//! What the programs print on stdout for their callers

use std::{path::Path, process::ExitCode};

use serde::Serialize;

use crate::{
    extract::{Extraction, Stage},
    types::{FormatSpec, VideoInfo},
};

/// Label of the `method` field, kept as-is for existing consumers
pub const METHOD_LABEL: &str = "Python extraction";

/// JSON document printed by the info program
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum InfoReport<'a> {
    Success {
        success: bool,
        #[serde(rename = "videoInfo")]
        video_info: &'a VideoInfo,
        formats: &'a [FormatSpec],
        method: &'static str,
        stage: Stage,
    },
    Failure {
        success: bool,
        error: String,
        method: &'static str,
    },
}

impl<'a> InfoReport<'a> {
    pub fn success(extraction: &'a Extraction) -> Self {
        InfoReport::Success {
            success: true,
            video_info: &extraction.info,
            formats: &extraction.formats,
            method: METHOD_LABEL,
            stage: extraction.stage,
        }
    }

    pub fn failure<D: std::fmt::Display>(error: D) -> Self {
        InfoReport::Failure {
            success: false,
            error: error.to_string(),
            method: METHOD_LABEL,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InfoReport::Success { .. })
    }

    pub fn to_json(&self) -> String {
        // Serializing plain strings, numbers and booleans cannot fail
        serde_json::to_string_pretty(self).unwrap_or_else(|err| {
            format!(r#"{{"success": false, "error": "{err}", "method": "{METHOD_LABEL}"}}"#)
        })
    }

    pub fn exit_code(&self) -> ExitCode {
        exit_code(self.is_success())
    }
}

/// Status line printed by the download program
pub fn download_status(output: &Path, success: bool) -> String {
    if success {
        format!("SUCCESS: Video downloaded to {}", output.display())
    } else {
        "FAILED: Video download failed".to_owned()
    }
}

/// Process status: 0 on success, 1 on any failure
pub fn status_code(success: bool) -> u8 {
    if success {
        0
    } else {
        1
    }
}

pub fn exit_code(success: bool) -> ExitCode {
    ExitCode::from(status_code(success))
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;
    use crate::types::Itag;

    fn extraction() -> Extraction {
        Extraction {
            info: VideoInfo::placeholder("ABC123"),
            formats: vec![FormatSpec {
                itag: Itag::Number(140),
                quality: "medium".to_owned(),
                quality_label: "128kbps".to_owned(),
                mime_type: "audio/mp4".to_owned(),
                container: "m4a".to_owned(),
                has_video: false,
                has_audio: true,
                width: None,
                height: None,
                bitrate: Some(0.0),
                audio_bitrate: Some(128.0),
                url: Some("https://www.youtube.com/watch?v=ABC123&itag=140".to_owned()),
            }],
            stage: Stage::StaticFallback,
        }
    }

    #[test]
    fn success_json() {
        let extraction = extraction();
        let report = InfoReport::success(&extraction);
        assert!(report.is_success());

        let json: Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["method"], "Python extraction");
        assert_eq!(json["stage"], "static_fallback");
        assert_eq!(json["videoInfo"]["videoId"], "ABC123");
        assert_eq!(json["videoInfo"]["title"], "Unknown Title");
        assert_eq!(json["videoInfo"]["views"], "0");
        assert_eq!(json["videoInfo"]["uploadDate"], "");

        let format = &json["formats"][0];
        assert_eq!(format["itag"], 140);
        assert_eq!(format["qualityLabel"], "128kbps");
        assert_eq!(format["mimeType"], "audio/mp4");
        assert_eq!(format["hasVideo"], false);
        assert_eq!(format["hasAudio"], true);
        assert_eq!(format["audioBitrate"], 128.0);
        assert!(format["width"].is_null());
    }

    #[test]
    fn failure_json() {
        let report = InfoReport::failure("Failed to extract video information");
        assert!(!report.is_success());

        let json: Value = serde_json::from_str(&report.to_json()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Failed to extract video information");
        assert_eq!(json["method"], "Python extraction");
        assert!(json.get("stage").is_none());
    }

    #[test]
    fn status_lines() {
        assert_eq!(
            download_status(Path::new("/tmp/v.mp4"), true),
            "SUCCESS: Video downloaded to /tmp/v.mp4"
        );
        assert_eq!(
            download_status(Path::new("/tmp/v.mp4"), false),
            "FAILED: Video download failed"
        );
        assert_eq!(status_code(true), 0);
        assert_eq!(status_code(false), 1);
    }
}
