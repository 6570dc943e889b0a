use crate::types::{Clause, FormatSelection, StreamKind};

use super::FormatTable;

const BEST: &str = "best";
const BEST_AUDIO: &str = "bestaudio";

impl FormatTable {
    /// Whether the format ID is a known audio-only stream
    pub fn is_audio_only(&self, id: &str) -> bool {
        self.selection(id)
            .is_some_and(|entry| entry.kind == StreamKind::Audio)
    }

    /// Turn a requested format ID into a selection yt-dlp can evaluate.
    ///
    /// Known IDs get their hand-tuned selection: the exact stream (merged with
    /// its companion audio for video-only streams), then the best stream of the
    /// same resolution. Unknown IDs get the generic audio or video cascade.
    /// Either way the selection ends with a catch-all.
    pub fn resolve(&self, id: &str, is_audio_only: bool) -> FormatSelection {
        if let Some(entry) = self.selection(id) {
            let primary = match &entry.companion {
                Some(companion) => Clause::merged(&entry.id, companion),
                None => Clause::new(entry.id.as_str()),
            };

            let clauses = std::iter::once(primary)
                .chain(entry.fallback.iter().map(Clause::new))
                .collect();

            let catch_all = match entry.kind {
                StreamKind::Audio => BEST_AUDIO,
                StreamKind::Video | StreamKind::Combined => BEST,
            };

            return FormatSelection::new(clauses, Clause::new(catch_all));
        }

        let (cascade, catch_all) = if is_audio_only {
            (&self.cascade.audio, BEST_AUDIO)
        } else {
            (&self.cascade.video, BEST)
        };

        FormatSelection::new(
            cascade.iter().map(Clause::new).collect(),
            Clause::new(catch_all),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> FormatTable {
        FormatTable::builtin().unwrap()
    }

    #[test]
    fn video_pairs_with_companion_audio() {
        let table = table();

        let cases = [
            ("313", "313+325/best[height=2160][ext=mp4]/best[height=2160]/best"),
            ("303", "303+325/best[height=2160][ext=webm]/best[height=2160]/best"),
            ("266", "266+325/best[height=1440][ext=mp4]/best[height=1440]/best"),
            ("137", "137+141/best[height=1080][ext=mp4]/best[height=1080]/best"),
            ("248", "248+251/best[height=1080][ext=webm]/best[height=1080]/best"),
            ("135", "135+140/best[height=480][ext=mp4]/best[height=480]/best"),
            ("160", "160+140/best[height=144][ext=mp4]/best[height=144]/best"),
            ("278", "278+251/best[height=144][ext=webm]/best[height=144]/best"),
        ];

        for (id, expected) in cases {
            assert_eq!(table.resolve(id, false).to_string(), expected, "format {id}");
        }
    }

    #[test]
    fn audio_and_combined_entries() {
        let table = table();

        assert_eq!(
            table.resolve("140", true).to_string(),
            "140/bestaudio[ext=m4a]/bestaudio"
        );
        assert_eq!(
            table.resolve("251", true).to_string(),
            "251/bestaudio[ext=webm]/bestaudio"
        );
        assert_eq!(
            table.resolve("22", false).to_string(),
            "22/best[height<=720][ext=mp4]/best[height<=720]/best"
        );
        assert_eq!(
            table.resolve("18", false).to_string(),
            "18/best[height<=360][ext=mp4]/best[height<=360]/best"
        );
    }

    #[test]
    fn known_ids_ignore_audio_flag() {
        let table = table();
        assert_eq!(table.resolve("137", true), table.resolve("137", false));
    }

    #[test]
    fn unknown_audio_uses_bitrate_cascade() {
        let selection = table().resolve("12345", true);
        assert_eq!(
            selection.to_string(),
            "bestaudio[ext=m4a]/bestaudio[ext=webm]/bestaudio[abr>256]/bestaudio[abr>192]\
             /bestaudio[abr>160]/bestaudio[abr>128]/bestaudio"
        );
        assert!(selection
            .clauses()
            .iter()
            .all(|clause| clause.as_str().starts_with("bestaudio")));
    }

    #[test]
    fn unknown_video_uses_resolution_cascade() {
        let selection = table().resolve("12345", false);
        assert_eq!(selection.first().as_str(), "best[height>=2160][width>=3840]");
        assert_eq!(selection.clauses().len(), 7);
        assert_eq!(selection.last().as_str(), "best");
    }

    #[test]
    fn every_known_id_leads_with_its_stream_and_ends_with_catch_all() {
        let table = table();

        for entry in &table.selection {
            let selection = table.resolve(&entry.id, table.is_audio_only(&entry.id));

            let expected_first = match &entry.companion {
                Some(companion) => format!("{}+{companion}", entry.id),
                None => entry.id.clone(),
            };
            assert_eq!(selection.first().as_str(), expected_first);
            assert!(selection.last().is_catch_all(), "format {}", entry.id);
            // Only the last clause is unconditional
            assert!(selection.clauses()[..selection.clauses().len() - 1]
                .iter()
                .all(|clause| !clause.is_catch_all()));
        }
    }

    #[test]
    fn audio_only_ids() {
        let table = table();
        for id in ["140", "141", "251", "250", "249", "256", "325"] {
            assert!(table.is_audio_only(id), "format {id}");
        }
        for id in ["137", "22", "unknown"] {
            assert!(!table.is_audio_only(id), "format {id}");
        }
    }
}
