mod format_spec;
mod rate;
mod selection;
mod video_info;

pub use format_spec::{container_from_mime, FormatSpec, Itag, StreamKind};
pub use rate::ByteRate;
pub use selection::{Clause, FormatSelection};
pub use video_info::{thumbnail_url, VideoInfo, UNKNOWN_AUTHOR, UNKNOWN_TITLE};
