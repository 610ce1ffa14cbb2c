use std::path::{Path, PathBuf};

use tracing::{debug, info};

pub const DEFAULT_WORDS: [&str; 8] = [
    "WORSHIP", "OBEY", "LOSER", "WEAK", "PAY", "SUBMIT", "MINE", "CLICK",
];

pub const IMAGE_SLOTS: u32 = 20;
pub const VIDEO_SLOTS: u32 = 5;

/// Media that actually exists under the media root. Missing slots are
/// skipped, so an empty root leaves both lists empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MediaCatalog {
    pub images: Vec<String>,
    pub videos: Vec<String>,
}

impl MediaCatalog {
    pub fn scan<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        let images = preload(root, "img", "jpg", IMAGE_SLOTS);
        let videos = preload(root, "vid", "mp4", VIDEO_SLOTS);
        info!(
            root = %root.display(),
            images = images.len(),
            videos = videos.len(),
            "media_preloaded"
        );
        Self { images, videos }
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.videos.is_empty()
    }
}

fn preload(root: &Path, dir: &str, extension: &str, slots: u32) -> Vec<String> {
    (1..=slots)
        .map(|slot| format!("{dir}/{slot}.{extension}"))
        .filter(|relative| {
            let full: PathBuf = root.join(relative);
            let present = full.is_file();
            if !present {
                debug!(path = %full.display(), "media_slot_missing");
            }
            present
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Catalog {
    pub words: Vec<String>,
    pub media: MediaCatalog,
}

impl Catalog {
    pub fn new(words: Vec<String>, media: MediaCatalog) -> Self {
        Self { words, media }
    }

    pub fn words_only(words: Vec<String>) -> Self {
        Self::new(words, MediaCatalog::default())
    }
}
