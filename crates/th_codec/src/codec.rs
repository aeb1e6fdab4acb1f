//! Common interface shared by every resource codec.

use std::path::Path;

use derive_more::Display;

use crate::error::Result;
use crate::{CardList, Cv01, Cv2, Cv3, MusicRoom, Palette};

/// A reversible transform between the on-disk bytes of a resource and its usable form
pub trait Codec {
    /// Turn on-disk bytes into their usable form
    fn decode(&self, input: &[u8]) -> Result<Vec<u8>>;

    /// Turn usable bytes back into their on-disk form
    fn encode(&self, input: &[u8]) -> Result<Vec<u8>>;
}

/// Identifies one of the codecs provided by this crate
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CodecKind {
    #[display("cv0/cv1")]
    Cv01,
    #[display("cv2")]
    Cv2,
    #[display("cv3")]
    Cv3,
    #[display("palette")]
    Palette,
    #[display("card list")]
    CardList,
    #[display("music room")]
    MusicRoom,
}

impl CodecKind {
    /// Pick the codec conventionally used for a file, judging by its extension
    ///
    /// The text ciphers share extensions with plain files and are never selected here.
    pub fn for_path(path: impl AsRef<Path>) -> Option<CodecKind> {
        let extension = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "cv0" | "cv1" => Some(CodecKind::Cv01),
            "cv2" => Some(CodecKind::Cv2),
            "cv3" => Some(CodecKind::Cv3),
            "pal" => Some(CodecKind::Palette),
            _ => None,
        }
    }

    /// The extension a decoded file of this kind is usually given
    pub fn decoded_extension(&self) -> &'static str {
        match self {
            CodecKind::Cv01 | CodecKind::CardList | CodecKind::MusicRoom => "txt",
            CodecKind::Cv2 => "bmp",
            CodecKind::Cv3 => "wav",
            CodecKind::Palette => "act",
        }
    }

    /// Build the codec with its default settings
    pub fn codec(&self) -> Box<dyn Codec + Send + Sync> {
        match self {
            CodecKind::Cv01 => Box::new(Cv01),
            CodecKind::Cv2 => Box::new(Cv2::default()),
            CodecKind::Cv3 => Box::new(Cv3),
            CodecKind::Palette => Box::new(Palette),
            CodecKind::CardList => Box::new(CardList),
            CodecKind::MusicRoom => Box::new(MusicRoom),
        }
    }
}
