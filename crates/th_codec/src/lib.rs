//! This library converts the individual resource files found inside *Touhou Project*
//! archives between their on-disk form and a form other tools understand.
//!
//! # Resource Formats
//!
//! | Extension     | Codec                | Decoded form                           |
//! |---------------|----------------------|----------------------------------------|
//! | `.cv0` `.cv1` | [`Cv01`]             | plain text / CSV (Shift-JIS)           |
//! | `.cv2`        | [`Cv2`]              | top-down Windows bitmap                |
//! | `.cv3`        | [`Cv3`]              | RIFF/WAVE file                         |
//! | `.pal`        | [`Palette`]          | 256 B, G, R, A colors                  |
//! | card list     | [`CardList`]         | plain text                             |
//! | music room    | [`MusicRoom`]        | plain text                             |
//!
//! Every codec implements [`Codec`], whose `decode` and `encode` are exact inverses of
//! each other for well formed input. [`CodecKind::for_path`] picks the codec matching a
//! file extension.
//!
//! ```
//! use th_codec::{Codec, CodecKind};
//!
//! let codec = CodecKind::for_path("data/csv/story.cv0").unwrap().codec();
//! let plain = codec.decode(&[0xC3, 0x95]).unwrap();
//! assert_eq!(plain, b"Hi");
//! assert_eq!(codec.encode(&plain).unwrap(), [0xC3, 0x95]);
//! ```
//!
//! ## Additional Information
//!
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Text encoding**: text resources are Shift-JIS and are returned as raw bytes

mod bitmap;
pub mod card_list;
pub mod codec;
pub mod cv01;
pub mod cv2;
pub mod cv3;
pub mod error;
pub mod music_room;
pub mod palette;

pub use card_list::CardList;
pub use codec::{Codec, CodecKind};
pub use cv01::Cv01;
pub use cv2::Cv2;
pub use cv3::Cv3;
pub use music_room::MusicRoom;
pub use palette::{ColorTable, Palette};
