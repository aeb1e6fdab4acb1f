//! Supported titles and the archive layout each of them uses

use std::str::FromStr;

use derive_more::Display;

use crate::container::Container;
use crate::embedded::Embedded;
use crate::error::Error;
use crate::fighting::Fighting;
use crate::pbg::Pbg;
use crate::pc98::{Pc98, Revision};

/// A title of the series whose archives can be read and created
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GameId {
    /// Highly Responsive to Prayers
    #[display("th01")]
    Th01,
    /// Story of Eastern Wonderland
    #[display("th02")]
    Th02,
    /// Phantasmagoria of Dim.Dream
    #[display("th03")]
    Th03,
    /// Lotus Land Story
    #[display("th04")]
    Th04,
    /// Mystic Square
    #[display("th05")]
    Th05,
    /// Embodiment of Scarlet Devil
    #[display("th06")]
    Th06,
    /// Immaterial and Missing Power
    #[display("th075")]
    Th075,
}

/// Archive layouts, each implemented by one [`Container`]
#[derive(Debug, Display, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Format {
    /// Table appended to the game executable
    #[display("executable-embedded")]
    Embedded,
    /// PC-98 compressed table
    #[display("pc-98 ({_0})")]
    Pc98(Revision),
    /// PBG3 header and trailing table
    #[display("pbg")]
    Pbg,
    /// Flat table of the fighting games
    #[display("fighting")]
    Fighting,
}

static EMBEDDED: Embedded = Embedded;
static PC98_REV1: Pc98 = Pc98::new(Revision::Rev1);
static PC98_REV2: Pc98 = Pc98::new(Revision::Rev2);
static PBG: Pbg = Pbg;
static FIGHTING: Fighting = Fighting;

impl Format {
    /// The implementation reading and writing this layout
    pub fn container(self) -> &'static dyn Container {
        match self {
            Format::Embedded => &EMBEDDED,
            Format::Pc98(Revision::Rev1) => &PC98_REV1,
            Format::Pc98(Revision::Rev2) => &PC98_REV2,
            Format::Pbg => &PBG,
            Format::Fighting => &FIGHTING,
        }
    }
}

impl GameId {
    /// Every supported title, oldest first
    pub const ALL: [GameId; 7] = [
        GameId::Th01,
        GameId::Th02,
        GameId::Th03,
        GameId::Th04,
        GameId::Th05,
        GameId::Th06,
        GameId::Th075,
    ];

    /// Layout of this title's archives
    pub fn format(self) -> Format {
        match self {
            GameId::Th01 => Format::Embedded,
            GameId::Th02 => Format::Pc98(Revision::Rev1),
            GameId::Th03 | GameId::Th04 | GameId::Th05 => Format::Pc98(Revision::Rev2),
            GameId::Th06 => Format::Pbg,
            GameId::Th075 => Format::Fighting,
        }
    }

    /// English title of the game
    pub fn title(self) -> &'static str {
        match self {
            GameId::Th01 => "Highly Responsive to Prayers",
            GameId::Th02 => "Story of Eastern Wonderland",
            GameId::Th03 => "Phantasmagoria of Dim.Dream",
            GameId::Th04 => "Lotus Land Story",
            GameId::Th05 => "Mystic Square",
            GameId::Th06 => "Embodiment of Scarlet Devil",
            GameId::Th075 => "Immaterial and Missing Power",
        }
    }

    /// XOR keys used when creating PC-98 archives, as `(payload, table)`
    pub(crate) fn pc98_keys(self) -> (u8, u8) {
        match self {
            GameId::Th02 => (0x12, 0x00),
            GameId::Th03 => (0x34, 0x12),
            GameId::Th04 => (0x34, 0x56),
            GameId::Th05 => (0x34, 0x78),
            _ => (0x00, 0x00),
        }
    }
}

impl FromStr for GameId {
    type Err = Error;

    /// Parse names such as `th06`, `TH075` or `6`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let number = lower.strip_prefix("th").unwrap_or(&lower);
        match number {
            "01" | "1" => Ok(GameId::Th01),
            "02" | "2" => Ok(GameId::Th02),
            "03" | "3" => Ok(GameId::Th03),
            "04" | "4" => Ok(GameId::Th04),
            "05" | "5" => Ok(GameId::Th05),
            "06" | "6" => Ok(GameId::Th06),
            "075" | "7.5" => Ok(GameId::Th075),
            _ => Err(Error::Unsupported(format!("unknown game {s}"))),
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::entry::SizeRule;
    use crate::game::{Format, GameId};
    use crate::pc98::Revision;

    #[test]
    fn formats() {
        assert_eq!(GameId::Th01.format(), Format::Embedded);
        assert_eq!(GameId::Th02.format(), Format::Pc98(Revision::Rev1));
        assert_eq!(GameId::Th04.format(), Format::Pc98(Revision::Rev2));
        assert_eq!(GameId::Th06.format(), Format::Pbg);
        assert_eq!(GameId::Th075.format(), Format::Fighting);
    }

    #[test]
    fn size_rules() {
        let rules: Vec<_> = GameId::ALL
            .iter()
            .map(|game| game.format().container().size_rule())
            .collect();
        assert_eq!(
            rules,
            vec![
                SizeRule::LowerBound,
                SizeRule::LowerBound,
                SizeRule::LowerBound,
                SizeRule::LowerBound,
                SizeRule::LowerBound,
                SizeRule::Exact,
                SizeRule::Exact,
            ]
        );
    }

    #[test]
    fn parse_names() {
        assert_eq!("th06".parse::<GameId>().ok(), Some(GameId::Th06));
        assert_eq!("TH075".parse::<GameId>().ok(), Some(GameId::Th075));
        assert_eq!("3".parse::<GameId>().ok(), Some(GameId::Th03));
        assert!("th19".parse::<GameId>().is_err());
        assert_eq!(GameId::Th075.to_string(), "th075");
        assert_eq!(Format::Pc98(Revision::Rev2).to_string(), "pc-98 (rev. 2)");
    }
}
