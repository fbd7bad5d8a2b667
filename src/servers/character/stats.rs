//! Character classes and their level 1 stats.

use super::CharacterError;

/// The twelve playable classes, by their on-wire id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CharClass {
    Humar = 0x00,
    Hunewearl = 0x01,
    Hucast = 0x02,
    Ramar = 0x03,
    Racast = 0x04,
    Racaseal = 0x05,
    Fomarl = 0x06,
    Fonewm = 0x07,
    Fonewearl = 0x08,
    Hucaseal = 0x09,
    Fomar = 0x0A,
    Ramarl = 0x0B,
}

impl CharClass {
    pub const ALL: [CharClass; 12] = [
        CharClass::Humar,
        CharClass::Hunewearl,
        CharClass::Hucast,
        CharClass::Ramar,
        CharClass::Racast,
        CharClass::Racaseal,
        CharClass::Fomarl,
        CharClass::Fonewm,
        CharClass::Fonewearl,
        CharClass::Hucaseal,
        CharClass::Fomar,
        CharClass::Ramarl,
    ];

    /// Starting stats for a freshly created character of this class.
    pub fn base_stats(self) -> CharacterStats {
        BASE_STATS[self as usize]
    }
}

impl TryFrom<u8> for CharClass {
    type Error = CharacterError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        CharClass::ALL
            .get(id as usize)
            .copied()
            .ok_or(CharacterError::UnknownClass(id))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharacterStats {
    pub atp: u16,
    pub mst: u16,
    pub evp: u16,
    pub hp: u16,
    pub dfp: u16,
    pub ata: u16,
    pub lck: u16,
}

const fn stats(atp: u16, mst: u16, evp: u16, hp: u16, dfp: u16, ata: u16, lck: u16) -> CharacterStats {
    CharacterStats { atp, mst, evp, hp, dfp, ata, lck }
}

// Indexed by class id. Androids (cast/caseal) have no MST.
const BASE_STATS: [CharacterStats; 12] = [
    stats(38, 19, 35, 20, 10, 20, 10), // HUmar
    stats(35, 42, 41, 16, 9, 21, 10),  // HUnewearl
    stats(46, 0, 30, 25, 13, 19, 10),  // HUcast
    stats(33, 25, 38, 18, 10, 27, 10), // RAmar
    stats(39, 0, 33, 22, 12, 25, 10),  // RAcast
    stats(36, 0, 40, 21, 11, 26, 10),  // RAcaseal
    stats(24, 48, 35, 14, 8, 19, 10),  // FOmarl
    stats(22, 53, 36, 13, 7, 18, 10),  // FOnewm
    stats(17, 60, 38, 12, 7, 17, 10),  // FOnewearl
    stats(40, 0, 37, 23, 12, 22, 10),  // HUcaseal
    stats(26, 45, 33, 16, 9, 20, 10),  // FOmar
    stats(31, 28, 40, 17, 9, 28, 10),  // RAmarl
];
