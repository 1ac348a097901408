use log::info;
use serde::{Deserialize, Serialize};

use crate::memory::{MemoryAccess, MemoryError, MemorySession};

pub const STADIUM_NAMES: [&str; 9] = [
    "Mario Stadium",
    "Bowser Castle",
    "Wario City",
    "Yoshi Park",
    "Peach Ice Garden",
    "DK Jungle",
    "Luigi's Mansion",
    "Daisy Cruiser",
    "Bowser Jr. Playroom",
];

pub const INNINGS_CHOICES: [u8; 5] = [1, 3, 5, 7, 9];

pub fn stadium_by_name(name: &str) -> Option<u8> {
    STADIUM_NAMES
        .iter()
        .position(|s| s.eq_ignore_ascii_case(name))
        .map(|idx| idx as u8)
}

/// Match settings outside the lineups.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StadiumRules {
    pub stadium: u8,
    /// 0 = day, 1 = night.
    pub night: u8,
    pub innings: u8,
    pub mercy: u8,
    pub stars: u8,
    pub items: u8,
}

impl Default for StadiumRules {
    fn default() -> Self {
        Self {
            stadium: 0,
            night: 0,
            innings: 9,
            mercy: 1,
            stars: 1,
            items: 0,
        }
    }
}

impl StadiumRules {
    pub fn set_stadium(&mut self, stadium: u8) {
        self.stadium = stadium;
    }

    pub fn set_night(&mut self, night: bool) {
        self.night = u8::from(night);
    }

    pub fn set_innings(&mut self, innings: u8) {
        self.innings = innings;
    }

    pub fn set_mercy(&mut self, on: bool) {
        self.mercy = u8::from(on);
    }

    pub fn set_stars(&mut self, on: bool) {
        self.stars = u8::from(on);
    }

    pub fn set_items(&mut self, on: bool) {
        self.items = u8::from(on);
    }

    pub fn rule_bytes(&self) -> [u8; 4] {
        [self.innings, self.mercy, self.stars, self.items]
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FinalizeAddresses {
    pub stadium: u32,
    /// The day/night flag is mirrored into both cells.
    pub day_night: [u32; 2],
    pub away_captain: u32,
    pub home_captain: u32,
    /// Innings, mercy, stars, items.
    pub rules: [u32; 4],
}

impl FinalizeAddresses {
    pub const MSS: FinalizeAddresses = FinalizeAddresses {
        stadium: 0x811F_769D,
        day_night: [0x811F_769E, 0x811F_769F],
        away_captain: 0x811F_76AC,
        home_captain: 0x811F_76AD,
        rules: [0x8079_4328, 0x8079_4329, 0x8079_432A, 0x8079_432B],
    };
}

impl Default for FinalizeAddresses {
    fn default() -> Self {
        FinalizeAddresses::MSS
    }
}

/// Write stadium, captains and rules in one attach/detach bracket.
/// Captains are captain table indices, not character ids.
pub fn write_settings<M: MemoryAccess + ?Sized>(
    mem: &mut M,
    addrs: &FinalizeAddresses,
    rules: &StadiumRules,
    captains: (u8, u8),
) -> Result<(), MemoryError> {
    info!(
        "writing match settings: stadium {}, night {}, captains {}/{}, rules {:?}",
        rules.stadium,
        rules.night,
        captains.0,
        captains.1,
        rules.rule_bytes()
    );

    let mut session = MemorySession::open(mem)?;
    session.write_byte(addrs.stadium, rules.stadium)?;
    for addr in addrs.day_night {
        session.write_byte(addr, rules.night)?;
    }
    session.write_byte(addrs.away_captain, captains.0)?;
    session.write_byte(addrs.home_captain, captains.1)?;
    for (addr, value) in addrs.rules.iter().zip(rules.rule_bytes()) {
        session.write_byte(*addr, value)?;
    }
    session.finish()
}
