use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Players per team. Every lineup the client accepts is exactly this size.
pub const TEAM_SIZE: usize = 9;

/// Character ids below this value are fixed roster characters; ids at or
/// above it index into the loaded Mii registry (`id - MII_START_INDEX`).
pub const MII_START_INDEX: u16 = 77;

pub const CHARACTER_NAMES: [&str; MII_START_INDEX as usize] = [
    "Mario",
    "Luigi",
    "Donkey Kong",
    "Diddy Kong",
    "Peach",
    "Daisy",
    "Green Yoshi",
    "Baby Mario",
    "Baby Luigi",
    "Bowser",
    "Wario",
    "Waluigi",
    "Green Koopa Troopa",
    "Red Toad",
    "Boo",
    "Toadette",
    "Red Shy Guy",
    "Birdo",
    "Monty Mole",
    "Bowser Jr.",
    "Red Koopa Paratroopa",
    "Blue Pianta",
    "Red Pianta",
    "Yellow Pianta",
    "Blue Noki",
    "Red Noki",
    "Green Noki",
    "Hammer Bro",
    "Toadsworth",
    "Blue Toad",
    "Yellow Toad",
    "Green Toad",
    "Purple Toad",
    "Blue Magikoopa",
    "Red Magikoopa",
    "Green Magikoopa",
    "Yellow Magikoopa",
    "King Boo",
    "Petey Piranha",
    "Dixie Kong",
    "Goomba",
    "Paragoomba",
    "Red Koopa Troopa",
    "Green Koopa Paratroopa",
    "Blue Shy Guy",
    "Yellow Shy Guy",
    "Green Shy Guy",
    "Gray Shy Guy",
    "Gray Dry Bones",
    "Green Dry Bones",
    "Dark Bones",
    "Blue Dry Bones",
    "Fire Bro",
    "Boomerang Bro",
    "Wiggler",
    "Blooper",
    "Funky Kong",
    "Tiny Kong",
    "Green Kritter",
    "Blue Kritter",
    "Red Kritter",
    "Brown Kritter",
    "King K. Rool",
    "Baby Peach",
    "Baby Daisy",
    "Baby DK",
    "Red Yoshi",
    "Blue Yoshi",
    "Yellow Yoshi",
    "Light Blue Yoshi",
    "Pink Yoshi",
    "Unused Yoshi 2",
    "Unused Yoshi",
    "Unused Toad",
    "Unused Pianta",
    "Unused Kritter",
    "Unused Koopa",
];

/// Fielding position abbreviations, indexed by fielding position.
pub const POSITION_NAMES: [&str; TEAM_SIZE] = ["P", "C", "1B", "2B", "3B", "SS", "LF", "CF", "RF"];

pub fn character_id_by_name(name: &str) -> Option<u16> {
    CHARACTER_NAMES
        .iter()
        .position(|n| *n == name)
        .map(|idx| idx as u16)
}

pub fn position_by_name(name: &str) -> Option<u8> {
    POSITION_NAMES
        .iter()
        .position(|n| *n == name)
        .map(|idx| idx as u8)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Side {
    Away,
    Home,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Away => f.write_str("Away"),
            Side::Home => f.write_str("Home"),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub character_id: u16,
    pub batting_order: u8,
    pub fielding_position: u8,
}

impl Player {
    pub fn new(character_id: u16, batting_order: u8, fielding_position: u8) -> Self {
        Self {
            character_id,
            batting_order,
            fielding_position,
        }
    }

    pub fn is_mii(&self) -> bool {
        self.character_id >= MII_START_INDEX
    }

    /// Index of this player's identity in the Mii registry, if it is a Mii.
    pub fn mii_index(&self) -> Option<usize> {
        self.character_id
            .checked_sub(MII_START_INDEX)
            .map(usize::from)
    }
}

/// A lineup in roster order. The first entry is the designated first batter
/// used for captain resolution.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub players: Vec<Player>,
}

impl Team {
    pub fn new(players: Vec<Player>) -> Self {
        Self { players }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Player> {
        self.players.iter()
    }

    /// Mii players in roster order.
    pub fn miis(&self) -> Vec<Player> {
        self.players.iter().copied().filter(Player::is_mii).collect()
    }

    /// One line per player in batting order: `name - position`.
    pub fn summary(&self, name_of: impl Fn(u16) -> String) -> String {
        let mut sorted = self.players.clone();
        sorted.sort_by_key(|p| p.batting_order);

        let mut out = String::new();
        for p in sorted {
            let pos = POSITION_NAMES
                .get(usize::from(p.fielding_position))
                .copied()
                .unwrap_or("?");
            out.push_str(&format!("{} - {}\n", name_of(p.character_id), pos));
        }
        out
    }
}

impl<'a> IntoIterator for &'a Team {
    type Item = &'a Player;
    type IntoIter = std::slice::Iter<'a, Player>;

    fn into_iter(self) -> Self::IntoIter {
        self.players.iter()
    }
}

/// Reasons a lineup cannot be handed to the automation. Player numbers are
/// 1-based, matching how lineups are presented to users.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ValidationError {
    #[error("expected {expected} players, found {found}")]
    WrongSize { expected: usize, found: usize },

    #[error("player {player} has invalid character ID ({id}); a Mii may have failed to load")]
    InvalidCharacter { player: usize, id: u16 },

    #[error("player {player} has invalid batting position ({value})")]
    InvalidBatting { player: usize, value: u8 },

    #[error("duplicate batting position {value}")]
    DuplicateBatting { value: u8 },

    #[error("player {player} has invalid fielding position ({value})")]
    InvalidFielding { player: usize, value: u8 },

    #[error("duplicate fielding position {value}")]
    DuplicateFielding { value: u8 },

    #[error("missing batting position(s): {missing:?}")]
    MissingBatting { missing: Vec<u8> },

    #[error("missing fielding position(s): {missing:?}")]
    MissingFielding { missing: Vec<u8> },
}

/// Check that `team` is a complete lineup: nine players, every character id
/// within `0..=last_valid_id`, and batting orders and fielding positions each
/// a permutation of `0..9`.
///
/// The automation never re-validates, so callers must gate on this.
pub fn validate(team: &Team, last_valid_id: u16) -> Result<(), ValidationError> {
    if team.len() != TEAM_SIZE {
        return Err(ValidationError::WrongSize {
            expected: TEAM_SIZE,
            found: team.len(),
        });
    }

    let mut batting = [false; TEAM_SIZE];
    let mut fielding = [false; TEAM_SIZE];

    for (idx, p) in team.iter().enumerate() {
        let player = idx + 1;

        if p.character_id > last_valid_id {
            return Err(ValidationError::InvalidCharacter {
                player,
                id: p.character_id,
            });
        }

        let bat = usize::from(p.batting_order);
        if bat >= TEAM_SIZE {
            return Err(ValidationError::InvalidBatting {
                player,
                value: p.batting_order,
            });
        }
        if batting[bat] {
            return Err(ValidationError::DuplicateBatting {
                value: p.batting_order,
            });
        }
        batting[bat] = true;

        let fld = usize::from(p.fielding_position);
        if fld >= TEAM_SIZE {
            return Err(ValidationError::InvalidFielding {
                player,
                value: p.fielding_position,
            });
        }
        if fielding[fld] {
            return Err(ValidationError::DuplicateFielding {
                value: p.fielding_position,
            });
        }
        fielding[fld] = true;
    }

    // Nine distinct in-range values always cover 0..9; these only trip if
    // TEAM_SIZE and the permutation range ever diverge.
    let missing_bat = missing_slots(&batting);
    if !missing_bat.is_empty() {
        return Err(ValidationError::MissingBatting {
            missing: missing_bat,
        });
    }
    let missing_fld = missing_slots(&fielding);
    if !missing_fld.is_empty() {
        return Err(ValidationError::MissingFielding {
            missing: missing_fld,
        });
    }

    Ok(())
}

fn missing_slots(seen: &[bool; TEAM_SIZE]) -> Vec<u8> {
    seen.iter()
        .enumerate()
        .filter(|(_, s)| !**s)
        .map(|(i, _)| i as u8)
        .collect()
}

#[cfg(test)]
pub(crate) fn straight_team(character_id: u16) -> Team {
    Team::new(
        (0..TEAM_SIZE as u8)
            .map(|i| Player::new(character_id, i, i))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    const LAST_ID: u16 = MII_START_INDEX - 1;

    #[test]
    fn accepts_straight_lineup() {
        assert_eq!(validate(&straight_team(0), LAST_ID), Ok(()));
    }

    #[test]
    fn rejects_short_team() {
        let mut team = straight_team(0);
        team.players.pop();
        assert_eq!(
            validate(&team, LAST_ID),
            Err(ValidationError::WrongSize {
                expected: 9,
                found: 8
            })
        );
    }

    #[test]
    fn rejects_unloaded_mii() {
        let mut team = straight_team(0);
        team.players[4].character_id = MII_START_INDEX + 3;
        assert_eq!(
            validate(&team, MII_START_INDEX + 2),
            Err(ValidationError::InvalidCharacter { player: 5, id: 80 })
        );
        assert_eq!(validate(&team, MII_START_INDEX + 3), Ok(()));
    }

    #[test]
    fn rejects_duplicate_batting_and_fielding() {
        let mut team = straight_team(0);
        team.players[8].batting_order = 0;
        assert_eq!(
            validate(&team, LAST_ID),
            Err(ValidationError::DuplicateBatting { value: 0 })
        );

        let mut team = straight_team(0);
        team.players[2].fielding_position = 1;
        assert_eq!(
            validate(&team, LAST_ID),
            Err(ValidationError::DuplicateFielding { value: 1 })
        );
    }

    #[test]
    fn rejects_out_of_range_positions() {
        let mut team = straight_team(0);
        team.players[0].batting_order = 9;
        assert_eq!(
            validate(&team, LAST_ID),
            Err(ValidationError::InvalidBatting {
                player: 1,
                value: 9
            })
        );

        let mut team = straight_team(0);
        team.players[3].fielding_position = 12;
        assert_eq!(
            validate(&team, LAST_ID),
            Err(ValidationError::InvalidFielding {
                player: 4,
                value: 12
            })
        );
    }

    #[test]
    fn valid_exactly_when_both_columns_are_permutations() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        for _ in 0..500 {
            let mut bats: Vec<u8> = (0..9).collect();
            let mut flds: Vec<u8> = (0..9).collect();
            bats.shuffle(&mut rng);
            flds.shuffle(&mut rng);
            if rng.gen_bool(0.5) {
                let i = rng.gen_range(0..9);
                bats[i] = rng.gen_range(0..10);
            }
            if rng.gen_bool(0.5) {
                let i = rng.gen_range(0..9);
                flds[i] = rng.gen_range(0..10);
            }

            let team = Team::new(
                bats.iter()
                    .zip(&flds)
                    .map(|(&b, &f)| Player::new(rng.gen_range(0..=LAST_ID), b, f))
                    .collect(),
            );

            let mut sb = bats.clone();
            let mut sf = flds.clone();
            sb.sort_unstable();
            sf.sort_unstable();
            let expected: Vec<u8> = (0..9).collect();
            let is_perm = sb == expected && sf == expected;

            assert_eq!(validate(&team, LAST_ID).is_ok(), is_perm, "{:?}", team);
        }
    }

    #[test]
    fn summary_lists_in_batting_order() {
        let team = Team::new(vec![
            Player::new(9, 1, 0),
            Player::new(0, 0, 8),
        ]);
        let text = team.summary(|id| CHARACTER_NAMES[usize::from(id)].to_string());
        assert_eq!(text, "Mario - RF\nBowser - P\n");
    }

    #[test]
    fn mii_index_is_offset_from_fixed_roster() {
        assert_eq!(Player::new(76, 0, 0).mii_index(), None);
        assert_eq!(Player::new(77, 0, 0).mii_index(), Some(0));
        assert_eq!(Player::new(90, 0, 0).mii_index(), Some(13));
        assert!(Player::new(77, 0, 0).is_mii());
    }
}
