use log::{info, warn};

use crate::roster::{Side, Team};

/// Character ids the client accepts as team captain. The value written to
/// memory is the index into this table, not the character id.
pub const CAPTAINS: [u16; 12] = [0, 1, 2, 3, 4, 5, 6, 9, 10, 11, 17, 19];

fn table_index(table: &[u16], id: u16) -> Option<u8> {
    table.iter().position(|&c| c == id).map(|idx| idx as u8)
}

/// Pick the captain table index for one team.
///
/// The first batter wins if eligible, then the first eligible player in
/// roster order, then `configured_default` when it is in the table. With
/// nothing usable the away team gets index 0 and the home team index 1
/// (0 when the table has a single entry).
pub fn resolve(team: &Team, table: &[u16], configured_default: u16, side: Side) -> u8 {
    if let Some(first) = team.players.first() {
        if let Some(idx) = table_index(table, first.character_id) {
            return idx;
        }
    }

    if let Some(idx) = team
        .iter()
        .find_map(|p| table_index(table, p.character_id))
    {
        info!(
            "{} team: first batter is not captain-eligible, using roster captain at table index {}",
            side, idx
        );
        return idx;
    }

    if let Some(idx) = table_index(table, configured_default) {
        warn!(
            "{} team: no captain-eligible player in roster, using configured default {}",
            side, configured_default
        );
        return idx;
    }

    let fallback = match side {
        Side::Away => 0,
        Side::Home if table.len() > 1 => 1,
        Side::Home => 0,
    };
    warn!(
        "{} team: default captain {} is not eligible, falling back to table index {}",
        side, configured_default, fallback
    );
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{straight_team, Player};

    #[test]
    fn first_batter_captain_uses_table_index() {
        let mut team = straight_team(40);
        team.players[0].character_id = 9;
        assert_eq!(resolve(&team, &CAPTAINS, 0, Side::Away), 7);
    }

    #[test]
    fn scans_roster_in_order_when_first_batter_ineligible() {
        let mut team = straight_team(40);
        team.players[3].character_id = 17;
        team.players[6].character_id = 1;
        assert_eq!(resolve(&team, &CAPTAINS, 0, Side::Home), 10);
    }

    #[test]
    fn configured_default_when_no_captain_present() {
        let team = straight_team(40);
        assert_eq!(resolve(&team, &CAPTAINS, 1, Side::Away), 1);
        assert_eq!(resolve(&team, &CAPTAINS, 19, Side::Away), 11);
    }

    #[test]
    fn side_fallback_when_default_ineligible() {
        let team = straight_team(40);
        assert_eq!(resolve(&team, &CAPTAINS, 50, Side::Away), 0);
        assert_eq!(resolve(&team, &CAPTAINS, 50, Side::Home), 1);
        assert_eq!(resolve(&team, &[4], 50, Side::Home), 0);
    }

    #[test]
    fn mii_players_are_never_captains() {
        let team = Team::new(vec![Player::new(77, 0, 0), Player::new(10, 1, 1)]);
        assert_eq!(resolve(&team, &CAPTAINS, 0, Side::Away), 8);
    }
}
