//! Batting order fix-up for Mii players.
//!
//! The patch block cannot place Miis in their batting slots, so they land in
//! columns `1..=n` in roster order. The batting order widget swaps two
//! occupants when one is picked up and dropped on the other; this module
//! plans the pick/drop presses that move each Mii to its column.

use crate::navigator::Step;
use crate::roster::{Player, Team, ValidationError, TEAM_SIZE};

/// Modeled cursor column in the batting order widget.
///
/// This is a belief built only from the moves already emitted, never read
/// back from the client. If the client misses an input the real cursor
/// drifts from this value and every later move lands in the wrong column;
/// that failure is silent.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct CursorBelief {
    pub column: usize,
}

impl CursorBelief {
    fn move_to(&mut self, target: usize, out: &mut Vec<Step>) {
        while self.column < target {
            out.push(Step::Right);
            self.column += 1;
        }
        while self.column > target {
            out.push(Step::Left);
            self.column -= 1;
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReorderPlan {
    pub steps: Vec<Step>,
    /// The Mii sub-list as the model believes it sits in columns `1..=n`
    /// once the plan has run.
    pub model: Vec<Player>,
    pub cursor: CursorBelief,
}

pub fn reorder(team: &Team) -> Result<ReorderPlan, ValidationError> {
    reorder_miis(team.miis())
}

/// Plan the swaps that move each of `miis` (initially in columns `1..=n`, in
/// the given order) to the column equal to its batting order.
///
/// Each swap settles one Mii for good, so a plan has at most `n` swaps. Two
/// Miis sharing a batting order would swap forever and are rejected.
pub fn reorder_miis(mut miis: Vec<Player>) -> Result<ReorderPlan, ValidationError> {
    let mut steps = Vec::new();
    let mut cursor = CursorBelief::default();
    let len = miis.len();

    let mut i = 0;
    while i < len {
        cursor.move_to(i + 1, &mut steps);
        steps.push(Step::Confirm);

        let targ = usize::from(miis[i].batting_order);
        cursor.move_to(targ, &mut steps);
        steps.push(Step::Confirm);

        if targ > i + 1 && targ <= len {
            if miis[targ - 1].batting_order == miis[i].batting_order {
                return Err(ValidationError::DuplicateBatting {
                    value: miis[i].batting_order,
                });
            }
            // The drop brought a not-yet-placed Mii into column i + 1.
            miis.swap(i, targ - 1);
        } else {
            i += 1;
        }
    }

    cursor.move_to(TEAM_SIZE - 1, &mut steps);

    Ok(ReorderPlan {
        steps,
        model: miis,
        cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigator::format_steps;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    /// Swap-on-drop widget: confirm once to pick up the highlighted column,
    /// again to drop it onto the highlighted column.
    fn play(columns: &mut [Option<char>], steps: &[Step]) {
        let mut cursor = 0usize;
        let mut held: Option<usize> = None;
        for step in steps {
            match step {
                Step::Left => cursor -= 1,
                Step::Right => cursor += 1,
                Step::Confirm => match held.take() {
                    None => held = Some(cursor),
                    Some(from) => columns.swap(from, cursor),
                },
                _ => panic!("unexpected step {:?}", step),
            }
        }
        assert!(held.is_none());
        assert_eq!(cursor, TEAM_SIZE - 1);
    }

    #[test]
    fn three_miis_land_on_their_batting_columns() {
        let miis = vec![
            Player::new(77, 2, 0),
            Player::new(78, 0, 1),
            Player::new(79, 1, 2),
        ];
        let plan = reorder_miis(miis).unwrap();

        let mut columns = [None, Some('A'), Some('B'), Some('C'), None, None, None, None, None];
        play(&mut columns, &plan.steps);
        assert_eq!(&columns[..3], &[Some('B'), Some('C'), Some('A')]);

        assert_eq!(format_steps(&plan.steps), "raralalarraarallarrrrrrr");
    }

    #[test]
    fn no_miis_only_parks_cursor() {
        let plan = reorder_miis(Vec::new()).unwrap();
        assert_eq!(format_steps(&plan.steps), "rrrrrrrr");
        assert_eq!(plan.cursor.column, 8);
    }

    #[test]
    fn terminates_for_every_arrangement() {
        let mut rng = StdRng::seed_from_u64(42);
        for n in 1..=TEAM_SIZE {
            for _ in 0..50 {
                let mut bats: Vec<u8> = (0..TEAM_SIZE as u8).collect();
                bats.shuffle(&mut rng);
                let miis: Vec<Player> = bats[..n]
                    .iter()
                    .enumerate()
                    .map(|(i, &b)| Player::new(77 + i as u16, b, i as u8))
                    .collect();

                let plan = reorder_miis(miis).unwrap();
                let picks = plan.steps.iter().filter(|s| **s == Step::Confirm).count();
                assert!(picks <= 4 * n, "too many swaps for {:?}", bats);
            }
        }
    }

    #[test]
    fn shared_batting_order_is_rejected() {
        let miis = vec![
            Player::new(77, 2, 0),
            Player::new(78, 2, 1),
            Player::new(79, 0, 2),
        ];
        assert_eq!(
            reorder_miis(miis),
            Err(ValidationError::DuplicateBatting { value: 2 })
        );
    }
}
