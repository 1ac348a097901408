//! Navigation inside the paged Mii selector.
//!
//! The selector shows the loaded Mii registry ten entries per page, laid out
//! as two rows of five. Every selection starts from the same place: the
//! selector is reopened for the next slot, advanced a whole page at a time,
//! then walked within the page.

use crate::navigator::{parse_steps, MenuRoutes, Step};
use crate::roster::{Side, Team};
use crate::Result;

pub const PAGE_SIZE: usize = 10;
const ROW_WIDTH: usize = 5;

/// Where one Mii lives in the selector and how the cursor gets there.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PageTarget {
    pub target_page: usize,
    pub last_page: usize,
    /// Page advances performed before walking within the page.
    pub turns: usize,
    /// Index within the target page.
    pub in_page: usize,
    /// Whether the final-page anchor correction is injected.
    pub anchor: bool,
}

/// Locate registry entry `idx` among `total_miis` entries.
pub fn locate(idx: usize, total_miis: usize) -> PageTarget {
    let last_page = total_miis.saturating_sub(1) / PAGE_SIZE;
    let target_page = idx / PAGE_SIZE;

    let mut v = idx;
    let mut turns = 0;
    while v >= PAGE_SIZE {
        v -= PAGE_SIZE;
        turns += 1;
    }

    // The selector lays out a short final page differently. This exact
    // condition was matched against the running client; keep it as is.
    let anchor = target_page == last_page && turns == target_page;

    PageTarget {
        target_page,
        last_page,
        turns,
        in_page: v,
        anchor,
    }
}

/// Steps that select `team`'s Miis, in roster order, and then leave the
/// selector row for `side`.
///
/// Each batch is played as one run, with the settle delay after it. Opening
/// the selector and every page advance are runs of their own.
pub fn selection_steps(
    team: &Team,
    side: Side,
    total_miis: usize,
    routes: &MenuRoutes,
) -> Result<Vec<Vec<Step>>> {
    let open = parse_steps(routes.open_mii_selector)?;
    let advance = parse_steps(routes.next_mii_page)?;
    let anchor = parse_steps(routes.last_page_anchor)?;

    let mut batches = Vec::new();
    for p in team.iter() {
        let Some(idx) = p.mii_index() else {
            continue;
        };
        let target = locate(idx, total_miis);

        batches.push(open.clone());
        for _ in 0..target.turns {
            batches.push(advance.clone());
        }

        let mut steps = Vec::new();
        if target.anchor {
            steps.extend_from_slice(&anchor);
        }
        for _ in 0..target.in_page % ROW_WIDTH {
            steps.push(Step::Right);
        }
        if target.in_page >= ROW_WIDTH {
            steps.push(Step::Down);
        }
        steps.push(Step::Confirm);
        steps.push(Step::Cancel);
        steps.push(Step::Wait);
        batches.push(steps);
    }

    let back = match side {
        Side::Away => routes.away_mii_return,
        Side::Home => routes.home_mii_return,
    };
    batches.push(parse_steps(back)?);

    Ok(batches)
}
