use log::{info, warn};
use thiserror::Error;

pub mod captain;
pub mod clb;
pub mod config;
pub mod finalize;
pub mod input;
pub mod lineup;
pub mod memory;
pub mod mii_db;
pub mod mii_pages;
pub mod navigator;
pub mod patch;
pub mod roster;

pub use clb::ClbError;
pub use config::Options;
pub use finalize::{FinalizeAddresses, StadiumRules};
pub use input::{InputDevice, InputError, KeyBindings};
pub use memory::{MemoryAccess, MemoryError};
pub use mii_db::{MiiDbError, MiiRegistry};
pub use navigator::{MenuRoutes, Navigator, Step, Timing};
pub use patch::{PatchError, PatchProgram, PatchTarget};
pub use roster::{Player, Side, Team, ValidationError};

#[derive(Debug, Error)]
pub enum AutoTeamError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{side} team is invalid: {source}")]
    Validation {
        side: Side,
        #[source]
        source: ValidationError,
    },

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Clb(#[from] ClbError),

    #[error(transparent)]
    MiiDb(#[from] MiiDbError),

    #[error("unknown menu instruction '{0}'")]
    Instruction(char),
}

pub type Result<T> = std::result::Result<T, AutoTeamError>;

/// Everything one run needs to know about the match being set up.
#[derive(Clone, Debug)]
pub struct MatchContext {
    pub away: Team,
    pub home: Team,
    pub rules: StadiumRules,
    /// Miis in the client's selector list.
    pub total_miis: usize,
    /// Configured fallback captains (character ids), away then home.
    pub default_captains: (u16, u16),
    pub auto_start: bool,
}

impl MatchContext {
    pub fn new(away: Team, home: Team, total_miis: usize) -> Self {
        Self {
            away,
            home,
            rules: StadiumRules::default(),
            total_miis,
            default_captains: (0, 1),
            auto_start: false,
        }
    }

    pub fn validate(&self, last_valid_id: u16) -> Result<()> {
        for (side, team) in [(Side::Away, &self.away), (Side::Home, &self.home)] {
            roster::validate(team, last_valid_id)
                .map_err(|source| AutoTeamError::Validation { side, source })?;
        }
        Ok(())
    }

    /// Captain table indices, away then home.
    pub fn captains(&self, table: &[u16]) -> (u8, u8) {
        (
            captain::resolve(&self.away, table, self.default_captains.0, Side::Away),
            captain::resolve(&self.home, table, self.default_captains.1, Side::Home),
        )
    }
}

/// The key sequences of one run, grouped by phase. Memory writes happen
/// between phases and are not part of the script.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyScript {
    pub to_roster_editor: Vec<Step>,
    /// Selector batches for each Mii, then the route back out of the selector.
    pub away_selection: Vec<Vec<Step>>,
    pub home_selection: Vec<Vec<Step>>,
    pub confirm: Vec<Step>,
    pub to_away_order: Vec<Step>,
    pub away_reorder: Vec<Step>,
    pub to_home_order: Vec<Step>,
    pub home_reorder: Vec<Step>,
    pub to_start_prompt: Vec<Step>,
}

impl KeyScript {
    pub fn build(ctx: &MatchContext, routes: &MenuRoutes) -> Result<Self> {
        Ok(Self {
            to_roster_editor: navigator::parse_steps(routes.to_roster_editor)?,
            away_selection: mii_pages::selection_steps(
                &ctx.away,
                Side::Away,
                ctx.total_miis,
                routes,
            )?,
            home_selection: mii_pages::selection_steps(
                &ctx.home,
                Side::Home,
                ctx.total_miis,
                routes,
            )?,
            confirm: vec![Step::Confirm],
            to_away_order: navigator::parse_steps(routes.to_away_order)?,
            away_reorder: lineup::reorder(&ctx.away)
                .map_err(|source| AutoTeamError::Validation {
                    side: Side::Away,
                    source,
                })?
                .steps,
            to_home_order: navigator::parse_steps(routes.away_to_home_order)?,
            home_reorder: lineup::reorder(&ctx.home)
                .map_err(|source| AutoTeamError::Validation {
                    side: Side::Home,
                    source,
                })?
                .steps,
            to_start_prompt: navigator::parse_steps(routes.to_start_prompt)?,
        })
    }

    /// Named phases in playing order.
    pub fn phases(&self) -> Vec<(&'static str, &[Step])> {
        let mut out: Vec<(&'static str, &[Step])> = Vec::new();
        out.push(("roster editor", self.to_roster_editor.as_slice()));
        for batch in &self.away_selection {
            out.push(("away miis", batch.as_slice()));
        }
        for batch in &self.home_selection {
            out.push(("home miis", batch.as_slice()));
        }
        out.push(("confirm", self.confirm.as_slice()));
        out.push(("to away order", self.to_away_order.as_slice()));
        out.push(("away order", self.away_reorder.as_slice()));
        out.push(("to home order", self.to_home_order.as_slice()));
        out.push(("home order", self.home_reorder.as_slice()));
        out.push(("to start prompt", self.to_start_prompt.as_slice()));
        out
    }
}

/// Compile the lineup patch without touching memory.
pub fn plan_patch(ctx: &MatchContext, target: &PatchTarget) -> Result<PatchProgram> {
    Ok(patch::compile(&ctx.away, &ctx.home, target)?)
}

/// Drives one client: input for the menus, memory for lineups and settings.
///
/// `automate` takes `&mut self`, so a run cannot start while another holds
/// the same devices.
pub struct Automation<I: InputDevice, M: MemoryAccess> {
    navigator: Navigator<I>,
    memory: M,
    target: PatchTarget,
    finalize: FinalizeAddresses,
    routes: MenuRoutes,
    captain_table: &'static [u16],
}

impl<I: InputDevice, M: MemoryAccess> Automation<I, M> {
    pub fn new(input: I, memory: M, bindings: KeyBindings, timing: Timing) -> Self {
        Self {
            navigator: Navigator::new(input, bindings, timing),
            memory,
            target: PatchTarget::MSS,
            finalize: FinalizeAddresses::MSS,
            routes: MenuRoutes::MSS,
            captain_table: &captain::CAPTAINS,
        }
    }

    pub fn routes(&self) -> &MenuRoutes {
        &self.routes
    }

    pub fn target(&self) -> &PatchTarget {
        &self.target
    }

    pub fn into_parts(self) -> (I, M) {
        (self.navigator.into_inner(), self.memory)
    }

    /// Set up the match described by `ctx` on the client.
    ///
    /// Both teams should already be validated. Input is open loop: a
    /// dropped key leaves the client in a state no later step accounts for,
    /// and this cannot be detected.
    pub fn automate(&mut self, ctx: &MatchContext) -> Result<()> {
        let script = KeyScript::build(ctx, &self.routes)?;
        let program = plan_patch(ctx, &self.target)?;
        let timing = *self.navigator.timing();

        info!("starting automation");
        if !self.navigator.focus_client() {
            warn!("emulator window not found, sending input to the focused window");
        }
        self.navigator.pause(timing.focus_settle);

        self.navigator.run(&script.to_roster_editor)?;
        self.write_settings(ctx)?;
        program.apply(&mut self.memory)?;

        info!("selecting miis");
        for batch in script.away_selection.iter().chain(&script.home_selection) {
            self.navigator.run(batch)?;
        }
        self.navigator.run(&script.confirm)?;

        info!("fixing batting order");
        self.navigator.run(&script.to_away_order)?;
        self.navigator.run(&script.away_reorder)?;
        self.navigator.run(&script.to_home_order)?;
        self.navigator.run(&script.home_reorder)?;
        self.navigator.run(&script.to_start_prompt)?;

        self.navigator.pause(timing.finalize_settle);
        self.write_settings(ctx)?;
        self.navigator.pause(timing.finalize_settle);

        if ctx.auto_start {
            info!("starting game");
            self.navigator.start_game()?;
        }
        info!("automation finished");
        Ok(())
    }

    fn write_settings(&mut self, ctx: &MatchContext) -> Result<()> {
        let captains = ctx.captains(self.captain_table);
        finalize::write_settings(&mut self.memory, &self.finalize, &ctx.rules, captains)?;
        Ok(())
    }
}
