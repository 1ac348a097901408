use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn, LevelFilter};
use std::fs;
use std::path::{Path, PathBuf};

use autoteam_core::finalize::{stadium_by_name, INNINGS_CHOICES, STADIUM_NAMES};
use autoteam_core::input::{Control, InputEvent, RecordingInput};
use autoteam_core::memory::RecordingMemory;
use autoteam_core::navigator::format_steps;
use autoteam_core::patch::PREREQUISITE_GECKO_CODES;
use autoteam_core::{
    clb, plan_patch, AutoTeamError, Automation, KeyScript, MatchContext, MiiRegistry, Options,
    Result, StadiumRules, Team, Timing,
};

#[derive(Debug, Parser)]
#[command(
    name = "MSS-AutoTeam-CLI",
    version,
    about = "Mario Super Sluggers lineup automation"
)]
struct Args {
    /// Options file. Defaults to the per-user config location.
    #[arg(long, global = true)]
    options: Option<PathBuf>,

    #[arg(long, global = true, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the saved lineups that load cleanly.
    Teams {
        #[arg(long)]
        saves: PathBuf,
    },

    /// Check both lineups without touching the client.
    Validate {
        #[arg(long)]
        saves: PathBuf,
        #[arg(long)]
        away: String,
        #[arg(long)]
        home: String,
    },

    /// Dry run: print the patch block and the key transcript.
    Plan {
        #[arg(long)]
        saves: PathBuf,
        #[arg(long)]
        away: String,
        #[arg(long)]
        home: String,
        #[command(flatten)]
        rules: RuleArgs,
    },

    /// Print the Gecko codes and controls the client must be set up with.
    Gecko,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl Toggle {
    fn is_on(self) -> bool {
        matches!(self, Toggle::On)
    }
}

#[derive(Debug, clap::Args)]
struct RuleArgs {
    #[arg(long)]
    stadium: Option<String>,
    #[arg(long, default_value_t = false)]
    night: bool,
    #[arg(long)]
    innings: Option<u8>,
    #[arg(long, value_enum)]
    mercy: Option<Toggle>,
    #[arg(long, value_enum)]
    stars: Option<Toggle>,
    #[arg(long, value_enum)]
    items: Option<Toggle>,
}

impl RuleArgs {
    /// Flags given on the command line win over the saved selections.
    fn apply(&self, mut rules: StadiumRules) -> Result<StadiumRules> {
        if let Some(name) = &self.stadium {
            let stadium = stadium_by_name(name).ok_or_else(|| {
                AutoTeamError::Config(format!(
                    "unknown stadium '{}' (expected one of: {})",
                    name,
                    STADIUM_NAMES.join(", ")
                ))
            })?;
            rules.set_stadium(stadium);
        }
        if self.night {
            rules.set_night(true);
        }
        if let Some(innings) = self.innings {
            if !INNINGS_CHOICES.contains(&innings) {
                return Err(AutoTeamError::Config(format!(
                    "innings must be one of {:?}",
                    INNINGS_CHOICES
                )));
            }
            rules.set_innings(innings);
        }
        if let Some(t) = self.mercy {
            rules.set_mercy(t.is_on());
        }
        if let Some(t) = self.stars {
            rules.set_stars(t.is_on());
        }
        if let Some(t) = self.items {
            rules.set_items(t.is_on());
        }
        Ok(rules)
    }
}

fn setup_logging(debug: bool) {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let result = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {:<5} {}] {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply();
    if let Err(e) = result {
        eprintln!("Failed to initialise logging: {e}");
    }
}

fn load_options(path: Option<&Path>) -> Result<Options> {
    match path.map(Path::to_path_buf).or_else(Options::default_path) {
        Some(path) => Options::load(&path),
        None => {
            warn!("no config directory available, using default options");
            Ok(Options::default())
        }
    }
}

fn load_registry(options: &Options) -> Result<MiiRegistry> {
    if options.mii.database_path.is_empty() {
        warn!("no Mii database configured; Mii players cannot be loaded");
        return Ok(MiiRegistry::default());
    }
    Ok(MiiRegistry::from_rfl_db(Path::new(&options.mii.database_path))?)
}

fn load_team(dir: &Path, name: &str, registry: &MiiRegistry) -> Result<Team> {
    let path = clb::find_lineup(dir, name)
        .ok_or_else(|| AutoTeamError::Config(format!("no saved lineup named '{}'", name)))?;
    let lineup = clb::parse_lineup(&fs::read_to_string(&path)?)?;
    Ok(clb::from_clb(&lineup, registry)?)
}

fn name_of(registry: &MiiRegistry) -> impl Fn(u16) -> String + '_ {
    move |id| {
        registry
            .character_name(id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("#{}", id))
    }
}

fn match_context(
    options: &Options,
    registry: &MiiRegistry,
    saves: &Path,
    away: &str,
    home: &str,
) -> Result<MatchContext> {
    let mut ctx = MatchContext::new(
        load_team(saves, away, registry)?,
        load_team(saves, home, registry)?,
        registry.len(),
    );
    ctx.rules = options.stadium_rules();
    ctx.default_captains = (
        options.defaults.away_captain_id,
        options.defaults.home_captain_id,
    );
    ctx.auto_start = options.automation.auto_start_game;
    ctx.validate(registry.last_valid_id())?;
    Ok(ctx)
}

fn run(args: Args) -> Result<()> {
    let options = load_options(args.options.as_deref())?;

    match args.command {
        Command::Teams { saves } => {
            let registry = load_registry(&options)?;
            for saved in clb::load_saves(&saves, &registry) {
                println!("{} ({})", saved.name, saved.path.display());
                print!("{}", saved.team.summary(name_of(&registry)));
                println!();
            }
        }
        Command::Validate { saves, away, home } => {
            let registry = load_registry(&options)?;
            match_context(&options, &registry, &saves, &away, &home)?;
            println!("{} vs {}: both lineups are valid", away, home);
        }
        Command::Plan {
            saves,
            away,
            home,
            rules,
        } => {
            let registry = load_registry(&options)?;
            let mut ctx = match_context(&options, &registry, &saves, &away, &home)?;
            ctx.rules = rules.apply(ctx.rules)?;

            let mut automation = Automation::new(
                RecordingInput::new(),
                RecordingMemory::new(),
                options.key_bindings(),
                Timing::immediate(),
            );

            println!("# patch block");
            for entry in plan_patch(&ctx, automation.target())?.writes() {
                println!("{:08X} {:08X}", entry.address, entry.word);
            }

            println!("# key script");
            for (phase, steps) in KeyScript::build(&ctx, automation.routes())?.phases() {
                println!("{:<16} {}", phase, format_steps(steps));
            }

            automation.automate(&ctx)?;
            let (input, memory) = automation.into_parts();

            println!("# input transcript");
            for event in &input.events {
                match event {
                    InputEvent::Focus => println!("focus"),
                    InputEvent::Press(b) => println!("press {}", b),
                    InputEvent::Release(b) => println!("release {}", b),
                }
            }
            info!(
                "dry run finished: {} memory writes in {} attach(es)",
                memory.writes.len(),
                memory.attach_count
            );
        }
        Command::Gecko => {
            println!("# Gecko codes (enable in Dolphin)");
            for code in PREREQUISITE_GECKO_CODES {
                println!("{}", code);
            }
            println!("# controls (map these in the Dolphin controller settings)");
            let bindings = options.key_bindings();
            for (label, control) in [
                ("Up", Control::Up),
                ("Down", Control::Down),
                ("Left", Control::Left),
                ("Right", Control::Right),
                ("A", Control::A),
                ("B", Control::B),
                ("Minus", Control::Minus),
            ] {
                println!("{:<6} {}", label, bindings.get(control));
            }
        }
    }

    Ok(())
}

fn main() {
    let args = Args::parse();
    setup_logging(args.debug);

    if let Err(err) = run(args) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
