use log::debug;
use std::thread;
use std::time::Duration;

use crate::input::{Control, InputDevice, KeyBindings};
use crate::{AutoTeamError, Result};

/// One token of a menu instruction string.
///
/// `u d l r` are d-pad presses, `a` confirms, `b` cancels and `w` waits for
/// the menu to settle without pressing anything.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Step {
    Up,
    Down,
    Left,
    Right,
    Confirm,
    Cancel,
    Wait,
}

impl Step {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'u' => Some(Step::Up),
            'd' => Some(Step::Down),
            'l' => Some(Step::Left),
            'r' => Some(Step::Right),
            'a' => Some(Step::Confirm),
            'b' => Some(Step::Cancel),
            'w' => Some(Step::Wait),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Step::Up => 'u',
            Step::Down => 'd',
            Step::Left => 'l',
            Step::Right => 'r',
            Step::Confirm => 'a',
            Step::Cancel => 'b',
            Step::Wait => 'w',
        }
    }

    fn control(self) -> Option<Control> {
        match self {
            Step::Up => Some(Control::Up),
            Step::Down => Some(Control::Down),
            Step::Left => Some(Control::Left),
            Step::Right => Some(Control::Right),
            Step::Confirm => Some(Control::A),
            Step::Cancel => Some(Control::B),
            Step::Wait => None,
        }
    }
}

pub fn parse_steps(src: &str) -> Result<Vec<Step>> {
    src.chars()
        .map(|c| Step::from_char(c).ok_or(AutoTeamError::Instruction(c)))
        .collect()
}

pub fn format_steps(steps: &[Step]) -> String {
    steps.iter().map(|s| s.as_char()).collect()
}

/// Fixed menu routes for the exhibition setup flow. Each string assumes the
/// cursor is where the previous route left it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MenuRoutes {
    /// Main menu ("Exhibition Mode" highlighted) to the roster editor.
    pub to_roster_editor: &'static str,
    /// Roster editor to the away team's batting order row.
    pub to_away_order: &'static str,
    /// Away batting order row to the home team's.
    pub away_to_home_order: &'static str,
    /// Home batting order row to the match start prompt.
    pub to_start_prompt: &'static str,
    /// Opens the Mii selector for the highlighted slot.
    pub open_mii_selector: &'static str,
    /// Advances the Mii selector by one page of ten.
    pub next_mii_page: &'static str,
    /// Re-anchors the cursor on the registry's final page.
    pub last_page_anchor: &'static str,
    /// Leaves the away team's Mii slots.
    pub away_mii_return: &'static str,
    /// Leaves the home team's Mii slots.
    pub home_mii_return: &'static str,
}

impl MenuRoutes {
    pub const MSS: MenuRoutes = MenuRoutes {
        to_roster_editor: "awawawwwaawwwwwwwwrrawwwwd",
        to_away_order: "wwulur",
        away_to_home_order: "druldr",
        to_start_prompt: "uruaw",
        open_mii_selector: "awllllll",
        next_mii_page: "rrrrralllll",
        last_page_anchor: "lllu",
        away_mii_return: "uuadd",
        home_mii_return: "dauu",
    };
}

impl Default for MenuRoutes {
    fn default() -> Self {
        MenuRoutes::MSS
    }
}

/// Blocking delays between inputs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Timing {
    /// Hold time between press and release, and settle time after a route.
    pub input_delay: Duration,
    /// Gap after each release.
    pub release_delay: Duration,
    /// Length of a `w` step.
    pub wait_step: Duration,
    /// Pause after the emulator window is activated.
    pub focus_settle: Duration,
    /// Pause on either side of the final memory pass.
    pub finalize_settle: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            input_delay: Duration::from_millis(50),
            release_delay: Duration::from_millis(50),
            wait_step: Duration::from_millis(500),
            focus_settle: Duration::from_millis(200),
            finalize_settle: Duration::from_millis(250),
        }
    }
}

impl Timing {
    pub fn immediate() -> Self {
        Self {
            input_delay: Duration::ZERO,
            release_delay: Duration::ZERO,
            wait_step: Duration::ZERO,
            focus_settle: Duration::ZERO,
            finalize_settle: Duration::ZERO,
        }
    }
}

/// Turns steps into timed press/release pairs.
///
/// This is open loop: the navigator cannot observe the client, so a dropped
/// input leaves every later step acting on a menu state that no longer
/// matches the caller's model. Nothing here can detect that.
pub struct Navigator<I: InputDevice> {
    input: I,
    bindings: KeyBindings,
    timing: Timing,
}

impl<I: InputDevice> Navigator<I> {
    pub fn new(input: I, bindings: KeyBindings, timing: Timing) -> Self {
        Self {
            input,
            bindings,
            timing,
        }
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn into_inner(self) -> I {
        self.input
    }

    pub fn focus_client(&mut self) -> bool {
        self.input.focus_client()
    }

    pub fn pause(&self, d: Duration) {
        if !d.is_zero() {
            thread::sleep(d);
        }
    }

    pub fn tap(&mut self, control: Control) -> Result<()> {
        let binding = self.bindings.get(control);
        self.input.press(binding)?;
        self.pause(self.timing.input_delay);
        self.input.release(binding)?;
        self.pause(self.timing.release_delay);
        Ok(())
    }

    /// Play `steps`, then wait one input delay for the menu to catch up.
    pub fn run(&mut self, steps: &[Step]) -> Result<()> {
        debug!("navigating: {}", format_steps(steps));
        for step in steps {
            match step.control() {
                Some(control) => self.tap(control)?,
                None => self.pause(self.timing.wait_step),
            }
        }
        self.pause(self.timing.input_delay);
        Ok(())
    }

    pub fn execute(&mut self, instructions: &str) -> Result<()> {
        let steps = parse_steps(instructions)?;
        self.run(&steps)
    }

    /// Hold minus and tap A, which starts the match from the final prompt.
    pub fn start_game(&mut self) -> Result<()> {
        let minus = self.bindings.get(Control::Minus);
        let a = self.bindings.get(Control::A);

        self.input.press(minus)?;
        self.pause(self.timing.input_delay);
        self.input.press(a)?;
        self.pause(self.timing.input_delay);
        self.input.release(a)?;
        self.pause(self.timing.release_delay);
        self.input.release(minus)?;
        self.pause(self.timing.release_delay);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Binding, InputEvent, RecordingInput};

    fn key(k: &str) -> Binding {
        Binding::Key(k.to_string())
    }

    #[test]
    fn parses_every_token() {
        let steps = parse_steps("udlrabw").unwrap();
        assert_eq!(
            steps,
            vec![
                Step::Up,
                Step::Down,
                Step::Left,
                Step::Right,
                Step::Confirm,
                Step::Cancel,
                Step::Wait
            ]
        );
        assert_eq!(format_steps(&steps), "udlrabw");
    }

    #[test]
    fn rejects_unknown_token() {
        assert!(matches!(
            parse_steps("uux"),
            Err(AutoTeamError::Instruction('x'))
        ));
    }

    #[test]
    fn routes_are_well_formed() {
        let r = MenuRoutes::MSS;
        for route in [
            r.to_roster_editor,
            r.to_away_order,
            r.away_to_home_order,
            r.to_start_prompt,
            r.open_mii_selector,
            r.next_mii_page,
            r.last_page_anchor,
            r.away_mii_return,
            r.home_mii_return,
        ] {
            parse_steps(route).unwrap();
        }
    }

    #[test]
    fn waits_press_nothing() {
        let mut nav = Navigator::new(RecordingInput::new(), KeyBindings::default(), Timing::immediate());
        nav.execute("wawr").unwrap();
        let input = nav.into_inner();
        assert_eq!(
            input.events,
            vec![
                InputEvent::Press(key("k")),
                InputEvent::Release(key("k")),
                InputEvent::Press(key("d")),
                InputEvent::Release(key("d")),
            ]
        );
    }

    #[test]
    fn start_game_holds_minus_around_a() {
        let mut nav = Navigator::new(RecordingInput::new(), KeyBindings::default(), Timing::immediate());
        nav.start_game().unwrap();
        assert_eq!(
            nav.into_inner().events,
            vec![
                InputEvent::Press(key("q")),
                InputEvent::Press(key("k")),
                InputEvent::Release(key("k")),
                InputEvent::Release(key("q")),
            ]
        );
    }
}
