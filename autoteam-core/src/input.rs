use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Something the input capability can press and release: a named key, or a
/// mouse button for controls bound as `mouse_left` / `mouse_right` /
/// `mouse_middle`.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Binding {
    Key(String),
    Mouse(MouseButton),
}

impl Binding {
    pub fn parse(name: &str) -> Self {
        let lower = name.trim().to_ascii_lowercase();
        match lower.as_str() {
            "mouse_left" => Binding::Mouse(MouseButton::Left),
            "mouse_right" => Binding::Mouse(MouseButton::Right),
            "mouse_middle" => Binding::Mouse(MouseButton::Middle),
            _ => Binding::Key(lower),
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Key(k) => write!(f, "key:{k}"),
            Binding::Mouse(MouseButton::Left) => f.write_str("mouse:left"),
            Binding::Mouse(MouseButton::Right) => f.write_str("mouse:right"),
            Binding::Mouse(MouseButton::Middle) => f.write_str("mouse:middle"),
        }
    }
}

/// Controller inputs the automation drives.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Control {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    Minus,
}

/// Emulator control mapping. Defaults match the Dolphin setup the tool asks
/// users to configure: WSAD for the d-pad, K/L for A/B and Q for minus.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeyBindings {
    pub up: Binding,
    pub down: Binding,
    pub left: Binding,
    pub right: Binding,
    pub a_button: Binding,
    pub b_button: Binding,
    pub minus_button: Binding,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            up: Binding::parse("w"),
            down: Binding::parse("s"),
            left: Binding::parse("a"),
            right: Binding::parse("d"),
            a_button: Binding::parse("k"),
            b_button: Binding::parse("l"),
            minus_button: Binding::parse("q"),
        }
    }
}

impl KeyBindings {
    pub fn get(&self, control: Control) -> &Binding {
        match control {
            Control::Up => &self.up,
            Control::Down => &self.down,
            Control::Left => &self.left,
            Control::Right => &self.right,
            Control::A => &self.a_button,
            Control::B => &self.b_button,
            Control::Minus => &self.minus_button,
        }
    }
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to press {binding}: {reason}")]
    Press { binding: Binding, reason: String },

    #[error("failed to release {binding}: {reason}")]
    Release { binding: Binding, reason: String },
}

/// Delivers synthetic input to the emulator window. Nothing reports back
/// whether the client reacted.
pub trait InputDevice {
    fn press(&mut self, binding: &Binding) -> Result<(), InputError>;

    fn release(&mut self, binding: &Binding) -> Result<(), InputError>;

    /// Bring the emulator window to the foreground. Returns `false` when no
    /// matching window could be activated.
    fn focus_client(&mut self) -> bool {
        true
    }
}

impl<T: InputDevice + ?Sized> InputDevice for &mut T {
    fn press(&mut self, binding: &Binding) -> Result<(), InputError> {
        (**self).press(binding)
    }

    fn release(&mut self, binding: &Binding) -> Result<(), InputError> {
        (**self).release(binding)
    }

    fn focus_client(&mut self) -> bool {
        (**self).focus_client()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InputEvent {
    Focus,
    Press(Binding),
    Release(Binding),
}

/// Input device that only records what it was asked to do.
#[derive(Debug, Default)]
pub struct RecordingInput {
    pub events: Vec<InputEvent>,
    pub window_missing: bool,
}

impl RecordingInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings in the order they were pressed.
    pub fn presses(&self) -> Vec<&Binding> {
        self.events
            .iter()
            .filter_map(|e| match e {
                InputEvent::Press(b) => Some(b),
                _ => None,
            })
            .collect()
    }
}

impl InputDevice for RecordingInput {
    fn press(&mut self, binding: &Binding) -> Result<(), InputError> {
        self.events.push(InputEvent::Press(binding.clone()));
        Ok(())
    }

    fn release(&mut self, binding: &Binding) -> Result<(), InputError> {
        self.events.push(InputEvent::Release(binding.clone()));
        Ok(())
    }

    fn focus_client(&mut self) -> bool {
        self.events.push(InputEvent::Focus);
        !self.window_missing
    }
}
