//! # Input Frame
//!
//! Per-frame sampled input handed to the controller by the input collaborator.
//!
//! ## Classes
//! - `InputButton`: closed set of gameplay buttons
//! - `ButtonState`: held flag plus press/release edges
//! - `InputFrame`: one frame of sampled input, with explicit consume operations
//! - `InputSampler`: derives edges from successive raw held sets

use bevy::math::Vec2;
use bevy::reflect::Reflect;
use serde::{Deserialize, Serialize};

// ============================================================================
// Buttons
// ============================================================================

/// Gameplay buttons the locomotion core reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Reflect)]
pub enum InputButton {
    Jump,
    Sprint,
    Walk,
    Dodge,
    Roll,
    Aim,
    Attack,
    Holster,
}

impl InputButton {
    pub const COUNT: usize = 8;

    pub const ALL: [InputButton; Self::COUNT] = [
        InputButton::Jump,
        InputButton::Sprint,
        InputButton::Walk,
        InputButton::Dodge,
        InputButton::Roll,
        InputButton::Aim,
        InputButton::Attack,
        InputButton::Holster,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Held state and edges of a single button for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonState {
    /// Button is down this frame
    pub held: bool,
    /// Button went down this frame
    pub pressed: bool,
    /// Button went up this frame
    pub released: bool,
}

impl ButtonState {
    /// Build a state from the previous and current held flags.
    pub fn from_edges(was_held: bool, held: bool) -> Self {
        Self {
            held,
            pressed: held && !was_held,
            released: !held && was_held,
        }
    }
}

// ============================================================================
// Input Frame
// ============================================================================

/// One frame of sampled input.
///
/// `pressed` flags are consumable: a reader that acts on an edge calls
/// [`InputFrame::consume`] so no later reader in the same frame sees it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputFrame {
    /// 2-D movement input, x = strafe right, y = forward
    pub move_axis: Vec2,
    /// Raw look delta (yaw, pitch) in input units
    pub look_delta: Vec2,
    /// Hotbar slot pressed this frame
    pub hotbar: Option<usize>,
    buttons: [ButtonState; InputButton::COUNT],
}

impl InputFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_move(mut self, move_axis: Vec2) -> Self {
        self.move_axis = move_axis;
        self
    }

    pub fn with_look(mut self, look_delta: Vec2) -> Self {
        self.look_delta = look_delta;
        self
    }

    pub fn with_hotbar(mut self, slot: usize) -> Self {
        self.hotbar = Some(slot);
        self
    }

    /// Mark a button as held and pressed this frame.
    pub fn with_press(mut self, button: InputButton) -> Self {
        self.buttons[button.index()] = ButtonState {
            held: true,
            pressed: true,
            released: false,
        };
        self
    }

    /// Mark a button as held without a press edge.
    pub fn with_hold(mut self, button: InputButton) -> Self {
        self.buttons[button.index()].held = true;
        self
    }

    pub fn set(&mut self, button: InputButton, state: ButtonState) {
        self.buttons[button.index()] = state;
    }

    pub fn button(&self, button: InputButton) -> ButtonState {
        self.buttons[button.index()]
    }

    pub fn held(&self, button: InputButton) -> bool {
        self.buttons[button.index()].held
    }

    pub fn pressed(&self, button: InputButton) -> bool {
        self.buttons[button.index()].pressed
    }

    pub fn released(&self, button: InputButton) -> bool {
        self.buttons[button.index()].released
    }

    /// Zero a press edge so it cannot be acted on twice.
    pub fn consume(&mut self, button: InputButton) {
        self.buttons[button.index()].pressed = false;
    }

    /// Zero the look delta once it has been integrated.
    pub fn consume_look(&mut self) {
        self.look_delta = Vec2::ZERO;
    }

    /// Take the hotbar edge, leaving none behind.
    pub fn take_hotbar(&mut self) -> Option<usize> {
        self.hotbar.take()
    }

    pub fn has_move_input(&self, deadzone: f32) -> bool {
        self.move_axis.length_squared() > deadzone * deadzone
    }
}

// ============================================================================
// Sampler
// ============================================================================

/// Raw device state for one frame, before edge detection.
#[derive(Debug, Clone, Default)]
pub struct RawInput {
    pub move_axis: Vec2,
    pub look_delta: Vec2,
    pub held: Vec<InputButton>,
    pub hotbar: Option<usize>,
}

/// Produces [`InputFrame`]s with press/release edges from raw held sets.
#[derive(Debug, Clone, Default)]
pub struct InputSampler {
    previous: [bool; InputButton::COUNT],
}

impl InputSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&mut self, raw: &RawInput) -> InputFrame {
        let mut frame = InputFrame {
            move_axis: raw.move_axis,
            look_delta: raw.look_delta,
            hotbar: raw.hotbar,
            ..Default::default()
        };
        for button in InputButton::ALL {
            let held = raw.held.contains(&button);
            frame.set(button, ButtonState::from_edges(self.previous[button.index()], held));
            self.previous[button.index()] = held;
        }
        frame
    }
}
