//! Controller Protocol Definition
//!
//! Message shapes exchanged between mobile controllers and the game backend.
//! The relay never parses traffic; these types exist for the simulator, for
//! tests, and for read-only log sampling.

use serde::{Deserialize, Serialize};

/// Player colours handed out to controllers in join order
pub const PLAYER_COLORS: [&str; 4] = ["Blue", "Yellow", "Green", "Red"];

/// Value of the `type` field on stick/button frames
pub const ANALOG_INPUT_TYPE: &str = "analog";

/// One-time registration sent right after a controller connects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRegistration {
    pub name: String,
    pub color: String,
    pub data: String,
}

impl PlayerRegistration {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            data: String::new(),
        }
    }

    /// Registration for the 1-based player slot, e.g. `player1` in Blue
    pub fn for_slot(slot: usize) -> Self {
        let color = PLAYER_COLORS[slot.saturating_sub(1) % PLAYER_COLORS.len()];
        Self::new(format!("player{}", slot), color)
    }
}

/// Pressed/released state of the controller buttons
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    pub a: bool,
    pub b: bool,
    pub c: bool,
    pub d: bool,
    pub button: bool,
}

impl ButtonState {
    pub fn any(&self) -> bool {
        self.a || self.b || self.c || self.d || self.button
    }
}

/// Periodic stick and button frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerInput {
    #[serde(rename = "type")]
    pub kind: String,
    pub x: f64,
    pub y: f64,
    #[serde(rename = "A")]
    pub a: bool,
    #[serde(rename = "B")]
    pub b: bool,
    #[serde(rename = "C")]
    pub c: bool,
    #[serde(rename = "D")]
    pub d: bool,
    pub button: bool,
    #[serde(rename = "T")]
    pub text: String,
}

impl ControllerInput {
    pub fn analog(x: f64, y: f64, buttons: ButtonState) -> Self {
        Self {
            kind: ANALOG_INPUT_TYPE.to_string(),
            x,
            y,
            a: buttons.a,
            b: buttons.b,
            c: buttons.c,
            d: buttons.d,
            button: buttons.button,
            text: String::new(),
        }
    }

    pub fn buttons(&self) -> ButtonState {
        ButtonState {
            a: self.a,
            b: self.b,
            c: self.c,
            d: self.d,
            button: self.button,
        }
    }
}

/// True for the stream of stick frames that would flood a debug log
pub fn is_high_frequency(text: &str) -> bool {
    text.contains(ANALOG_INPUT_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_wire_shape() {
        let json = serde_json::to_value(PlayerRegistration::for_slot(1)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "player1", "color": "Blue", "data": ""})
        );
    }

    #[test]
    fn test_slot_colors_wrap() {
        assert_eq!(PlayerRegistration::for_slot(4).color, "Red");
        assert_eq!(PlayerRegistration::for_slot(5).color, "Blue");
    }

    #[test]
    fn test_analog_wire_shape() {
        let buttons = ButtonState {
            a: true,
            button: true,
            ..Default::default()
        };
        let json = serde_json::to_value(ControllerInput::analog(0.5, -0.25, buttons)).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "type": "analog",
                "x": 0.5,
                "y": -0.25,
                "A": true,
                "B": false,
                "C": false,
                "D": false,
                "button": true,
                "T": ""
            })
        );
    }

    #[test]
    fn test_parse_analog_frame() {
        let raw = r#"{"type":"analog","x":0.1,"y":0.2,"A":false,"B":true,"C":false,"D":false,"button":false,"T":""}"#;
        let input: ControllerInput = serde_json::from_str(raw).unwrap();
        assert_eq!(input.kind, "analog");
        assert!(input.buttons().b);
        assert!(input.buttons().any());
    }

    #[test]
    fn test_high_frequency_detection() {
        assert!(is_high_frequency(r#"{"type":"analog","x":0.0}"#));
        assert!(!is_high_frequency(r#"{"name":"player1","color":"Blue","data":""}"#));
    }
}
