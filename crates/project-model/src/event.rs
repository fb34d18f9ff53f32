//! Pointer and key input consumed by overlay gestures.
//!
//! Positions are screen pixels of the preview surface (+Y down). Input can
//! be scripted as JSONL, one event per line, for replaying gestures outside
//! an interactive host.

use serde::{Deserialize, Serialize};

use crate::geometry::Point2D;

/// Modifier keys held during an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
        alt: false,
    };

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    pub fn any(&self) -> bool {
        self.ctrl || self.shift || self.alt
    }
}

/// One input event delivered to a gesture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GestureInput {
    PointerDown {
        x: f64,
        y: f64,
        #[serde(default)]
        modifiers: Modifiers,
    },
    PointerMove {
        x: f64,
        y: f64,
        #[serde(default)]
        modifiers: Modifiers,
    },
    PointerUp {
        x: f64,
        y: f64,
        #[serde(default)]
        modifiers: Modifiers,
    },
    /// Escape key: cancel the gesture in flight.
    Escape,
}

impl GestureInput {
    pub fn down(p: Point2D, modifiers: Modifiers) -> Self {
        Self::PointerDown {
            x: p.x,
            y: p.y,
            modifiers,
        }
    }

    pub fn moved(p: Point2D, modifiers: Modifiers) -> Self {
        Self::PointerMove {
            x: p.x,
            y: p.y,
            modifiers,
        }
    }

    pub fn up(p: Point2D, modifiers: Modifiers) -> Self {
        Self::PointerUp {
            x: p.x,
            y: p.y,
            modifiers,
        }
    }

    /// Pointer position carried by this event, if any.
    pub fn position(&self) -> Option<Point2D> {
        match self {
            Self::PointerDown { x, y, .. }
            | Self::PointerMove { x, y, .. }
            | Self::PointerUp { x, y, .. } => Some(Point2D::new(*x, *y)),
            Self::Escape => None,
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        match self {
            Self::PointerDown { modifiers, .. }
            | Self::PointerMove { modifiers, .. }
            | Self::PointerUp { modifiers, .. } => *modifiers,
            Self::Escape => Modifiers::NONE,
        }
    }
}

/// Parse gesture input from JSONL content (one JSON object per line).
/// Blank lines and `#` comments are skipped.
pub fn parse_gesture_script(jsonl: &str) -> Result<Vec<GestureInput>, serde_json::Error> {
    jsonl
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(serde_json::from_str)
        .collect()
}

/// Serialize gesture input to JSONL format.
pub fn serialize_gesture_script(events: &[GestureInput]) -> Result<String, serde_json::Error> {
    let mut output = String::new();
    for event in events {
        output.push_str(&serde_json::to_string(event)?);
        output.push('\n');
    }
    Ok(output)
}
