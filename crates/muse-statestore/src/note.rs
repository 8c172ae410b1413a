// SPDX-License-Identifier: MIT OR Apache-2.0
//! The note and controller-event shapes a region's live state is made of.

use serde::{Deserialize, Serialize};

/// A single MIDI note held in a region's live state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// Identifier, stable for the lifetime of the note.
    pub id: String,
    /// MIDI pitch (0-127).
    pub pitch: u8,
    /// Start position in beats, relative to the region.
    pub start_beat: f64,
    /// Duration in beats.
    pub duration_beats: f64,
    /// MIDI velocity (0-127).
    pub velocity: u8,
    /// MIDI channel (0-15).
    pub channel: u8,
}

/// A controller-plane event held in a region's live state: a MIDI CC
/// value, a pitch-bend value, or channel aftertouch. Applied after a
/// region's note changes, never before — a pitch bend riding under notes
/// that don't exist yet would be meaningless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControllerEvent {
    /// A MIDI CC (controller number 0-127) value change.
    Cc {
        /// Stable identifier within the region.
        id: String,
        /// Controller number (0-127).
        controller: u8,
        /// Controller value (0-127).
        value: u8,
        /// Position in beats, relative to the region.
        beat: f64,
        /// MIDI channel (0-15).
        channel: u8,
    },
    /// A pitch-bend value change.
    PitchBend {
        /// Stable identifier within the region.
        id: String,
        /// Bend value (-8192..=8191, 0 is center).
        value: i16,
        /// Position in beats, relative to the region.
        beat: f64,
        /// MIDI channel (0-15).
        channel: u8,
    },
    /// A channel aftertouch pressure change.
    Aftertouch {
        /// Stable identifier within the region.
        id: String,
        /// Pressure (0-127).
        pressure: u8,
        /// Position in beats, relative to the region.
        beat: f64,
        /// MIDI channel (0-15).
        channel: u8,
    },
}

impl ControllerEvent {
    /// This event's stable identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Cc { id, .. } | Self::PitchBend { id, .. } | Self::Aftertouch { id, .. } => id,
        }
    }
}
