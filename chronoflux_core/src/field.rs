//! The potential field: a traveling carrier wave plus transient
//! localized sources ("intents") and down-weighted remote peer pulses.

use crate::peers::PeerTable;
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Per-tick multiplicative energy decay applied to every intent.
pub const INTENT_DECAY: f64 = 0.985;

/// Intents below this energy are removed from the active set.
pub const INTENT_MIN_ENERGY: f64 = 0.02;

/// Default energy of a freshly injected intent.
pub const DEFAULT_INTENT_ENERGY: f64 = 0.35;

/// Default spatial spread of a freshly injected intent.
pub const DEFAULT_INTENT_SIGMA: f64 = 80.0;

/// Direction of the carrier wave, radians.
const WAVE_ANGLE: f64 = 0.35;

/// Wavelength of the carrier, domain units.
const WAVE_SPACING: f64 = 140.0;

/// Carrier propagation speed factor.
const WAVE_SPEED: f64 = 1.4;

/// Carrier speed multiplier.
const WAVE_MACH: f64 = 2.2;

/// Anchor of the carrier as fractions of the domain extents.
const WAVE_ANCHOR: (f64, f64) = (0.2, 0.78);

/// Upper saturation bound of the potential; caps the force magnitude
/// agents can experience.
const POTENTIAL_MAX: f64 = 1.3;

/// Weight applied to pulses reported by remote peers, relative to local
/// intents. Remote activity perturbs the local field without full state
/// replication.
const PEER_PULSE_WEIGHT: f64 = 0.6;

/// A localized, decaying energy source perturbing the potential field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Center x
    pub x: f64,

    /// Center y
    pub y: f64,

    /// Pulse energy, always > 0 while active
    #[serde(rename = "E")]
    pub energy: f64,

    /// Gaussian spread
    pub sigma: f64,
}

impl Intent {
    /// Creates an intent with the default energy and spread.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            energy: DEFAULT_INTENT_ENERGY,
            sigma: DEFAULT_INTENT_SIGMA,
        }
    }

    /// Gaussian contribution of this pulse at `(x, y)`.
    fn bump(&self, x: f64, y: f64) -> f64 {
        let dx = x - self.x;
        let dy = y - self.y;
        let r2 = dx * dx + dy * dy;
        self.energy * (-r2 / (2.0 * self.sigma * self.sigma)).exp()
    }
}

/// The set of active local intents.
#[derive(Debug, Clone, Default)]
pub struct Field {
    intents: Vec<Intent>,
}

impl Field {
    /// Creates an empty field.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an intent to the active set.
    ///
    /// No deduplication: the same pulse arriving twice produces two
    /// independent sources.
    pub fn inject(&mut self, intent: Intent) {
        self.intents.push(intent);
    }

    /// Applies one tick of energy decay, removing exhausted intents.
    ///
    /// Energies are monotonically non-increasing between injections.
    pub fn decay(&mut self) {
        self.intents.retain_mut(|intent| {
            intent.energy *= INTENT_DECAY;
            intent.energy > INTENT_MIN_ENERGY
        });
    }

    /// Returns the active intents.
    pub fn intents(&self) -> &[Intent] {
        &self.intents
    }

    /// Returns the number of active intents.
    pub fn len(&self) -> usize {
        self.intents.len()
    }

    /// Returns true if no intents are active.
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

/// Read-only view over everything the potential depends on at one instant.
///
/// Borrowed from the owning `Simulation` for the duration of a tick body
/// or a rendering pass; the underlying state never mutates while a view
/// is alive.
#[derive(Clone, Copy)]
pub struct FieldView<'a> {
    /// Active local intents
    pub intents: &'a [Intent],

    /// Known remote peer summaries (their pulses blend in down-weighted)
    pub peers: &'a PeerTable,

    /// Global regime flag
    pub portal: bool,

    /// Simulated time
    pub t: f64,

    /// Domain width
    pub width: f64,

    /// Domain height
    pub height: f64,
}

impl FieldView<'_> {
    /// Evaluates the scalar potential at `(x, y)`.
    ///
    /// The carrier is a directional interference band anchored near a
    /// fixed reference point; activating the portal pins its phase to 0,
    /// collapsing the traveling wave to a standing pattern.
    pub fn potential_at(&self, x: f64, y: f64) -> f64 {
        let (dir_x, dir_y) = (WAVE_ANGLE.cos(), WAVE_ANGLE.sin());
        let cx = self.width * WAVE_ANCHOR.0;
        let cy = self.height * WAVE_ANCHOR.1;
        let rx = x - cx;
        let ry = y - cy;

        // Longitudinal and perpendicular offsets along the wave direction.
        let s = rx * dir_x + ry * dir_y;
        let d = (-dir_y * rx + dir_x * ry).abs();

        let k = TAU / WAVE_SPACING;
        let phase = if self.portal {
            0.0
        } else {
            k * s - WAVE_SPEED * self.t * WAVE_MACH
        };

        let sigma_w = WAVE_SPACING * 0.33;
        let mut p = 0.55 + 0.45 * phase.sin() * (-d * d / (2.0 * sigma_w * sigma_w)).exp();

        for intent in self.intents {
            p += intent.bump(x, y);
        }

        for pulse in self.peers.pulses() {
            p += PEER_PULSE_WEIGHT * pulse.bump(x, y);
        }

        p.clamp(0.0, POTENTIAL_MAX)
    }
}
