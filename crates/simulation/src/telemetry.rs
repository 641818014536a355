//! Telemetry packets and the last-known-good feed.
//!
//! A [`TelemetryPacket`] is the four-value signal vector that drives every
//! risk estimate. [`TelemetryFeed`] tolerates gaps and bad readings: the
//! engine always reads the last packet that passed validation, or the nominal
//! defaults before any has arrived.
//!
//! [`SyntheticTelemetry`] is the built-in deterministic source. It emits
//! jittered packets around a profile that the orchestrator switches as a run
//! progresses (storm on injection, recovery during execution).

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::crisis_params::TelemetryParams;
use crate::sim_rng::SeededRng;

/// One environmental and social reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPacket {
    /// Rainfall in millimetres.
    pub rainfall: f64,
    /// Drainage capacity in [0, 1].
    pub drainage_capacity: f64,
    /// Population density in [0, 1].
    pub population_density: f64,
    /// Social-media distress spike in [0, 1].
    pub social_spike: f64,
}

impl Default for TelemetryPacket {
    fn default() -> Self {
        Self::NOMINAL
    }
}

impl TelemetryPacket {
    /// Quiet weather with healthy drainage.
    pub const NOMINAL: TelemetryPacket = TelemetryPacket {
        rainfall: 12.0,
        drainage_capacity: 0.9,
        population_density: 0.55,
        social_spike: 0.08,
    };

    /// Peak storm conditions used when a crisis is injected.
    pub const STORM: TelemetryPacket = TelemetryPacket {
        rainfall: 128.0,
        drainage_capacity: 0.22,
        population_density: 0.78,
        social_spike: 0.86,
    };

    /// Conditions once mitigation has fully taken effect.
    pub const MITIGATED: TelemetryPacket = TelemetryPacket {
        rainfall: 35.0,
        drainage_capacity: 0.8,
        population_density: 0.78,
        social_spike: 0.25,
    };

    pub fn new(
        rainfall: f64,
        drainage_capacity: f64,
        population_density: f64,
        social_spike: f64,
    ) -> Self {
        Self {
            rainfall,
            drainage_capacity,
            population_density,
            social_spike,
        }
    }

    /// Check every field is finite and inside its domain.
    pub fn validate(&self) -> Result<(), String> {
        let fields = [
            ("rainfall", self.rainfall),
            ("drainage_capacity", self.drainage_capacity),
            ("population_density", self.population_density),
            ("social_spike", self.social_spike),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(format!("{name} is not finite"));
            }
        }
        if self.rainfall < 0.0 {
            return Err(format!("rainfall {} is negative", self.rainfall));
        }
        for (name, value) in &fields[1..] {
            if !(0.0..=1.0).contains(value) {
                return Err(format!("{name} {value} is outside [0, 1]"));
            }
        }
        Ok(())
    }

    /// Linear blend towards `other`; `t` is clamped to [0, 1].
    pub fn lerp(&self, other: &TelemetryPacket, t: f64) -> TelemetryPacket {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: f64, b: f64| a + (b - a) * t;
        TelemetryPacket {
            rainfall: mix(self.rainfall, other.rainfall),
            drainage_capacity: mix(self.drainage_capacity, other.drainage_capacity),
            population_density: mix(self.population_density, other.population_density),
            social_spike: mix(self.social_spike, other.social_spike),
        }
    }
}

// =============================================================================
// TelemetryFeed
// =============================================================================

/// Outcome of offering a packet to the feed.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingest {
    Accepted,
    Rejected(String),
}

/// Latest telemetry with last-known-good fallback.
#[derive(Resource, Debug, Clone, Default)]
pub struct TelemetryFeed {
    last_good: Option<TelemetryPacket>,
    last_arrival_tick: Option<u64>,
    gap_reported: bool,
    accepted: u64,
    rejected: u64,
}

impl TelemetryFeed {
    /// Offer a packet that arrived at `tick`.
    pub fn ingest(&mut self, packet: TelemetryPacket, tick: u64) -> Ingest {
        if let Err(reason) = packet.validate() {
            self.rejected += 1;
            return Ingest::Rejected(reason);
        }
        self.last_good = Some(packet);
        self.last_arrival_tick = Some(tick);
        self.gap_reported = false;
        self.accepted += 1;
        Ingest::Accepted
    }

    /// Last known good packet, or the nominal defaults.
    pub fn current(&self) -> TelemetryPacket {
        self.last_good.unwrap_or_default()
    }

    pub fn has_reading(&self) -> bool {
        self.last_good.is_some()
    }

    pub fn last_arrival_tick(&self) -> Option<u64> {
        self.last_arrival_tick
    }

    pub fn accepted_count(&self) -> u64 {
        self.accepted
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }

    /// Returns `true` exactly once per gap, when no packet has arrived for
    /// `stale_after` ticks.
    pub fn check_gap(&mut self, now: u64, stale_after: u64) -> bool {
        let since = now.saturating_sub(self.last_arrival_tick.unwrap_or(0));
        if since >= stale_after && !self.gap_reported {
            self.gap_reported = true;
            return true;
        }
        false
    }
}

// =============================================================================
// SyntheticTelemetry
// =============================================================================

/// Weather profile of the synthetic source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "profile", rename_all = "snake_case")]
pub enum TelemetryProfile {
    Nominal,
    Storm,
    /// Blend from storm to mitigated conditions; `progress` in [0, 1].
    Recovery { progress: f64 },
}

impl TelemetryProfile {
    pub fn base(&self) -> TelemetryPacket {
        match self {
            TelemetryProfile::Nominal => TelemetryPacket::NOMINAL,
            TelemetryProfile::Storm => TelemetryPacket::STORM,
            TelemetryProfile::Recovery { progress } => {
                TelemetryPacket::STORM.lerp(&TelemetryPacket::MITIGATED, *progress)
            }
        }
    }
}

/// Deterministic synthetic telemetry source.
#[derive(Resource, Debug, Clone)]
pub struct SyntheticTelemetry {
    pub enabled: bool,
    profile: TelemetryProfile,
    rng: SeededRng,
    jitter: f64,
    interval: u64,
    /// A profile change emits on the next ingest tick, off-interval.
    pending: bool,
}

impl Default for SyntheticTelemetry {
    fn default() -> Self {
        Self::from_params(&TelemetryParams::default())
    }
}

impl SyntheticTelemetry {
    pub fn from_params(params: &TelemetryParams) -> Self {
        Self {
            enabled: params.synthetic,
            profile: TelemetryProfile::Nominal,
            rng: SeededRng::new(params.seed),
            jitter: params.jitter,
            interval: params.emit_interval_ticks.max(1),
            pending: true,
        }
    }

    pub fn profile(&self) -> TelemetryProfile {
        self.profile
    }

    pub fn set_profile(&mut self, profile: TelemetryProfile) {
        self.profile = profile;
        self.pending = true;
    }

    /// Next packet if one is due at `tick`.
    pub fn poll(&mut self, tick: u64) -> Option<TelemetryPacket> {
        if !self.enabled {
            return None;
        }
        if !self.pending && tick % self.interval != 0 {
            return None;
        }
        self.pending = false;
        Some(self.sample())
    }

    /// Jittered packet around the current profile, clamped to valid domains.
    pub fn sample(&mut self) -> TelemetryPacket {
        let base = self.profile.base();
        let j = self.jitter;
        let mut wobble = |v: f64| v * (1.0 + self.rng.range(-j, j));
        TelemetryPacket {
            rainfall: wobble(base.rainfall).max(0.0),
            drainage_capacity: wobble(base.drainage_capacity).clamp(0.0, 1.0),
            population_density: wobble(base.population_density).clamp(0.0, 1.0),
            social_spike: wobble(base.social_spike).clamp(0.0, 1.0),
        }
    }
}
