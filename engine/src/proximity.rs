use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rollcall_primitives::{
    secondary_check_latency, AttendanceError, AttendanceResult, ProximityCheck, ProximityError,
    SECONDARY_CHECK_SUCCESS_PROBABILITY,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProximityMode {
    #[default]
    Randomized,
    Always,
    Never,
}

impl std::str::FromStr for ProximityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "randomized" | "random" | "mock" => Ok(Self::Randomized),
            "always" | "pass" | "on" => Ok(Self::Always),
            "never" | "fail" | "off" => Ok(Self::Never),
            _ => Err(format!("Unknown proximity mode: {}", s)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProximityConfig {
    pub mode: ProximityMode,
    pub success_probability: f64,
    pub latency: Duration,
    /// `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            mode: ProximityMode::Randomized,
            success_probability: SECONDARY_CHECK_SUCCESS_PROBABILITY,
            latency: secondary_check_latency(),
            seed: None,
        }
    }
}

impl ProximityConfig {
    /// `success_probability` must lie in `[0, 1]`.
    pub fn validate(&self) -> AttendanceResult<()> {
        if !(0.0..=1.0).contains(&self.success_probability) {
            return Err(AttendanceError::InvalidSetting {
                name: "success_probability",
                value: self.success_probability,
            });
        }
        Ok(())
    }

    pub fn build(&self) -> AttendanceResult<Box<dyn ProximityCheck>> {
        Ok(match self.mode {
            ProximityMode::Randomized => Box::new(RandomizedProximityCheck::new(self)?),
            ProximityMode::Always => Box::new(FixedProximityCheck::new(true).with_latency(self.latency)),
            ProximityMode::Never => {
                Box::new(FixedProximityCheck::new(false).with_latency(self.latency))
            }
        })
    }
}

/// Stand-in for a short-range radio handshake: after a fixed latency, passes
/// with a fixed probability, independently per call.
pub struct RandomizedProximityCheck {
    success_probability: f64,
    latency: Duration,
    rng: Mutex<ChaCha8Rng>,
}

impl RandomizedProximityCheck {
    pub fn new(config: &ProximityConfig) -> AttendanceResult<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Ok(Self {
            success_probability: config.success_probability,
            latency: config.latency,
            rng: Mutex::new(rng),
        })
    }
}

#[async_trait]
impl ProximityCheck for RandomizedProximityCheck {
    async fn check(&self) -> Result<bool, ProximityError> {
        log::info!("Simulating proximity check...");
        tokio::time::sleep(self.latency).await;

        let nearby = self.rng.lock().await.gen_bool(self.success_probability);
        if nearby {
            log::info!("Proximity check: organizer device detected");
        } else {
            log::info!("Proximity check: organizer device NOT detected");
        }
        Ok(nearby)
    }
}

/// Deterministic double. Counts invocations so callers can assert the check
/// was or was not consulted.
#[derive(Debug, Default)]
pub struct FixedProximityCheck {
    outcome: bool,
    latency: Duration,
    calls: AtomicU32,
}

impl FixedProximityCheck {
    pub fn new(outcome: bool) -> Self {
        Self {
            outcome,
            latency: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProximityCheck for FixedProximityCheck {
    async fn check(&self) -> Result<bool, ProximityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(self.outcome)
    }
}
