use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rollcall_primitives::{
    AcquisitionOptions, Coordinate, LocationError, LocationProvider, EARTH_RADIUS_METERS,
};
use std::time::Duration;
use tokio::sync::Mutex;

/// Acquire a coordinate, failing with `Timeout` when the provider does not
/// resolve within `options.timeout`. The provider's own future is dropped on
/// timeout.
pub async fn acquire_within<L>(
    provider: &L,
    options: &AcquisitionOptions,
) -> Result<Coordinate, LocationError>
where
    L: LocationProvider + ?Sized,
{
    log::info!("Requesting GPS coordinates...");
    let result = match tokio::time::timeout(options.timeout, provider.acquire(options)).await {
        Ok(result) => result,
        Err(_) => Err(LocationError::Timeout),
    };

    match &result {
        Ok(coordinate) => log::info!("GPS acquired: {}", coordinate),
        Err(e) => log::warn!("Error getting location: {}", e),
    }
    result
}

/// Always reports the same coordinate, or the same failure.
#[derive(Clone, Debug)]
pub struct FixedLocation {
    result: Result<Coordinate, LocationError>,
}

impl FixedLocation {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            result: Ok(coordinate),
        }
    }

    pub fn failing(kind: LocationError) -> Self {
        Self { result: Err(kind) }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn acquire(&self, _options: &AcquisitionOptions) -> Result<Coordinate, LocationError> {
        self.result
    }
}

#[derive(Clone, Debug)]
pub struct MockLocationConfig {
    pub anchor: Coordinate,
    /// Reported positions fall uniformly inside this radius around `anchor`.
    pub jitter_meters: f64,
    pub accuracy_range: (f64, f64),
    pub latency: Duration,
    pub seed: u64,
}

impl Default for MockLocationConfig {
    fn default() -> Self {
        Self {
            anchor: Coordinate::exact(0.0, 0.0),
            jitter_meters: 5.0,
            accuracy_range: (3.0, 15.0),
            latency: Duration::from_millis(200),
            seed: 42,
        }
    }
}

/// Seeded stand-in for a GPS fix: the anchor plus bounded random offset.
pub struct MockLocation {
    config: MockLocationConfig,
    rng: Mutex<ChaCha8Rng>,
}

impl MockLocation {
    pub fn new(config: MockLocationConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            config,
            rng: Mutex::new(rng),
        }
    }

    fn offset(anchor: &Coordinate, meters: f64, bearing: f64) -> (f64, f64) {
        let d_lat = meters * bearing.cos() / EARTH_RADIUS_METERS;
        let cos_lat = anchor.latitude.to_radians().cos().abs().max(1e-9);
        let d_lon = meters * bearing.sin() / (EARTH_RADIUS_METERS * cos_lat);
        (
            anchor.latitude + d_lat.to_degrees(),
            anchor.longitude + d_lon.to_degrees(),
        )
    }
}

#[async_trait]
impl LocationProvider for MockLocation {
    async fn acquire(&self, _options: &AcquisitionOptions) -> Result<Coordinate, LocationError> {
        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }

        let (meters, bearing, accuracy) = {
            let mut rng = self.rng.lock().await;
            let jitter = self.config.jitter_meters.max(0.0);
            let meters = jitter * rng.gen::<f64>().sqrt();
            let bearing = rng.gen_range(0.0..std::f64::consts::TAU);
            let (lo, hi) = self.config.accuracy_range;
            let accuracy = if hi > lo { rng.gen_range(lo..hi) } else { lo };
            (meters, bearing, accuracy.max(0.0))
        };

        let (latitude, longitude) = Self::offset(&self.config.anchor, meters, bearing);
        Ok(Coordinate {
            latitude,
            longitude,
            accuracy_meters: accuracy,
        })
    }
}
