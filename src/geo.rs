use std::time::Duration;

use async_trait::async_trait;

use crate::models::UNKNOWN_LOCATION;

pub const DEFAULT_GEOLOCATION_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Parses `"<lat>,<lon>"`, rejecting values outside the valid ranges.
    pub fn parse(raw: &str) -> Option<Self> {
        let (lat, lon) = raw.split_once(',')?;
        let latitude: f64 = lat.trim().parse().ok()?;
        let longitude: f64 = lon.trim().parse().ok()?;

        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }

        Some(Self {
            latitude,
            longitude,
        })
    }

    pub fn display(&self) -> String {
        format!("{:.2}, {:.2}", self.latitude, self.longitude)
    }
}

/// What the client told us about itself when following a short link.
#[derive(Debug, Clone, Default)]
pub struct RedirectContext {
    pub referrer: Option<String>,
    pub user_agent: Option<String>,
    pub coordinates: Option<Coordinates>,
}

#[async_trait]
pub trait Geolocator: Send + Sync + 'static {
    /// `None` means denied or unavailable.
    async fn locate(&self, ctx: &RedirectContext) -> Option<Coordinates>;
}

/// Uses whatever position the client chose to share.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientReported;

#[async_trait]
impl Geolocator for ClientReported {
    async fn locate(&self, ctx: &RedirectContext) -> Option<Coordinates> {
        ctx.coordinates
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

#[async_trait]
impl Geolocator for Unavailable {
    async fn locate(&self, _ctx: &RedirectContext) -> Option<Coordinates> {
        None
    }
}

/// Best-effort lookup: a timeout or refusal both yield the unknown sentinel.
pub async fn resolve_location(
    geolocator: &dyn Geolocator,
    ctx: &RedirectContext,
    timeout: Duration,
) -> String {
    match tokio::time::timeout(timeout, geolocator.locate(ctx)).await {
        Ok(Some(coords)) => coords.display(),
        Ok(None) => UNKNOWN_LOCATION.to_string(),
        Err(_) => {
            tracing::debug!("geolocation timed out after {:?}", timeout);
            UNKNOWN_LOCATION.to_string()
        }
    }
}
