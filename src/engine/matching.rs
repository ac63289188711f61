use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::engine::availability::is_available;
use crate::geo::{GeoPoint, distance_miles};
use crate::models::booking::Booking;
use crate::models::provider::ProviderCandidate;

/// What a provider is matched against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub location: GeoPoint,
    /// Wall-clock start at the job site. Availability windows are compared
    /// against this local time, not against UTC.
    pub start_time: DateTime<FixedOffset>,
    pub duration_minutes: u32,
}

impl JobRequest {
    pub fn for_booking(booking: &Booking, location: GeoPoint) -> Self {
        Self {
            location,
            start_time: booking.service_date,
            duration_minutes: booking.duration_minutes,
        }
    }
}

/// Providers eligible for `job`, in pool order. No ranking is applied.
pub fn find_candidates(job: &JobRequest, pool: &[ProviderCandidate]) -> Vec<ProviderCandidate> {
    pool.iter()
        .filter(|candidate| is_match(job, candidate))
        .cloned()
        .collect()
}

pub fn is_match(job: &JobRequest, candidate: &ProviderCandidate) -> bool {
    candidate.is_eligible()
        && serves_location(candidate, &job.location)
        && is_available(
            &candidate.availability,
            job.start_time.naive_local(),
            job.duration_minutes,
        )
}

/// Providers without both a service location and radius serve everywhere.
fn serves_location(candidate: &ProviderCandidate, location: &GeoPoint) -> bool {
    match (candidate.service_location, candidate.service_radius_miles) {
        (Some(origin), Some(radius)) => distance_miles(location, &origin) <= radius,
        _ => true,
    }
}
