//! Post-execution verification: did cost actually drop, and is the service
//! still healthy?

use chrono::Utc;

use crate::domain::{VerificationRecommendation, VerificationResult};
use crate::errors::ApplicationError;
use crate::triage::values::get_f64;
use crate::triage::CostFetcher;

/// Checks observed cost reduction and service health, then recommends an
/// outcome. The health probe is a placeholder until alarm and error-rate
/// checks land; until then a healthy service plus observed savings closes
/// the anomaly, anything else stays on monitor.
pub async fn verify(
    service: &str,
    account_id: &str,
    cost: &dyn CostFetcher,
    window_start: &str,
    window_end: &str,
) -> Result<VerificationResult, ApplicationError> {
    let verified_at = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let health_details = "stub: ok".to_string();

    let timeseries =
        cost.get_cost_timeseries(service, account_id, window_start, window_end).await?;
    let observed = get_f64(&timeseries, "observed_savings_daily", 0.0);

    if observed > 0.0 {
        return Ok(VerificationResult {
            verified_at,
            cost_reduction_observed: true,
            observed_savings_daily: observed,
            service_health_ok: true,
            health_check_details: health_details,
            recommendation: VerificationRecommendation::Close,
        });
    }

    Ok(VerificationResult {
        verified_at,
        cost_reduction_observed: false,
        observed_savings_daily: 0.0,
        service_health_ok: true,
        health_check_details: health_details,
        recommendation: VerificationRecommendation::Monitor,
    })
}
