//! Scheduled detection workflow shell. Runs on the detect queue; anomaly
//! detection itself is an external concern, so the workflow currently
//! reports zero findings. In production it will call a DetectAnomalies
//! activity and spawn one child lifecycle per anomaly found.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub anomalies_found: u32,
}

pub async fn scheduled_detection() -> DetectionResult {
    tracing::info!("scheduled detection run");
    DetectionResult { anomalies_found: 0 }
}
