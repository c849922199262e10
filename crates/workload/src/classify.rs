use serde::Serialize;

use crate::config::CapacityThresholds;
use crate::error::EngineError;
use crate::model::CapacityStatus;

/// Hours / available hours. Available hours must be positive and finite.
pub fn utilization(person_id: &str, hours: f64, available_hours: f64) -> Result<f64, EngineError> {
    if !available_hours.is_finite() || available_hours <= 0.0 {
        return Err(EngineError::InvalidAvailableHours {
            person_id: person_id.to_string(),
            hours: available_hours,
        });
    }
    Ok(hours / available_hours)
}

/// Map a utilization ratio onto a capacity band. Bands are closed on the lower edge.
pub fn classify_utilization(ratio: f64, thresholds: &CapacityThresholds) -> CapacityStatus {
    if ratio >= thresholds.over {
        CapacityStatus::OverCapacity
    } else if ratio >= thresholds.near {
        CapacityStatus::NearCapacity
    } else {
        CapacityStatus::Available
    }
}

/// Capacity figures for one person. Fields are private: the ratio and status can only be
/// derived from the hours they describe, never set independently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Capacity {
    weekly_hours: f64,
    available_hours: f64,
    utilization: f64,
    status: CapacityStatus,
}

impl Capacity {
    pub fn compute(
        person_id: &str,
        weekly_hours: f64,
        available_hours: f64,
        thresholds: &CapacityThresholds,
    ) -> Result<Self, EngineError> {
        let ratio = utilization(person_id, weekly_hours, available_hours)?;
        Ok(Self {
            weekly_hours,
            available_hours,
            utilization: ratio,
            status: classify_utilization(ratio, thresholds),
        })
    }

    pub fn weekly_hours(&self) -> f64 {
        self.weekly_hours
    }

    pub fn available_hours(&self) -> f64 {
        self.available_hours
    }

    pub fn utilization(&self) -> f64 {
        self.utilization
    }

    pub fn status(&self) -> CapacityStatus {
        self.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(ratio: f64) -> CapacityStatus {
        classify_utilization(ratio, &CapacityThresholds::default())
    }

    #[test]
    fn band_boundaries() {
        assert_eq!(classify(0.0), CapacityStatus::Available);
        assert_eq!(classify(0.79999), CapacityStatus::Available);
        assert_eq!(classify(0.8), CapacityStatus::NearCapacity);
        assert_eq!(classify(0.99999), CapacityStatus::NearCapacity);
        assert_eq!(classify(1.0), CapacityStatus::OverCapacity);
        assert_eq!(classify(2.5), CapacityStatus::OverCapacity);
    }

    #[test]
    fn custom_thresholds() {
        let t = CapacityThresholds { near: 0.6, over: 0.85 };
        assert_eq!(classify_utilization(0.59, &t), CapacityStatus::Available);
        assert_eq!(classify_utilization(0.6, &t), CapacityStatus::NearCapacity);
        assert_eq!(classify_utilization(0.85, &t), CapacityStatus::OverCapacity);
    }

    #[test]
    fn zero_or_negative_available_hours_rejected() {
        for bad in [0.0, -8.0, f64::NAN, f64::INFINITY] {
            let err = utilization("p1", 10.0, bad).unwrap_err();
            assert!(matches!(err, EngineError::InvalidAvailableHours { .. }), "{bad}");
        }
    }

    #[test]
    fn capacity_is_derived_from_hours() {
        let c = Capacity::compute("p1", 36.0, 40.0, &CapacityThresholds::default()).unwrap();
        assert_eq!(c.utilization(), 0.9);
        assert_eq!(c.status(), CapacityStatus::NearCapacity);
        assert_eq!(c.available_hours(), 40.0);
    }
}
