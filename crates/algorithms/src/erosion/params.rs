//! Scenario parameters for the before/after erosion runs

use serde::{Deserialize, Serialize};
use wetland_core::{Error, Result};

/// Wetland retention efficiencies (fractions 0-1)
///
/// Applied only to the restored ("after") scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Efficiencies {
    pub sediment: f64,
    pub nitrogen: f64,
    pub phosphorus: f64,
}

impl Default for Efficiencies {
    fn default() -> Self {
        Self {
            sediment: 0.7,
            nitrogen: 0.4,
            phosphorus: 0.5,
        }
    }
}

/// Cover-management (C) and support-practice (P) factors of one scenario
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManagementFactors {
    pub cover_management: f64,
    pub support_practice: f64,
}

/// Full parameter set for a benefit calculation
///
/// Field names follow the request payload. Terrain-independent factors
/// (R, K, SDR) are shared by both scenarios; only C and P differ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioParameters {
    /// R factor (MJ mm ha⁻¹ h⁻¹ yr⁻¹)
    pub rainfall_factor: f64,
    /// K factor (t ha h ha⁻¹ MJ⁻¹ mm⁻¹)
    pub soil_erodibility: f64,
    pub cover_management_before: f64,
    pub cover_management_after: f64,
    pub support_practices_before: f64,
    pub support_practices_after: f64,
    /// Fraction of gross erosion reaching the outlet
    pub sediment_delivery_ratio: f64,
    pub efficiencies: Efficiencies,
}

impl Default for ScenarioParameters {
    fn default() -> Self {
        Self {
            rainfall_factor: 600.0,
            soil_erodibility: 0.28,
            cover_management_before: 0.3,
            cover_management_after: 0.05,
            support_practices_before: 0.5,
            support_practices_after: 0.2,
            sediment_delivery_ratio: 0.6,
            efficiencies: Efficiencies::default(),
        }
    }
}

impl ScenarioParameters {
    /// Check that every factor is finite and non-negative, and that the
    /// fractional ones (C, P, SDR, efficiencies) do not exceed 1.
    pub fn validate(&self) -> Result<()> {
        let unbounded = [
            ("rainfall_factor", self.rainfall_factor),
            ("soil_erodibility", self.soil_erodibility),
        ];
        let fractions = [
            ("cover_management_before", self.cover_management_before),
            ("cover_management_after", self.cover_management_after),
            ("support_practices_before", self.support_practices_before),
            ("support_practices_after", self.support_practices_after),
            ("sediment_delivery_ratio", self.sediment_delivery_ratio),
            ("efficiencies.sediment", self.efficiencies.sediment),
            ("efficiencies.nitrogen", self.efficiencies.nitrogen),
            ("efficiencies.phosphorus", self.efficiencies.phosphorus),
        ];

        for (name, value) in unbounded {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::invalid_parameter(name, value, "must be a finite number >= 0"));
            }
        }
        for (name, value) in fractions {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(Error::invalid_parameter(name, value, "must be between 0 and 1"));
            }
        }

        Ok(())
    }

    /// C and P for the current land management
    pub fn before(&self) -> ManagementFactors {
        ManagementFactors {
            cover_management: self.cover_management_before,
            support_practice: self.support_practices_before,
        }
    }

    /// C and P after restoration
    pub fn after(&self) -> ManagementFactors {
        ManagementFactors {
            cover_management: self.cover_management_after,
            support_practice: self.support_practices_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ScenarioParameters::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_out_of_range() {
        let params = ScenarioParameters {
            cover_management_after: 1.5,
            ..Default::default()
        };
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("cover_management_after"));

        let params = ScenarioParameters {
            rainfall_factor: f64::NAN,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = ScenarioParameters {
            efficiencies: Efficiencies {
                nitrogen: -0.1,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_partial_payload_uses_defaults() {
        let params: ScenarioParameters = serde_json::from_str(
            r#"{"rainfall_factor": 1200, "efficiencies": {"sediment": 0.9}}"#,
        )
        .unwrap();
        assert_eq!(params.rainfall_factor, 1200.0);
        assert_eq!(params.soil_erodibility, 0.28);
        assert_eq!(params.efficiencies.sediment, 0.9);
        assert_eq!(params.efficiencies.phosphorus, 0.5);
    }
}
