use chrono::FixedOffset;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::decimal::{Money, Rate};
use crate::errors::{CreditError, Result};
use crate::interest::{FreeCreditConfig, PenaltyConfig};

/// engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub penalty: PenaltyConfig,
    pub free_credit: FreeCreditConfig,
    pub settlement: SettlementConfig,
    pub business_time: BusinessTimeConfig,
    pub store: StoreConfig,
}

/// rules for matching a payment to the outstanding debt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// amounts within this distance of the debt count as full liquidation
    pub tolerance: Money,
}

/// business timezone, as a fixed offset from utc
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessTimeConfig {
    pub utc_offset_seconds: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// maximum wait for a row lock
    pub lock_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl EngineConfig {
    /// production rules: 2.5% daily mora, 60% per free cycle, 3 cycles, utc-5
    pub fn standard() -> Self {
        Self {
            penalty: PenaltyConfig::new(Rate::from_percent(dec!(2.5))),
            free_credit: FreeCreditConfig {
                cycle_interest_rate: Rate::from_percentage(60),
                daily_penalty_rate: Rate::from_percent(dec!(2.5)),
                max_cycles: 3,
            },
            settlement: SettlementConfig {
                tolerance: Money::CENT,
            },
            business_time: BusinessTimeConfig {
                utc_offset_seconds: -5 * 3600,
            },
            store: StoreConfig {
                lock_timeout_ms: 5_000,
            },
        }
    }

    /// standard rules with the business day on utc
    pub fn utc() -> Self {
        let mut config = Self::standard();
        config.business_time.utc_offset_seconds = 0;
        config
    }

    /// load from a json document
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| CreditError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.penalty.daily_rate.as_decimal() < dec!(0) {
            return Err(CreditError::InvalidConfiguration {
                message: "penalty daily rate must not be negative".to_string(),
            });
        }
        if self.free_credit.daily_penalty_rate.as_decimal() < dec!(0)
            || self.free_credit.cycle_interest_rate.as_decimal() < dec!(0)
        {
            return Err(CreditError::InvalidConfiguration {
                message: "free credit rates must not be negative".to_string(),
            });
        }
        if self.free_credit.max_cycles == 0 {
            return Err(CreditError::InvalidConfiguration {
                message: "free credit needs at least one cycle".to_string(),
            });
        }
        if self.settlement.tolerance.is_negative() {
            return Err(CreditError::InvalidConfiguration {
                message: "settlement tolerance must not be negative".to_string(),
            });
        }
        self.business_offset()?;
        Ok(())
    }

    pub fn business_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.business_time.utc_offset_seconds).ok_or_else(|| {
            CreditError::InvalidConfiguration {
                message: format!(
                    "utc offset out of range: {}",
                    self.business_time.utc_offset_seconds
                ),
            }
        })
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.store.lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_rules() {
        let config = EngineConfig::standard();

        assert_eq!(config.penalty.daily_rate, Rate::from_bps(250));
        assert_eq!(config.free_credit.cycle_interest_rate, Rate::from_percentage(60));
        assert_eq!(config.free_credit.max_cycles, 3);
        assert_eq!(config.settlement.tolerance, Money::CENT);
        assert_eq!(config.business_offset().unwrap().local_minus_utc(), -18_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        let json = serde_json::to_string(&EngineConfig::utc()).unwrap();
        let loaded = EngineConfig::from_json(&json).unwrap();

        assert_eq!(loaded, EngineConfig::utc());
        assert_eq!(loaded.lock_timeout(), Duration::from_millis(5_000));
    }

    #[test]
    fn test_rejects_invalid_offset() {
        let mut config = EngineConfig::standard();
        config.business_time.utc_offset_seconds = 90_000;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::standard();
        config.free_credit.max_cycles = 0;
        assert!(matches!(
            config.validate(),
            Err(CreditError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = EngineConfig::from_json("{\"penalty\": 3}").unwrap_err();
        assert_eq!(err.code(), "CONFIGURACION_INVALIDA");
    }
}
