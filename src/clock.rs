use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use hourglass_rs::{SafeTimeProvider, TimeSource};

use crate::config::EngineConfig;
use crate::errors::Result;

/// business clock: "today" is the calendar date in the business timezone
pub struct BusinessClock {
    time: SafeTimeProvider,
    offset: FixedOffset,
}

impl BusinessClock {
    pub fn new(time: SafeTimeProvider, offset: FixedOffset) -> Self {
        Self { time, offset }
    }

    /// wall clock in the configured timezone
    pub fn system(config: &EngineConfig) -> Result<Self> {
        Self::from_config(SafeTimeProvider::new(TimeSource::System), config)
    }

    pub fn from_config(time: SafeTimeProvider, config: &EngineConfig) -> Result<Self> {
        Ok(Self::new(time, config.business_offset()?))
    }

    /// current instant, for audit timestamps
    pub fn now(&self) -> DateTime<Utc> {
        self.time.now()
    }

    /// current calendar date in the business timezone
    pub fn today(&self) -> NaiveDate {
        self.time.now().with_timezone(&self.offset).date_naive()
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn provider(&self) -> &SafeTimeProvider {
        &self.time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_today_uses_business_offset() {
        // 03:00 utc is still the previous evening in lima
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 3, 10, 3, 0, 0).unwrap(),
        ));
        let clock = BusinessClock::from_config(time, &EngineConfig::standard()).unwrap();

        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());

        let utc_clock = BusinessClock::new(
            SafeTimeProvider::new(TimeSource::Test(
                Utc.with_ymd_and_hms(2024, 3, 10, 3, 0, 0).unwrap(),
            )),
            FixedOffset::east_opt(0).unwrap(),
        );
        assert_eq!(utc_clock.today(), NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
    }

    #[test]
    fn test_today_follows_controlled_time() {
        let time = SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap(),
        ));
        let clock = BusinessClock::from_config(time, &EngineConfig::utc()).unwrap();
        let control = clock.provider().test_control().unwrap();

        control.advance(Duration::days(1));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }
}
