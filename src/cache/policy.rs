use chrono::{DateTime, Datelike, Local, TimeDelta, Timelike};

use crate::config::{Settings, TradingHoursSettings, secs_delta};

/// Weekday hour band during which the index is trading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TradingHours {
    pub open_hour: u32,
    /// Exclusive.
    pub close_hour: u32,
}

impl TradingHours {
    pub fn from_settings(s: &TradingHoursSettings) -> Self {
        Self {
            open_hour: s.open_hour,
            close_hour: s.close_hour,
        }
    }

    /// Monday to Friday, local hour in `[open_hour, close_hour)`.
    pub fn contains(&self, t: DateTime<Local>) -> bool {
        if t.weekday().number_from_monday() >= 6 {
            return false;
        }
        (self.open_hour..self.close_hour).contains(&t.hour())
    }
}

/// Decides whether a cached artifact must be rebuilt.
#[derive(Clone, Copy, Debug)]
pub struct StalenessPolicy {
    pub regen_interval: TimeDelta,
    pub forced_refresh: TimeDelta,
    pub trading_hours: TradingHours,
}

impl StalenessPolicy {
    pub fn from_settings(s: &Settings) -> Self {
        Self {
            regen_interval: secs_delta(s.regen_interval_secs).unwrap_or(TimeDelta::MAX),
            forced_refresh: secs_delta(s.forced_refresh_secs).unwrap_or(TimeDelta::MAX),
            trading_hours: TradingHours::from_settings(&s.trading_hours),
        }
    }

    /// An empty slot always regenerates. Otherwise the artifact must be older
    /// than the regeneration interval and one of these must hold: the market
    /// is trading now, the trading status changed since production, or the
    /// artifact is older than the forced refresh age.
    pub fn needs_regeneration(
        &self,
        produced_at: Option<DateTime<Local>>,
        now: DateTime<Local>,
    ) -> bool {
        let Some(produced_at) = produced_at else {
            return true;
        };
        let elapsed = now.signed_duration_since(produced_at);
        if elapsed <= self.regen_interval {
            return false;
        }
        let trading_now = self.trading_hours.contains(now);
        trading_now
            || trading_now != self.trading_hours.contains(produced_at)
            || elapsed > self.forced_refresh
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn oversized_intervals_saturate_instead_of_panicking() {
        let s = Settings {
            regen_interval_secs: u64::MAX,
            forced_refresh_secs: u64::MAX,
            ..Settings::default()
        };
        let p = StalenessPolicy::from_settings(&s);
        assert_eq!(p.regen_interval, TimeDelta::MAX);
        let t0 = Local.with_ymd_and_hms(2026, 10, 14, 10, 0, 0).unwrap();
        assert!(!p.needs_regeneration(Some(t0), t0 + TimeDelta::days(3650)));
    }

    fn policy() -> StalenessPolicy {
        StalenessPolicy::from_settings(&Settings::default())
    }

    fn at(d: u32, h: u32, m: u32, s: u32) -> DateTime<Local> {
        // October 2026: the 12th is a Monday, the 17th a Saturday.
        Local.with_ymd_and_hms(2026, 10, d, h, m, s).unwrap()
    }

    #[test]
    fn trading_hours_are_weekday_and_half_open() {
        let th = policy().trading_hours;
        assert!(th.contains(at(12, 9, 0, 0)));
        assert!(th.contains(at(16, 15, 59, 59)));
        assert!(!th.contains(at(16, 16, 0, 0)));
        assert!(!th.contains(at(12, 8, 59, 59)));
        assert!(!th.contains(at(17, 10, 0, 0)));
        assert!(!th.contains(at(18, 10, 0, 0)));
    }

    #[test]
    fn empty_slot_always_regenerates() {
        assert!(policy().needs_regeneration(None, at(17, 3, 0, 0)));
    }

    #[test]
    fn within_interval_never_regenerates() {
        let p = policy();
        let t0 = at(14, 10, 0, 0);
        assert!(!p.needs_regeneration(Some(t0), t0 + TimeDelta::seconds(299)));
        assert!(!p.needs_regeneration(Some(t0), t0 + TimeDelta::seconds(300)));
    }

    #[test]
    fn trading_hours_regenerate_after_interval() {
        let p = policy();
        let t0 = at(14, 10, 0, 0);
        assert!(p.needs_regeneration(Some(t0), t0 + TimeDelta::seconds(301)));
    }

    #[test]
    fn outside_trading_hours_stays_until_status_change_or_forced_age() {
        let p = policy();
        let t0 = at(14, 18, 0, 0);
        assert!(!p.needs_regeneration(Some(t0), at(14, 23, 0, 0)));
        assert!(!p.needs_regeneration(Some(t0), at(15, 8, 59, 0)));
        assert!(p.needs_regeneration(Some(t0), at(15, 9, 0, 0)));

        let sat = at(17, 12, 0, 0);
        assert!(!p.needs_regeneration(Some(sat), at(18, 12, 0, 0)));
        assert!(p.needs_regeneration(Some(sat), at(18, 12, 0, 1)));
    }

    #[test]
    fn close_transition_waits_for_the_interval() {
        let p = policy();
        let t0 = at(14, 15, 58, 0);
        assert!(!p.needs_regeneration(Some(t0), at(14, 16, 1, 0)));
        assert!(p.needs_regeneration(Some(t0), at(14, 16, 3, 1)));
    }
}
