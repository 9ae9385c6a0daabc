use anyhow::{Context, Result};
use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Time of day with minute precision, written as `HH:MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    pub fn as_naive(&self) -> NaiveTime {
        self.0
    }
}

impl FromStr for ClockTime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let time = NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .with_context(|| format!("Invalid time '{}', expected HH:MM", s))?;
        Ok(Self(time))
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(|e: anyhow::Error| serde::de::Error::custom(format!("{:#}", e)))
    }
}

/// Half-open daily window `[start, end)`
///
/// A window whose start is later than its end crosses midnight, so
/// 22:00-06:00 covers the late evening and the early morning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl TimeWindow {
    pub fn new(start: ClockTime, end: ClockTime) -> Self {
        Self { start, end }
    }

    /// Whether the window wraps past midnight
    pub fn crosses_midnight(&self) -> bool {
        self.start > self.end
    }

    /// Check whether a local time of day falls inside the window
    pub fn contains(&self, now: NaiveTime) -> bool {
        let start = self.start.as_naive();
        let end = self.end.as_naive();

        if self.crosses_midnight() {
            now >= start || now < end
        } else {
            start <= now && now < end
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    fn window(start: &str, end: &str) -> TimeWindow {
        TimeWindow::new(start.parse().unwrap(), end.parse().unwrap())
    }

    #[test]
    fn test_parse_clock_time() {
        let time: ClockTime = "09:30".parse().unwrap();
        assert_eq!(time.hour(), 9);
        assert_eq!(time.minute(), 30);
        assert_eq!(time.to_string(), "09:30");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("25:00".parse::<ClockTime>().is_err());
        assert!("9am".parse::<ClockTime>().is_err());
        assert!("".parse::<ClockTime>().is_err());
    }

    #[test]
    fn test_daytime_window_is_half_open() {
        let w = window("09:00", "17:00");
        assert!(!w.crosses_midnight());
        assert!(!w.contains(at(8, 59)));
        assert!(w.contains(at(9, 0)));
        assert!(w.contains(at(12, 0)));
        assert!(w.contains(at(16, 59)));
        assert!(!w.contains(at(17, 0)));
        assert!(!w.contains(at(20, 0)));
    }

    #[test]
    fn test_window_crossing_midnight() {
        let w = window("22:00", "06:00");
        assert!(w.crosses_midnight());
        assert!(w.contains(at(23, 0)));
        assert!(w.contains(at(0, 0)));
        assert!(w.contains(at(2, 0)));
        assert!(!w.contains(at(6, 0)));
        assert!(!w.contains(at(10, 0)));
        assert!(w.contains(at(22, 0)));
    }

    #[test]
    fn test_seconds_inside_last_minute() {
        let w = window("09:00", "17:00");
        let almost = NaiveTime::from_hms_opt(16, 59, 59).unwrap();
        assert!(w.contains(almost));
    }

    #[test]
    fn test_clock_time_serde() {
        let time: ClockTime = serde_yaml::from_str("\"07:05\"").unwrap();
        assert_eq!(time.as_naive(), NaiveTime::from_hms_opt(7, 5, 0).unwrap());

        let yaml = serde_yaml::to_string(&time).unwrap();
        assert!(yaml.contains("07:05"));

        assert!(serde_yaml::from_str::<ClockTime>("\"7 o'clock\"").is_err());
    }
}
