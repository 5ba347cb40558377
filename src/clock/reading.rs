use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandAngles {
    pub hour_deg: f64,
    pub minute_deg: f64,
    pub second_deg: f64,
}

/// Hand angles in degrees clockwise from twelve. Minute and hour hands
/// advance fractionally so they sweep instead of jumping.
pub fn hand_angles(hours: u32, minutes: u32, seconds: u32) -> HandAngles {
    let (h, m, s) = (f64::from(hours % 12), f64::from(minutes), f64::from(seconds));
    HandAngles {
        hour_deg: h * 30.0 + m * 0.5,
        minute_deg: m * 6.0 + s * 0.1,
        second_deg: s * 6.0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClockReading {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    /// 24-hour `HH:MM:SS`.
    pub digital: String,
    pub hands: HandAngles,
}

pub fn read_clock(timezone: Tz, at: DateTime<Utc>) -> ClockReading {
    let local = at.with_timezone(&timezone);
    let (hours, minutes, seconds) = (local.hour(), local.minute(), local.second());
    ClockReading {
        hours,
        minutes,
        seconds,
        digital: format!("{hours:02}:{minutes:02}:{seconds:02}"),
        hands: hand_angles(hours, minutes, seconds),
    }
}
