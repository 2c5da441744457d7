//! OSC timetags (NTP format: seconds since 1900 in the high 32 bits,
//! fractional seconds in the low 32 bits)

use chrono::{DateTime, TimeZone, Utc};

/// Special timetag meaning "execute immediately"
pub const IMMEDIATELY: u64 = 1;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970)
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;

/// Convert a wall-clock time to a timetag
pub fn from_datetime(time: DateTime<Utc>) -> u64 {
    let seconds = (time.timestamp() + NTP_UNIX_OFFSET) as u64;
    let fraction = ((time.timestamp_subsec_nanos() as u64) << 32) / 1_000_000_000;
    (seconds << 32) | fraction
}

/// Convert a timetag to wall-clock time. `None` for [`IMMEDIATELY`].
pub fn to_datetime(timetag: u64) -> Option<DateTime<Utc>> {
    if timetag == IMMEDIATELY {
        return None;
    }
    let seconds = (timetag >> 32) as i64 - NTP_UNIX_OFFSET;
    let nanos = (((timetag & 0xffff_ffff) * 1_000_000_000) >> 32) as u32;
    Utc.timestamp_opt(seconds, nanos).single()
}

/// Timetag for the current instant
pub fn now() -> u64 {
    from_datetime(Utc::now())
}
