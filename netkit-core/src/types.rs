use std::time::{SystemTime, UNIX_EPOCH};

/// Wi-Fi channel number. `0` is never a real channel.
pub type Channel = u8;

pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

pub fn new_run_id() -> String {
  uuid::Uuid::new_v4().to_string()
}

pub fn unix_secs(at: SystemTime) -> i64 {
  // Round like a float timestamp would, rather than truncating.
  let d = at.duration_since(UNIX_EPOCH).unwrap_or_default();
  let secs = d.as_secs() + u64::from(d.subsec_millis() >= 500);
  i64::try_from(secs).unwrap_or(i64::MAX)
}

pub fn now_unix_secs() -> i64 {
  unix_secs(SystemTime::now())
}
