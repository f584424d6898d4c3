use netkit_core::types::Channel;
use regex::Regex;
use std::sync::LazyLock;

/// Matches a single channel announcement in `iw ... scan` output, e.g. `DS Parameter set: channel 6`.
static ANNOUNCEMENT: LazyLock<Option<Regex>> =
  LazyLock::new(|| Regex::new(r"(?i)set:\s+channel\s+(\d+)").ok());

/// Announcement counts for every channel in `1..=highest`, held in ascending channel order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelUsage {
  counts: Vec<u32>,
  ignored: u32,
}

impl ChannelUsage {
  pub fn zeroed(highest: Channel) -> Self {
    Self {
      counts: vec![0; usize::from(highest)],
      ignored: 0,
    }
  }

  pub fn from_counts(counts: &[u32]) -> Self {
    Self {
      counts: counts.to_vec(),
      ignored: 0,
    }
  }

  pub fn highest_channel(&self) -> Channel {
    Channel::try_from(self.counts.len()).unwrap_or(Channel::MAX)
  }

  pub fn count(&self, channel: Channel) -> Option<u32> {
    let idx = usize::from(channel).checked_sub(1)?;
    self.counts.get(idx).copied()
  }

  /// `(channel, count)` pairs, lowest channel first.
  pub fn iter(&self) -> impl Iterator<Item = (Channel, u32)> + '_ {
    (1..=self.highest_channel()).zip(self.counts.iter().copied())
  }

  pub fn total(&self) -> u32 {
    self.counts.iter().sum()
  }

  /// Announcements naming a channel outside the supported range.
  pub fn ignored(&self) -> u32 {
    self.ignored
  }

  fn record(&mut self, channel: u64) {
    let slot = usize::try_from(channel)
      .ok()
      .and_then(|c| c.checked_sub(1))
      .and_then(|idx| self.counts.get_mut(idx));
    match slot {
      Some(n) => *n += 1,
      None => self.ignored += 1,
    }
  }
}

/// Counts channel announcements in one scan report. Never fails: empty or unrecognised
/// text yields an all-zero mapping over `1..=highest`.
pub fn capture_usage(report: &str, highest: Channel) -> ChannelUsage {
  let mut usage = ChannelUsage::zeroed(highest);
  let Some(re) = ANNOUNCEMENT.as_ref() else {
    tracing::error!("channel announcement pattern failed to compile");
    return usage;
  };

  for caps in re.captures_iter(report) {
    match caps[1].parse::<u64>() {
      Ok(channel) => usage.record(channel),
      // Digits too long for u64; still an announcement, just not one we can place.
      Err(_) => usage.ignored += 1,
    }
  }

  if usage.ignored > 0 {
    tracing::debug!(
      ignored = usage.ignored,
      highest,
      "announcements outside supported channel range"
    );
  }
  usage
}
