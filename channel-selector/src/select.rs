use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use anyhow::Context;
use netkit_core::types::Channel;

use crate::provider::ScanProvider;
use crate::usage::{capture_usage, ChannelUsage};

/// Printed in place of a channel when every channel is forbidden.
pub const NO_ELIGIBLE_CHANNEL: Channel = 0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForbiddenSet(BTreeSet<Channel>);

impl ForbiddenSet {
  pub fn contains(&self, channel: Channel) -> bool {
    self.0.contains(&channel)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = Channel> + '_ {
    self.0.iter().copied()
  }

  /// Parses a comma separated list such as `1,6,11`. Blank entries are skipped.
  pub fn parse_list(raw: &str) -> anyhow::Result<Self> {
    raw
      .split(',')
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(|s| {
        s.parse::<Channel>()
          .with_context(|| format!("invalid channel `{s}` in forbidden list"))
      })
      .collect()
  }
}

impl FromIterator<Channel> for ForbiddenSet {
  fn from_iter<I: IntoIterator<Item = Channel>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

impl std::fmt::Display for ForbiddenSet {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let list: Vec<String> = self.0.iter().map(|c| c.to_string()).collect();
    write!(f, "[{}]", list.join(","))
  }
}

/// Least used eligible channel in one usage mapping, or `None` when all are forbidden.
///
/// Channels are visited in ascending order, so ties go to the lowest channel. The first
/// zero-count channel ends the search.
pub fn pick_best(usage: &ChannelUsage, forbidden: &ForbiddenSet) -> Option<Channel> {
  let mut best: Option<(Channel, u32)> = None;

  for (channel, count) in usage.iter() {
    if forbidden.contains(channel) {
      continue;
    }

    if best.map_or(true, |(_, best_count)| count < best_count) {
      best = Some((channel, count));
      if count == 0 {
        break;
      }
    }
  }

  best.map(|(channel, _)| channel)
}

/// Most frequent sample result. Ties resolve to the lowest channel, with the
/// no-eligible-channel result ordered below every real channel.
pub fn majority(samples: &[Option<Channel>]) -> Option<Option<Channel>> {
  let mut tally: BTreeMap<Option<Channel>, usize> = BTreeMap::new();
  for s in samples {
    *tally.entry(*s).or_default() += 1;
  }

  let mut winner: Option<(Option<Channel>, usize)> = None;
  for (value, n) in tally {
    if winner.map_or(true, |(_, best)| n > best) {
      winner = Some((value, n));
    }
  }
  winner.map(|(value, _)| value)
}

#[derive(Debug, Clone)]
pub struct SelectionPlan {
  pub sample_count: u32,
  pub delay: Duration,
  pub forbidden: ForbiddenSet,
  pub highest_channel: Channel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
  /// `None` means no channel was eligible in the winning samples.
  pub channel: Option<Channel>,
  pub samples: Vec<Option<Channel>>,
}

impl Verdict {
  /// The channel number as printed, with [`NO_ELIGIBLE_CHANNEL`] standing in for `None`.
  pub fn channel_or_sentinel(&self) -> Channel {
    self.channel.unwrap_or(NO_ELIGIBLE_CHANNEL)
  }
}

/// Samples `interface` `plan.sample_count` times, pausing between samples, and returns the
/// majority pick. Any scan failure aborts the run.
pub fn select_channel<P, F>(
  provider: &mut P,
  interface: &str,
  plan: &SelectionPlan,
  mut pause: F,
) -> anyhow::Result<Verdict>
where
  P: ScanProvider + ?Sized,
  F: FnMut(Duration),
{
  if plan.sample_count == 0 {
    return Err(anyhow::anyhow!("sample count must be > 0"));
  }

  let mut samples = Vec::with_capacity(plan.sample_count as usize);
  for i in 0..plan.sample_count {
    let report = provider
      .scan(interface)
      .with_context(|| format!("scan {} of {} on {interface}", i + 1, plan.sample_count))?;

    let usage = capture_usage(&report, plan.highest_channel);
    let pick = pick_best(&usage, &plan.forbidden);
    tracing::info!(
      sample = i + 1,
      announcements = usage.total(),
      pick = pick.unwrap_or(NO_ELIGIBLE_CHANNEL),
      "channel sample taken"
    );
    samples.push(pick);

    if i + 1 < plan.sample_count && !plan.delay.is_zero() {
      pause(plan.delay);
    }
  }

  let channel = majority(&samples).flatten();
  Ok(Verdict { channel, samples })
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::VecDeque;

  struct ScriptedScanner {
    reports: VecDeque<anyhow::Result<String>>,
    calls: Vec<String>,
  }

  impl ScriptedScanner {
    fn new(reports: Vec<anyhow::Result<String>>) -> Self {
      Self {
        reports: reports.into(),
        calls: Vec::new(),
      }
    }
  }

  impl ScanProvider for ScriptedScanner {
    fn scan(&mut self, interface: &str) -> anyhow::Result<String> {
      self.calls.push(interface.to_string());
      self
        .reports
        .pop_front()
        .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted report left")))
    }
  }

  /// Report in which every channel except `free` carries one network.
  fn report_leaving_free(free: Channel) -> String {
    (1..=11)
      .filter(|c| *c != free)
      .map(|c| format!("\tDS Parameter set: channel {c}\n"))
      .collect()
  }

  fn plan(sample_count: u32, delay_secs: u64) -> SelectionPlan {
    SelectionPlan {
      sample_count,
      delay: Duration::from_secs(delay_secs),
      forbidden: ForbiddenSet::default(),
      highest_channel: 11,
    }
  }

  #[test]
  fn first_zero_in_ascending_order_wins() {
    let usage = ChannelUsage::from_counts(&[3, 0, 5, 0, 1, 0, 2, 0, 0, 1, 0]);
    assert_eq!(pick_best(&usage, &ForbiddenSet::default()), Some(2));
  }

  #[test]
  fn forbidden_channels_are_skipped() {
    let usage = ChannelUsage::from_counts(&[2, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    let forbidden: ForbiddenSet = [1, 2, 3].into_iter().collect();
    assert_eq!(pick_best(&usage, &forbidden), Some(4));
  }

  #[test]
  fn everything_forbidden_yields_no_channel() {
    let usage = ChannelUsage::zeroed(11);
    let forbidden: ForbiddenSet = (1..=11).collect();
    assert_eq!(pick_best(&usage, &forbidden), None);

    let verdict = Verdict {
      channel: None,
      samples: vec![None],
    };
    assert_eq!(verdict.channel_or_sentinel(), NO_ELIGIBLE_CHANNEL);
  }

  #[test]
  fn true_minimum_is_tracked_without_zeros() {
    let usage = ChannelUsage::from_counts(&[4, 2, 3, 1, 5, 1, 9, 2, 2, 3, 6]);
    assert_eq!(pick_best(&usage, &ForbiddenSet::default()), Some(4));

    let forbidden: ForbiddenSet = [4].into_iter().collect();
    assert_eq!(pick_best(&usage, &forbidden), Some(6));
  }

  #[test]
  fn pick_never_returns_a_forbidden_channel() {
    let usage = ChannelUsage::from_counts(&[0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0]);
    for skip in 1..=11u8 {
      let forbidden: ForbiddenSet = (1..=skip).collect();
      match pick_best(&usage, &forbidden) {
        Some(c) => assert!(!forbidden.contains(c)),
        None => assert_eq!(skip, 11),
      }
    }
  }

  #[test]
  fn majority_picks_mode() {
    assert_eq!(
      majority(&[Some(3), Some(3), Some(7), Some(3)]),
      Some(Some(3))
    );
  }

  #[test]
  fn majority_ties_go_to_lowest_channel() {
    assert_eq!(
      majority(&[Some(9), Some(4), Some(4), Some(9)]),
      Some(Some(4))
    );
    assert_eq!(majority(&[Some(6), Some(1)]), Some(Some(1)));
    assert_eq!(majority(&[]), None);
  }

  #[test]
  fn single_sample_returns_that_pick() {
    let mut scanner = ScriptedScanner::new(vec![Ok(report_leaving_free(8))]);
    let mut pauses = Vec::new();

    let verdict = select_channel(&mut scanner, "wlan0", &plan(1, 2), |d| pauses.push(d)).unwrap();
    assert_eq!(verdict.channel, Some(8));
    assert_eq!(verdict.samples, vec![Some(8)]);
    assert!(pauses.is_empty());
  }

  #[test]
  fn pauses_between_samples_but_not_after_last() {
    let mut scanner = ScriptedScanner::new(vec![
      Ok(report_leaving_free(3)),
      Ok(report_leaving_free(3)),
      Ok(report_leaving_free(7)),
      Ok(report_leaving_free(3)),
    ]);
    let mut pauses = Vec::new();

    let verdict = select_channel(&mut scanner, "wlan1", &plan(4, 2), |d| pauses.push(d)).unwrap();
    assert_eq!(verdict.channel, Some(3));
    assert_eq!(verdict.samples, vec![Some(3), Some(3), Some(7), Some(3)]);
    assert_eq!(pauses, vec![Duration::from_secs(2); 3]);
    assert_eq!(scanner.calls, vec!["wlan1"; 4]);
  }

  #[test]
  fn zero_delay_never_pauses() {
    let mut scanner = ScriptedScanner::new(vec![Ok(String::new()), Ok(String::new())]);
    let mut paused = false;

    let verdict = select_channel(&mut scanner, "wlan0", &plan(2, 0), |_| paused = true).unwrap();
    assert_eq!(verdict.channel, Some(1));
    assert!(!paused);
  }

  #[test]
  fn scan_failure_aborts_with_interface_in_message() {
    let mut scanner = ScriptedScanner::new(vec![
      Ok(report_leaving_free(5)),
      Err(anyhow::anyhow!("No such device (-19)")),
    ]);

    let err = select_channel(&mut scanner, "wlx00", &plan(4, 0), |_| {}).unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("wlx00"));
    assert!(msg.contains("No such device"));
    assert_eq!(scanner.calls.len(), 2);
  }

  #[test]
  fn all_forbidden_run_reports_no_channel() {
    let mut scanner = ScriptedScanner::new(vec![Ok(String::new()), Ok(String::new())]);
    let plan = SelectionPlan {
      forbidden: (1..=11).collect(),
      ..plan(2, 0)
    };

    let verdict = select_channel(&mut scanner, "wlan0", &plan, |_| {}).unwrap();
    assert_eq!(verdict.channel, None);
    assert_eq!(verdict.channel_or_sentinel(), 0);
  }

  #[test]
  fn zero_samples_is_rejected() {
    let mut scanner = ScriptedScanner::new(vec![]);
    assert!(select_channel(&mut scanner, "wlan0", &plan(0, 0), |_| {}).is_err());
    assert!(scanner.calls.is_empty());
  }

  #[test]
  fn forbidden_list_parsing() {
    let set = ForbiddenSet::parse_list(" 1, 6,,11 ").unwrap();
    assert!(set.contains(1) && set.contains(6) && set.contains(11));
    assert!(!set.contains(2));
    assert_eq!(set.to_string(), "[1,6,11]");
    assert!(ForbiddenSet::parse_list("").unwrap().is_empty());
    assert!(ForbiddenSet::parse_list("1,six").is_err());
  }
}
