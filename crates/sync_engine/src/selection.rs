//! Per-tick selection results.

use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use contracts::{ChannelId, Sample, SensorChannel, Timestamp};

/// Cheap owned handle to one sample inside a shared channel
#[derive(Debug, Clone)]
pub struct SampleRef {
    channel: Arc<SensorChannel>,
    index: usize,
}

impl SampleRef {
    /// `index` must be in bounds for `channel`
    pub(crate) fn new(channel: Arc<SensorChannel>, index: usize) -> Self {
        debug_assert!(index < channel.len());
        Self { channel, index }
    }

    /// Position within the channel's ordered samples
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn channel(&self) -> &Arc<SensorChannel> {
        &self.channel
    }
}

impl Deref for SampleRef {
    type Target = Sample;

    fn deref(&self) -> &Sample {
        &self.channel.samples()[self.index]
    }
}

impl PartialEq for SampleRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.channel, &other.channel) && self.index == other.index
    }
}

/// Why a channel has nothing to publish at a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsenceReason {
    /// No sample satisfies the selection policy
    NoSample,
    /// Best candidate is older than the staleness bound
    Stale { age: Duration },
}

impl AbsenceReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbsenceReason::NoSample => "no_sample",
            AbsenceReason::Stale { .. } => "stale",
        }
    }
}

/// Outcome for one channel at one tick
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Selected(SampleRef),
    Absent(AbsenceReason),
}

impl Selection {
    pub fn sample(&self) -> Option<&SampleRef> {
        match self {
            Selection::Selected(s) => Some(s),
            Selection::Absent(_) => None,
        }
    }
}

/// Every channel's selection at one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickSelection {
    pub tick: Timestamp,
    pub channels: BTreeMap<ChannelId, Selection>,
}

impl TickSelection {
    /// Present channels, in channel order
    pub fn selected(&self) -> impl Iterator<Item = (&ChannelId, &SampleRef)> {
        self.channels
            .iter()
            .filter_map(|(id, sel)| sel.sample().map(|s| (id, s)))
    }

    /// Absent channels with their reason
    pub fn absent(&self) -> impl Iterator<Item = (&ChannelId, AbsenceReason)> {
        self.channels.iter().filter_map(|(id, sel)| match sel {
            Selection::Absent(reason) => Some((id, *reason)),
            Selection::Selected(_) => None,
        })
    }

    pub fn selected_count(&self) -> usize {
        self.selected().count()
    }

    pub fn get(&self, channel: &str) -> Option<&Selection> {
        self.channels.get(channel)
    }
}
