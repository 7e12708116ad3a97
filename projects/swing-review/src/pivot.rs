// Long-format to wide-event pivot

use crate::clock::FrameIndex;
use crate::record::{
    channel_key, EventRecord, LabelTally, MetricValue, WorstLabel, HIGH_SUFFIX, LABEL_SUFFIX,
    LOW_SUFFIX,
};
use crate::shape::LongRow;
use std::collections::BTreeMap;

/// Group long rows by event into one record per event, sorted by event index.
///
/// Each row contributes `metric`, `metric__label` and, when present,
/// `metric__low_q20` / `metric__high_q80`. The worst label only ever rises
/// within a group. Missing frames are backfilled from `event_frames`.
pub fn pivot_long(rows: &[LongRow], event_frames: &[Option<FrameIndex>]) -> Vec<EventRecord> {
    let mut groups: BTreeMap<u8, (EventRecord, LabelTally)> = BTreeMap::new();

    for row in rows {
        let (event, tally) = groups
            .entry(row.event_index)
            .or_insert_with(|| (EventRecord::bare(row.event_index, None), LabelTally::default()));

        if event.abs_frame.is_none() {
            event.abs_frame = row.abs_frame;
        }

        let label = row
            .label
            .as_deref()
            .and_then(|raw| match WorstLabel::parse(Some(raw)) {
                Some(WorstLabel::Normal) => None,
                _ => Some(raw.trim()),
            })
            .unwrap_or(WorstLabel::Normal.as_str());

        event.metrics.insert(row.metric.clone(), row.value.clone());
        event.metrics.insert(
            channel_key(&row.metric, LABEL_SUFFIX),
            MetricValue::Text(label.to_string()),
        );
        if let Some(low) = &row.low {
            event
                .metrics
                .insert(channel_key(&row.metric, LOW_SUFFIX), low.clone());
        }
        if let Some(high) = &row.high {
            event
                .metrics
                .insert(channel_key(&row.metric, HIGH_SUFFIX), high.clone());
        }

        tally.observe(Some(label));
    }

    let mut events: Vec<EventRecord> = groups
        .into_values()
        .map(|(mut event, tally)| {
            event.worst_label = tally.worst;
            event.defect_count = tally.defect_count;
            event
        })
        .collect();
    backfill_abs_frames(&mut events, event_frames);
    events
}

/// Fill unresolved `abs_frame`s by 1-based lookup into the event frame list.
/// Events with no usable entry stay unresolved.
pub fn backfill_abs_frames(events: &mut [EventRecord], event_frames: &[Option<FrameIndex>]) {
    for event in events.iter_mut().filter(|e| e.abs_frame.is_none()) {
        let slot = usize::from(event.event_index).checked_sub(1);
        event.abs_frame = slot.and_then(|i| event_frames.get(i).copied().flatten());
    }
}
