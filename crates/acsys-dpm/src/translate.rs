use acsys_acnet::Status;
use tracing::trace;

use crate::generation::Generations;
use crate::item::{ItemData, ItemStatus, ItemValue, ListItem, Translated};
use crate::protocol::ListReply;

/// Turn a list reply into caller records.
///
/// Replies tagged with a generation other than the readable one are
/// dropped, as are control replies that carry no per-entry data.
pub fn translate(reply: ListReply, generations: &Generations) -> Option<Translated> {
    let (ref_id, timestamp, cycle, value, micros) = match reply {
        ListReply::Status { ref_id, status, .. } => {
            let tag = accept(generations, ref_id)?;
            return Some(Translated::One(ListItem::Status(ItemStatus {
                tag,
                status: Status::from_raw(status),
            })));
        }
        ListReply::ApplySettings { status } => {
            let statuses: Vec<_> = status
                .into_iter()
                .filter_map(|entry| {
                    generations.accept(entry.ref_id).map(|tag| ItemStatus {
                        tag,
                        status: Status::from_raw(entry.status),
                    })
                })
                .collect();
            return (!statuses.is_empty()).then_some(Translated::Many(statuses));
        }
        ListReply::Scalar {
            ref_id,
            timestamp,
            cycle,
            data,
        } => (ref_id, timestamp, cycle, ItemValue::Scalar(data), None),
        ListReply::ScalarArray {
            ref_id,
            timestamp,
            cycle,
            data,
        } => (ref_id, timestamp, cycle, ItemValue::ScalarArray(data), None),
        ListReply::Text {
            ref_id,
            timestamp,
            cycle,
            data,
        } => (ref_id, timestamp, cycle, ItemValue::Text(data), None),
        ListReply::TextArray {
            ref_id,
            timestamp,
            cycle,
            data,
        } => (ref_id, timestamp, cycle, ItemValue::TextArray(data), None),
        ListReply::Raw {
            ref_id,
            timestamp,
            cycle,
            data,
        } => (ref_id, timestamp, cycle, ItemValue::Raw(data), None),
        ListReply::AnalogAlarm {
            ref_id,
            timestamp,
            cycle,
            data,
        } => (ref_id, timestamp, cycle, ItemValue::AnalogAlarm(data), None),
        ListReply::DigitalAlarm {
            ref_id,
            timestamp,
            cycle,
            data,
        } => (ref_id, timestamp, cycle, ItemValue::DigitalAlarm(data), None),
        ListReply::BasicStatus {
            ref_id,
            timestamp,
            cycle,
            data,
        } => (ref_id, timestamp, cycle, ItemValue::BasicStatus(data), None),
        ListReply::TimedScalarArray {
            ref_id,
            timestamp,
            cycle,
            data,
            micros,
        } => (
            ref_id,
            timestamp,
            cycle,
            ItemValue::ScalarArray(data),
            Some(micros),
        ),
        ListReply::ServiceDiscovery { .. }
        | ListReply::OpenList { .. }
        | ListReply::ListStatus { .. }
        | ListReply::AddToList { .. }
        | ListReply::StartList { .. } => return None,
    };

    let tag = accept(generations, ref_id)?;
    let mut data = ItemData::new(tag, timestamp, cycle, value);
    data.micros = micros;
    Some(Translated::One(ListItem::Data(data)))
}

fn accept(generations: &Generations, ref_id: u64) -> Option<u32> {
    let tag = generations.accept(ref_id);
    if tag.is_none() {
        trace!(ref_id, read = generations.read(), "dropping reply from another generation");
    }
    tag
}
