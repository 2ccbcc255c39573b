use std::fmt;

use acsys_acnet::Status;

use crate::protocol::{AnalogAlarm, BasicStatus, DigitalAlarm};

/// Caller-chosen tag identifying a list entry.
pub type Tag = u32;

/// Decoded value of a data reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemValue {
    Scalar(f64),
    ScalarArray(Vec<f64>),
    Text(String),
    TextArray(Vec<String>),
    Raw(Vec<u8>),
    AnalogAlarm(AnalogAlarm),
    DigitalAlarm(DigitalAlarm),
    BasicStatus(BasicStatus),
}

impl fmt::Display for ItemValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemValue::Scalar(v) => write!(f, "{v}"),
            ItemValue::ScalarArray(v) => write!(f, "{v:?}"),
            ItemValue::Text(v) => f.write_str(v),
            ItemValue::TextArray(v) => write!(f, "{v:?}"),
            ItemValue::Raw(v) => {
                for byte in v {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            ItemValue::AnalogAlarm(v) => write!(f, "{v:?}"),
            ItemValue::DigitalAlarm(v) => write!(f, "{v:?}"),
            ItemValue::BasicStatus(v) => write!(f, "{v:?}"),
        }
    }
}

/// A value delivered for a list entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemData {
    pub tag: Tag,
    /// Sample time in seconds since the epoch.
    pub stamp: f64,
    pub cycle: i64,
    pub value: ItemValue,
    /// Per-sample microsecond offsets; timed scalar arrays only.
    pub micros: Option<Vec<i64>>,
}

impl ItemData {
    /// Build from a service timestamp in milliseconds.
    pub fn new(tag: Tag, timestamp_ms: i64, cycle: i64, value: ItemValue) -> Self {
        Self {
            tag,
            stamp: timestamp_ms as f64 / 1000.0,
            cycle,
            value,
            micros: None,
        }
    }
}

impl fmt::Display for ItemData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{tag: {}, stamp: {}, data: {}",
            self.tag, self.stamp, self.value
        )?;
        if let Some(micros) = &self.micros {
            write!(f, ", micros: {micros:?}")?;
        }
        f.write_str("}")
    }
}

/// An error reported for a list entry instead of data.
///
/// No data arrives for the tag until the condition is fixed and the list
/// restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemStatus {
    pub tag: Tag,
    pub status: Status,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{tag: {}, status: {}}}", self.tag, self.status)
    }
}

/// One record produced by a list.
#[derive(Debug, Clone, PartialEq)]
pub enum ListItem {
    Data(ItemData),
    Status(ItemStatus),
}

impl ListItem {
    pub fn tag(&self) -> Tag {
        match self {
            ListItem::Data(data) => data.tag,
            ListItem::Status(status) => status.tag,
        }
    }
}

impl fmt::Display for ListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListItem::Data(data) => data.fmt(f),
            ListItem::Status(status) => status.fmt(f),
        }
    }
}

/// Result of translating one reply: a single record, or the per-entry
/// statuses of a settings batch.
#[derive(Debug, Clone, PartialEq)]
pub enum Translated {
    One(ListItem),
    Many(Vec<ItemStatus>),
}

impl IntoIterator for Translated {
    type Item = ListItem;
    type IntoIter = std::vec::IntoIter<ListItem>;

    fn into_iter(self) -> Self::IntoIter {
        match self {
            Translated::One(item) => vec![item].into_iter(),
            Translated::Many(statuses) => statuses
                .into_iter()
                .map(ListItem::Status)
                .collect::<Vec<_>>()
                .into_iter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_is_milliseconds_over_one_thousand() {
        let data = ItemData::new(0, 1_700_000_000_123, 5, ItemValue::Scalar(71.5));
        assert_eq!(data.stamp, 1_700_000_000_123i64 as f64 / 1000.0);
        assert!(data.micros.is_none());
    }

    #[test]
    fn display_matches_record_layout() {
        let data = ItemData::new(2, 1500, 0, ItemValue::Scalar(3.0));
        assert_eq!(data.to_string(), "{tag: 2, stamp: 1.5, data: 3}");

        let status = ItemStatus {
            tag: 4,
            status: Status::REQTMO,
        };
        assert_eq!(ListItem::Status(status).to_string(), "{tag: 4, status: [1 -6]}");
    }

    #[test]
    fn translated_flattens() {
        let many = Translated::Many(vec![
            ItemStatus {
                tag: 1,
                status: Status::SUCCESS,
            },
            ItemStatus {
                tag: 2,
                status: Status::REQTMO,
            },
        ]);
        let tags: Vec<_> = many.into_iter().map(|item| item.tag()).collect();
        assert_eq!(tags, vec![1, 2]);
    }
}
