//! DPM list-protocol messages.
//!
//! Requests are what the client sends to the list service; replies cover
//! both the answers to those requests and the data that streams back on the
//! open-list request. Field names follow the service's message definitions.

use serde::{Deserialize, Serialize};

/// Message sent to the list service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ListRequest {
    ServiceDiscovery,
    OpenList {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<String>,
    },
    ClearList {
        list_id: u32,
    },
    AddToList {
        list_id: u32,
        ref_id: u64,
        drf_request: String,
    },
    StartList {
        list_id: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },
    StopList {
        list_id: u32,
    },
    ApplySettings {
        user_name: String,
        list_id: u32,
        raw_array: Vec<RawSetting>,
        text_array: Vec<TextSetting>,
        scaled_array: Vec<ScaledSetting>,
    },
}

impl ListRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            ListRequest::ServiceDiscovery => "ServiceDiscovery",
            ListRequest::OpenList { .. } => "OpenList",
            ListRequest::ClearList { .. } => "ClearList",
            ListRequest::AddToList { .. } => "AddToList",
            ListRequest::StartList { .. } => "StartList",
            ListRequest::StopList { .. } => "StopList",
            ListRequest::ApplySettings { .. } => "ApplySettings",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSetting {
    pub ref_id: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSetting {
    pub ref_id: u64,
    pub data: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledSetting {
    pub ref_id: u64,
    pub data: Vec<f64>,
}

/// Per-entry result inside an [`ListReply::ApplySettings`] batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingStatus {
    pub ref_id: u64,
    pub status: i16,
}

/// Analog alarm block of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalogAlarm {
    pub minimum: f64,
    pub maximum: f64,
    pub alarm_enable: bool,
    pub alarm_status: bool,
    pub abort: bool,
    pub abort_inhibit: bool,
    pub tries_needed: i64,
    pub tries_now: i64,
}

/// Digital alarm block of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalAlarm {
    pub nominal: i64,
    pub mask: i64,
    pub alarm_enable: bool,
    pub alarm_status: bool,
    pub abort: bool,
    pub abort_inhibit: bool,
    pub tries_needed: i64,
    pub tries_now: i64,
}

/// Basic status bits of a device. Absent attributes are not defined for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ramp: Option<bool>,
}

/// Message received from the list service.
///
/// Data replies carry the entry's reference id, the sample time in
/// milliseconds since the epoch and the machine cycle stamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ListReply {
    ServiceDiscovery {
        load: i16,
        service_location: String,
    },
    OpenList {
        list_id: u32,
    },
    ListStatus {
        list_id: u32,
        status: i16,
    },
    AddToList {
        list_id: u32,
        ref_id: u64,
        status: i16,
    },
    StartList {
        list_id: u32,
        status: i16,
    },
    Status {
        ref_id: u64,
        timestamp: i64,
        cycle: i64,
        status: i16,
    },
    ApplySettings {
        status: Vec<SettingStatus>,
    },
    Scalar {
        ref_id: u64,
        timestamp: i64,
        cycle: i64,
        data: f64,
    },
    ScalarArray {
        ref_id: u64,
        timestamp: i64,
        cycle: i64,
        data: Vec<f64>,
    },
    Text {
        ref_id: u64,
        timestamp: i64,
        cycle: i64,
        data: String,
    },
    TextArray {
        ref_id: u64,
        timestamp: i64,
        cycle: i64,
        data: Vec<String>,
    },
    Raw {
        ref_id: u64,
        timestamp: i64,
        cycle: i64,
        data: Vec<u8>,
    },
    AnalogAlarm {
        ref_id: u64,
        timestamp: i64,
        cycle: i64,
        data: AnalogAlarm,
    },
    DigitalAlarm {
        ref_id: u64,
        timestamp: i64,
        cycle: i64,
        data: DigitalAlarm,
    },
    BasicStatus {
        ref_id: u64,
        timestamp: i64,
        cycle: i64,
        data: BasicStatus,
    },
    TimedScalarArray {
        ref_id: u64,
        timestamp: i64,
        cycle: i64,
        data: Vec<f64>,
        micros: Vec<i64>,
    },
}

impl ListReply {
    pub fn kind(&self) -> &'static str {
        match self {
            ListReply::ServiceDiscovery { .. } => "ServiceDiscovery",
            ListReply::OpenList { .. } => "OpenList",
            ListReply::ListStatus { .. } => "ListStatus",
            ListReply::AddToList { .. } => "AddToList",
            ListReply::StartList { .. } => "StartList",
            ListReply::Status { .. } => "Status",
            ListReply::ApplySettings { .. } => "ApplySettings",
            ListReply::Scalar { .. } => "Scalar",
            ListReply::ScalarArray { .. } => "ScalarArray",
            ListReply::Text { .. } => "Text",
            ListReply::TextArray { .. } => "TextArray",
            ListReply::Raw { .. } => "Raw",
            ListReply::AnalogAlarm { .. } => "AnalogAlarm",
            ListReply::DigitalAlarm { .. } => "DigitalAlarm",
            ListReply::BasicStatus { .. } => "BasicStatus",
            ListReply::TimedScalarArray { .. } => "TimedScalarArray",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_are_tagged_by_kind() {
        let json = serde_json::to_value(ListRequest::AddToList {
            list_id: 7,
            ref_id: 4,
            drf_request: "M:OUTTMP@p,1000".to_string(),
        })
        .unwrap();
        assert_eq!(json["kind"], "AddToList");
        assert_eq!(json["ref_id"], 4);

        let json = serde_json::to_value(ListRequest::StartList {
            list_id: 7,
            model: None,
        })
        .unwrap();
        assert!(json.get("model").is_none());
    }

    #[test]
    fn basic_status_omits_undefined_bits() {
        let reply: ListReply = serde_json::from_str(
            r#"{"kind":"BasicStatus","ref_id":8,"timestamp":1,"cycle":2,"data":{"on":true}}"#,
        )
        .unwrap();
        let ListReply::BasicStatus { data, .. } = reply else {
            panic!("wrong kind");
        };
        assert_eq!(data.on, Some(true));
        assert_eq!(data.ready, None);
    }

    #[test]
    fn kind_names_match_serde_tags() {
        let reply = ListReply::ApplySettings { status: vec![] };
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(json["kind"], reply.kind());
        assert_eq!(ListRequest::ServiceDiscovery.kind(), "ServiceDiscovery");
    }
}
