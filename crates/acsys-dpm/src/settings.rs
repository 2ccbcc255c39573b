use crate::protocol::{RawSetting, ScaledSetting, TextSetting};

/// A value to write to a list entry's device.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Raw(Vec<u8>),
    Text(Vec<String>),
    Scaled(Vec<f64>),
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Scaled(vec![value])
    }
}

impl From<Vec<f64>> for SettingValue {
    fn from(values: Vec<f64>) -> Self {
        SettingValue::Scaled(values)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(vec![value.to_string()])
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(vec![value])
    }
}

impl From<Vec<String>> for SettingValue {
    fn from(values: Vec<String>) -> Self {
        SettingValue::Text(values)
    }
}

impl From<Vec<u8>> for SettingValue {
    fn from(bytes: Vec<u8>) -> Self {
        SettingValue::Raw(bytes)
    }
}

impl From<&[u8]> for SettingValue {
    fn from(bytes: &[u8]) -> Self {
        SettingValue::Raw(bytes.to_vec())
    }
}

/// Settings split by shape, as the apply-settings request carries them.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SettingBatches {
    pub raw: Vec<RawSetting>,
    pub text: Vec<TextSetting>,
    pub scaled: Vec<ScaledSetting>,
}

impl SettingBatches {
    pub fn push(&mut self, ref_id: u64, value: SettingValue) {
        match value {
            SettingValue::Raw(data) => self.raw.push(RawSetting { ref_id, data }),
            SettingValue::Text(data) => self.text.push(TextSetting { ref_id, data }),
            SettingValue::Scaled(data) => self.scaled.push(ScaledSetting { ref_id, data }),
        }
    }

    pub fn len(&self) -> usize {
        self.raw.len() + self.text.len() + self.scaled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_classified_by_shape() {
        let mut batches = SettingBatches::default();
        batches.push(1, SettingValue::from(&[0x12u8, 0x34][..]));
        batches.push(5, "ON".into());
        batches.push(9, 3.5.into());
        batches.push(13, vec![1.0, 2.0].into());

        assert_eq!(batches.raw, vec![RawSetting { ref_id: 1, data: vec![0x12, 0x34] }]);
        assert_eq!(
            batches.text,
            vec![TextSetting {
                ref_id: 5,
                data: vec!["ON".to_string()]
            }]
        );
        assert_eq!(batches.scaled.len(), 2);
        assert_eq!(batches.scaled[1].data, vec![1.0, 2.0]);
        assert_eq!(batches.len(), 4);
    }
}
