//! Value conversion used by `#[derive(Props)]` setters and getters.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use serde_json::Value;

use crate::error::PropError;

/// Write `value` into `slot` if it differs from the current value.
///
/// Returns whether the slot changed. A value that does not deserialize into
/// the slot's type leaves the slot untouched.
pub fn assign<T>(name: &str, slot: &mut T, value: &Value) -> Result<bool, PropError>
where
    T: DeserializeOwned + PartialEq,
{
    let next = T::deserialize(value).map_err(|err| PropError::Invalid {
        name: name.to_string(),
        message: err.to_string(),
    })?;

    if *slot == next {
        return Ok(false);
    }
    *slot = next;
    Ok(true)
}

/// Current value of a property slot as JSON.
pub fn to_value<T: Serialize>(slot: &T) -> Option<Value> {
    serde_json::to_value(slot).ok()
}

/// A CSS-like length: plain numbers are pixels, strings pass through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Length {
    Px(f64),
    Css(String),
}

impl Length {
    pub fn as_px(&self) -> Option<f64> {
        match self {
            Length::Px(px) => Some(*px),
            Length::Css(css) => css.trim().strip_suffix("px")?.trim().parse().ok(),
        }
    }
}

impl Default for Length {
    fn default() -> Self {
        Length::Px(0.0)
    }
}

impl From<f64> for Length {
    fn from(px: f64) -> Self {
        Length::Px(px)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assign_reports_change() {
        let mut width = 0.0_f64;
        assert!(assign("width", &mut width, &json!(100)).unwrap());
        assert_eq!(width, 100.0);
        assert!(!assign("width", &mut width, &json!(100.0)).unwrap());
    }

    #[test]
    fn test_assign_rejects_wrong_shape() {
        let mut text = String::from("keep");
        let err = assign("text", &mut text, &json!({ "not": "text" })).unwrap_err();
        assert!(matches!(err, PropError::Invalid { ref name, .. } if name == "text"));
        assert_eq!(text, "keep");
    }

    #[test]
    fn test_length_units() {
        let length: Length = serde_json::from_value(json!("24px")).unwrap();
        assert_eq!(length.as_px(), Some(24.0));
        assert_eq!(Length::Css("50%".into()).as_px(), None);
        assert_eq!(Length::from(8.0).as_px(), Some(8.0));
    }
}
