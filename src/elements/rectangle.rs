use std::any::Any;

use serde_json::Value;

use super::{Element, ElementCx, PropError};
use crate::tree::Dirty;

/// A plain box, styled entirely through the common properties.
#[derive(Debug, Default)]
pub struct RectangleElement;

impl RectangleElement {
    pub fn construct() -> Box<dyn Element> {
        Box::new(Self)
    }
}

impl Element for RectangleElement {
    fn set_prop(
        &mut self,
        _name: &str,
        _value: &Value,
        _cx: &mut ElementCx<'_>,
    ) -> Option<Result<Dirty, PropError>> {
        None
    }

    fn get_prop(&self, _name: &str) -> Option<Value> {
        None
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
