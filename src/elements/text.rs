use std::any::Any;

use serde_json::Value;
use strata_macros::Props;

use super::props::Length;
use super::{Element, ElementCx, PropError, Props};
use crate::tree::Dirty;

#[derive(Debug, Clone, Default, PartialEq, Props)]
pub struct TextProps {
    pub text: String,
    pub font: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<Length>,
    pub color: Option<String>,
    pub white_space: Option<String>,
    pub letter_spacing: Option<Length>,
    pub line_height: Option<Length>,
    pub text_shadow: Option<String>,
    pub text_stroke: Option<String>,
}

/// A block of styled text.
#[derive(Debug, Default)]
pub struct TextElement {
    props: TextProps,
}

impl TextElement {
    pub fn construct() -> Box<dyn Element> {
        Box::new(Self::default())
    }

    pub fn props(&self) -> &TextProps {
        &self.props
    }

    pub fn text(&self) -> &str {
        &self.props.text
    }
}

impl Element for TextElement {
    fn set_prop(
        &mut self,
        name: &str,
        value: &Value,
        _cx: &mut ElementCx<'_>,
    ) -> Option<Result<Dirty, PropError>> {
        let result = self.props.set_prop(name, value)?;
        Some(result.map(|changed| match (changed, name) {
            (false, _) => Dirty::empty(),
            (true, "text") => Dirty::CONTENT,
            // Font metrics change the laid out size of the text
            (true, "font" | "fontFamily" | "fontSize" | "letterSpacing" | "lineHeight" | "whiteSpace") => {
                Dirty::STYLE | Dirty::CONTENT
            }
            (true, _) => Dirty::STYLE,
        }))
    }

    fn get_prop(&self, name: &str) -> Option<Value> {
        self.props.get_prop(name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
