use std::any::Any;

use serde_json::Value;
use strata_macros::Props;

use super::{Element, ElementCx, PropError, Props, ResolvedUrl};
use crate::tree::Dirty;

#[derive(Debug, Clone, Default, PartialEq, Props)]
pub struct IframeProps {
    pub src: Option<String>,
}

/// Embeds another document.
#[derive(Default)]
pub struct IframeElement {
    props: IframeProps,
    resolved: ResolvedUrl,
}

impl IframeElement {
    pub fn construct() -> Box<dyn Element> {
        Box::new(Self::default())
    }

    pub fn resolved(&self) -> &ResolvedUrl {
        &self.resolved
    }
}

impl Element for IframeElement {
    fn set_prop(
        &mut self,
        name: &str,
        value: &Value,
        cx: &mut ElementCx<'_>,
    ) -> Option<Result<Dirty, PropError>> {
        let changed = match self.props.set_prop(name, value)? {
            Ok(changed) => changed,
            Err(err) => return Some(Err(err)),
        };
        if changed {
            self.resolved = cx.bind_url(name, self.props.src.as_deref());
        }
        Some(Ok(if changed { Dirty::CONTENT } else { Dirty::empty() }))
    }

    fn get_prop(&self, name: &str) -> Option<Value> {
        self.props.get_prop(name)
    }

    fn asset_resolved(&mut self, name: &str, url: ResolvedUrl, _cx: &mut ElementCx<'_>) -> Dirty {
        if name != "src" || self.resolved == url {
            return Dirty::empty();
        }
        self.resolved = url;
        Dirty::CONTENT
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
