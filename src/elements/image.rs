use std::any::Any;

use serde_json::Value;
use strata_macros::Props;

use super::{Element, ElementCx, PropError, Props, ResolvedUrl};
use crate::tree::Dirty;

#[derive(Debug, Clone, Default, PartialEq, Props)]
pub struct ImageProps {
    /// URL or `#asset` reference
    pub src: Option<String>,
    pub object_fit: Option<String>,
    pub object_position: Option<String>,
}

/// Displays a raster or SVG image.
#[derive(Default)]
pub struct ImageElement {
    props: ImageProps,
    resolved: ResolvedUrl,
}

impl ImageElement {
    pub fn construct() -> Box<dyn Element> {
        Box::new(Self::default())
    }

    pub fn props(&self) -> &ImageProps {
        &self.props
    }

    /// Where `src` currently points.
    pub fn resolved(&self) -> &ResolvedUrl {
        &self.resolved
    }
}

impl Element for ImageElement {
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
        if !changed {
            return Some(Ok(Dirty::empty()));
        }

        if name == "src" {
            self.resolved = cx.bind_url(name, self.props.src.as_deref());
            return Some(Ok(Dirty::CONTENT));
        }
        Some(Ok(Dirty::STYLE))
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

    fn natural_size(&self) -> Option<(u32, u32)> {
        self.resolved.natural_size()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
