//! Video layers: direct URLs, assets, or an embedded YouTube player.

use std::any::Any;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use strata_macros::Props;

use super::player::{PlayerCommand, PlayerSlot};
use super::{Element, ElementCx, PropError, Props, ResolvedUrl};
use crate::tree::Dirty;

/// Size reported for embedded players, which expose no video dimensions.
const EMBEDDED_PLAYER_SIZE: (u32, u32) = (1280, 720);

static YOUTUBE_URL: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:www\.youtube\.com/(?:watch\?v=|embed/|shorts/)|youtu\.be/)([a-z0-9_-]+)(?:[?&](?:t|start)=(\d+))?",
    )
    .ok()
});

/// A YouTube video referenced by a watch, embed, shorts or short-link URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YouTubeVideo {
    pub id: String,
    /// Start offset in seconds
    pub start: Option<u32>,
}

/// Extract the YouTube video from a URL, if it is one.
pub fn youtube_video(url: &str) -> Option<YouTubeVideo> {
    let captures = YOUTUBE_URL.as_ref()?.captures(url)?;
    Some(YouTubeVideo {
        id: captures.get(1)?.as_str().to_string(),
        start: captures.get(2).and_then(|start| start.as_str().parse().ok()),
    })
}

#[derive(Debug, Clone, PartialEq, Props)]
pub struct VideoProps {
    pub src: Option<String>,
    pub autoplay: bool,
    pub object_fit: Option<String>,
    pub object_position: Option<String>,
    pub volume: f64,
    pub playing: bool,
    #[prop(rename = "loop")]
    pub looping: bool,
}

impl Default for VideoProps {
    fn default() -> Self {
        Self {
            src: None,
            autoplay: false,
            object_fit: None,
            object_position: None,
            volume: 100.0,
            playing: true,
            looping: false,
        }
    }
}

/// What the video element is currently showing.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum VideoSource {
    #[default]
    None,
    /// Native playback of a URL or asset
    Direct(ResolvedUrl),
    /// Embedded player
    YouTube(YouTubeVideo),
}

#[derive(Default)]
pub struct VideoElement {
    props: VideoProps,
    source: VideoSource,
    player: Option<PlayerSlot>,
}

impl VideoElement {
    pub fn construct() -> Box<dyn Element> {
        Box::new(Self::default())
    }

    pub fn props(&self) -> &VideoProps {
        &self.props
    }

    pub fn source(&self) -> &VideoSource {
        &self.source
    }

    /// Whether an embedded player exists and has become ready.
    pub fn player_ready(&self) -> bool {
        self.player.as_ref().is_some_and(PlayerSlot::is_ready)
    }

    fn apply_src(&mut self, cx: &mut ElementCx<'_>) -> Dirty {
        let src = self.props.src.clone();

        if let Some(video) = src.as_deref().and_then(youtube_video) {
            cx.bind_url("src", None);
            let player = self.player.get_or_insert_with(|| {
                let (slot, ready) = PlayerSlot::embed(cx.overlay().players());
                cx.register_pending(ready);
                slot
            });
            player.send(if self.props.autoplay {
                PlayerCommand::Load(video.clone())
            } else {
                PlayerCommand::Cue(video.clone())
            });
            self.source = VideoSource::YouTube(video);
            return Dirty::CONTENT;
        }

        let cleared = src.as_deref().is_none_or(str::is_empty);
        if let Some(player) = &self.player {
            player.send(PlayerCommand::Stop);
        }
        if !cleared {
            // Native playback replaces the embedded player
            self.player = None;
        }

        let resolved = cx.bind_url("src", src.as_deref());
        self.source = if cleared {
            VideoSource::None
        } else {
            VideoSource::Direct(resolved)
        };
        Dirty::CONTENT
    }
}

impl Element for VideoElement {
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

        let dirty = match name {
            "src" => self.apply_src(cx),
            "objectFit" | "objectPosition" => Dirty::STYLE,
            _ => Dirty::CONTENT,
        };
        Some(Ok(dirty))
    }

    fn get_prop(&self, name: &str) -> Option<Value> {
        self.props.get_prop(name)
    }

    fn asset_resolved(&mut self, name: &str, url: ResolvedUrl, _cx: &mut ElementCx<'_>) -> Dirty {
        match &self.source {
            VideoSource::Direct(current) if name == "src" && *current != url => {
                self.source = VideoSource::Direct(url);
                Dirty::CONTENT
            }
            _ => Dirty::empty(),
        }
    }

    fn natural_size(&self) -> Option<(u32, u32)> {
        match &self.source {
            VideoSource::YouTube(_) => Some(EMBEDDED_PLAYER_SIZE),
            VideoSource::Direct(resolved) => resolved.natural_size(),
            VideoSource::None => None,
        }
    }

    fn teardown(&mut self) {
        self.player = None;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
