//! Structured message to plain text conversion.
//!
//! Every non-text segment type has one [`TransformRule`]. Rule output is
//! wrapped in the configured marker pair in one place, [`Transformer::transform`],
//! so individual rules only produce the bare description. Segments without a
//! rule fall back to their literal form and are not wrapped.

use std::collections::HashMap;

use futures::future::{join_all, BoxFuture};

use crate::bridge::ports::ChatPlatform;
use crate::common::messages::Quote;
use crate::common::segment::Segment;
use crate::common::types::{display_name, Uin};

/// Rule computed from the segment alone.
pub type SyncRule = fn(&Segment) -> String;

/// Rule that needs the chat platform (member lookups, quoted content).
pub type AsyncRule =
    for<'a> fn(&'a Transformer, &'a Segment, &'a RenderContext<'a>) -> BoxFuture<'a, String>;

/// How one segment type is rendered.
#[derive(Clone, Copy)]
pub enum TransformRule {
    Constant(&'static str),
    Sync(SyncRule),
    Async(AsyncRule),
}

/// Scope a message is rendered in.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    /// Group the message was sent in; member lookups are scoped to it.
    pub group_id: Uin,
    pub chat: &'a dyn ChatPlatform,
    /// Message being replied to, if any.
    pub quote: Option<&'a Quote>,
}

impl<'a> RenderContext<'a> {
    pub fn new(group_id: Uin, chat: &'a dyn ChatPlatform) -> Self {
        Self {
            group_id,
            chat,
            quote: None,
        }
    }

    pub fn with_quote(mut self, quote: Option<&'a Quote>) -> Self {
        self.quote = quote;
        self
    }

    /// Display name of a group member. Falls back to the raw id.
    pub async fn resolve_name(&self, user_id: &str) -> String {
        let info = self.chat.member_info(self.group_id, user_id).await;
        display_name(info.as_ref(), user_id)
    }
}

/// Segment-to-text transformer.
pub struct Transformer {
    rules: HashMap<&'static str, TransformRule>,
    prefix: String,
    suffix: String,
}

impl Transformer {
    /// Create a transformer with the built-in rule table.
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            rules: default_rules(),
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Surround a special-content description with the configured markers.
    pub fn wrap(&self, raw: &str) -> String {
        format!("{}{}{}", self.prefix, raw, self.suffix)
    }

    /// Render segments into one string, in input order.
    ///
    /// Lookups for different segments run concurrently; results are joined
    /// by index, so completion order never affects the output.
    pub fn transform<'a>(
        &'a self,
        segments: &'a [Segment],
        ctx: &'a RenderContext<'a>,
    ) -> BoxFuture<'a, String> {
        Box::pin(async move {
            let parts = join_all(segments.iter().map(|s| self.transform_segment(s, ctx))).await;
            parts.concat()
        })
    }

    async fn transform_segment(&self, segment: &Segment, ctx: &RenderContext<'_>) -> String {
        if let Some(text) = segment.text_content() {
            return text;
        }

        let raw = match self.rules.get(segment.kind.as_str()) {
            Some(TransformRule::Constant(label)) => label.to_string(),
            Some(TransformRule::Sync(rule)) => rule(segment),
            Some(TransformRule::Async(rule)) => rule(self, segment, ctx).await,
            None => return segment.to_literal(),
        };

        self.wrap(&raw)
    }

    /// Describe the quoted message in `ctx`, unwrapped.
    ///
    /// Quoted content is rendered with no quote in scope, so a reply nested
    /// inside it degrades to the bare label.
    pub async fn reply_text(&self, ctx: &RenderContext<'_>) -> String {
        let Some((quote, author)) = ctx
            .quote
            .and_then(|q| q.author_id.map(|author| (q, author)))
        else {
            return "回复".to_string();
        };

        let name = ctx.resolve_name(&author.to_string()).await;
        let nested = RenderContext { quote: None, ..*ctx };
        let quoted = self.transform(&quote.segments, &nested).await;

        format!("回复 @{}： §r{}", name, quoted)
    }
}

fn default_rules() -> HashMap<&'static str, TransformRule> {
    use TransformRule::{Async, Constant, Sync};

    HashMap::from([
        ("face", Constant("表情")),
        ("video", Constant("视频")),
        ("rps", Constant("猜拳")),
        ("dice", Constant("扔骰子")),
        ("shake", Constant("戳一戳")),
        ("anonymous", Constant("匿名")),
        ("location", Constant("位置")),
        ("music", Constant("音乐")),
        ("poke", Constant("戳一戳")),
        ("forward", Constant("合并转发")),
        ("node", Constant("合并转发")),
        ("xml", Constant("XML卡片消息")),
        ("json", Constant("JSON卡片消息")),
        ("cardimage", Constant("XML卡片消息")),
        ("tts", Constant("TTS语音")),
        ("share", Sync(share_rule)),
        ("redbag", Sync(redbag_rule)),
        ("record", Sync(record_rule)),
        ("contact", Sync(contact_rule)),
        ("image", Sync(image_rule)),
        ("reply", Async(reply_rule)),
        ("at", Async(mention_rule)),
        ("gift", Async(gift_rule)),
    ])
}

fn share_rule(segment: &Segment) -> String {
    format!("分享：{}", segment.attr("title").unwrap_or_default())
}

fn redbag_rule(segment: &Segment) -> String {
    format!("红包：{}", segment.attr("title").unwrap_or_default())
}

fn record_rule(segment: &Segment) -> String {
    if segment.flag("magic") {
        "变声语音".to_string()
    } else {
        "语音".to_string()
    }
}

fn contact_rule(segment: &Segment) -> String {
    let noun = match segment.attr("type").as_deref() {
        Some("qq") => "好友",
        _ => "群",
    };
    format!("推荐{}：{}", noun, segment.attr("id").unwrap_or_default())
}

fn image_rule(segment: &Segment) -> String {
    match segment.attr("type").as_deref() {
        Some("flash") => "闪照".to_string(),
        Some("show") => "秀图".to_string(),
        _ => {
            let sub_type = segment.attr("subType").or_else(|| segment.attr("sub_type"));
            if sub_type.as_deref() == Some("0") {
                "图片".to_string()
            } else {
                "动画表情".to_string()
            }
        }
    }
}

fn reply_rule<'a>(
    transformer: &'a Transformer,
    _segment: &'a Segment,
    ctx: &'a RenderContext<'a>,
) -> BoxFuture<'a, String> {
    Box::pin(transformer.reply_text(ctx))
}

fn mention_rule<'a>(
    _transformer: &'a Transformer,
    segment: &'a Segment,
    ctx: &'a RenderContext<'a>,
) -> BoxFuture<'a, String> {
    Box::pin(async move {
        let id = segment.attr("qq").unwrap_or_default();
        if id == "all" {
            return " @全体成员".to_string();
        }
        format!(" @{}", ctx.resolve_name(&id).await)
    })
}

fn gift_rule<'a>(
    _transformer: &'a Transformer,
    segment: &'a Segment,
    ctx: &'a RenderContext<'a>,
) -> BoxFuture<'a, String> {
    Box::pin(async move {
        let id = segment.attr("qq").unwrap_or_default();
        format!("礼物 @{}", ctx.resolve_name(&id).await)
    })
}
