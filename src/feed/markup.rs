//! Namespaced XML decoder for MRSS documents.
//!
//! Binding between XML and the model is driven by two tables, [`ELEMENTS`] and
//! [`CONTENT_ATTRIBUTES`]. Each row names the scope an element may appear in, the
//! namespace URI it must resolve to and its local name. Prefixes are never
//! consulted: `<dc:valid>` and `<dcterms:valid>` bind identically as long as both
//! prefixes are declared for `http://purl.org/dc/terms/`.

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;

use super::error::{DecodeError, FeedError, Position};
use super::model::{Channel, Feed, Item, MediaContent};
use super::parser::Format;

/// Dublin Core terms namespace, source of the `valid` marker.
pub const DCTERMS_NS: &str = "http://purl.org/dc/terms/";
/// Yahoo Media RSS namespace, source of `content` attachments.
pub const MEDIA_NS: &str = "http://search.yahoo.com/mrss/";

/// Namespace an element or attribute resolved to, relative to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ns {
    /// Same namespace as the root `rss` element (usually none).
    Document,
    /// Attribute without a prefix.
    Unqualified,
    DublinCore,
    Media,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Document,
    Rss,
    Channel,
    Item,
    Content,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    ChannelTitle,
    ChannelDescription,
    ItemTitle,
    ItemDescription,
    ItemValid,
    ContentValid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Scope(Scope),
    Text(TextField),
}

struct ElementRule {
    parent: Scope,
    ns: Ns,
    local: &'static str,
    node: Node,
}

const fn element(parent: Scope, ns: Ns, local: &'static str, node: Node) -> ElementRule {
    ElementRule {
        parent,
        ns,
        local,
        node,
    }
}

/// Elements that bind to the model. Only direct children of `parent` match.
#[rustfmt::skip]
const ELEMENTS: &[ElementRule] = &[
    element(Scope::Document, Ns::Document, "rss", Node::Scope(Scope::Rss)),
    element(Scope::Rss, Ns::Document, "channel", Node::Scope(Scope::Channel)),
    element(Scope::Channel, Ns::Document, "title", Node::Text(TextField::ChannelTitle)),
    element(Scope::Channel, Ns::Document, "description", Node::Text(TextField::ChannelDescription)),
    element(Scope::Channel, Ns::Document, "item", Node::Scope(Scope::Item)),
    element(Scope::Item, Ns::Document, "title", Node::Text(TextField::ItemTitle)),
    element(Scope::Item, Ns::Document, "description", Node::Text(TextField::ItemDescription)),
    element(Scope::Item, Ns::DublinCore, "valid", Node::Text(TextField::ItemValid)),
    element(Scope::Item, Ns::Media, "content", Node::Scope(Scope::Content)),
    element(Scope::Content, Ns::DublinCore, "valid", Node::Text(TextField::ContentValid)),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentAttr {
    Url,
    Type,
    Medium,
    Duration,
    ChangeKey,
    Valid,
}

struct AttributeRule {
    ns: Ns,
    local: &'static str,
    field: ContentAttr,
}

/// Attributes of `media:content` that bind to [`MediaContent`].
#[rustfmt::skip]
const CONTENT_ATTRIBUTES: &[AttributeRule] = &[
    AttributeRule { ns: Ns::Unqualified, local: "url", field: ContentAttr::Url },
    AttributeRule { ns: Ns::Unqualified, local: "type", field: ContentAttr::Type },
    AttributeRule { ns: Ns::Unqualified, local: "medium", field: ContentAttr::Medium },
    AttributeRule { ns: Ns::Unqualified, local: "duration", field: ContentAttr::Duration },
    AttributeRule { ns: Ns::Unqualified, local: "change_key", field: ContentAttr::ChangeKey },
    AttributeRule { ns: Ns::DublinCore, local: "valid", field: ContentAttr::Valid },
];

fn lookup(parent: Scope, ns: Ns, local: &[u8]) -> Option<Node> {
    ELEMENTS
        .iter()
        .find(|rule| rule.parent == parent && rule.ns == ns && rule.local.as_bytes() == local)
        .map(|rule| rule.node)
}

/// Decodes an MRSS XML document into a [`Feed`].
///
/// The whole document up to the closing `</rss>` is consumed. Unknown elements
/// (and everything beneath them) and unknown attributes are skipped.
///
/// # Errors
///
/// Returns [`FeedError::Decode`] with the byte offset of the offending event when
/// the XML is malformed, the root element is not `rss`, a prefix is undeclared,
/// or the document ends before the root element is closed. No partial model is
/// ever returned.
pub fn decode_markup<R: BufRead>(source: R) -> Result<Feed, FeedError> {
    // SEC-002: quick-xml (0.37) never expands <!ENTITY> declarations from a DOCTYPE.
    // Only the five XML builtins are resolved; custom entities such as &xxe; fail
    // in `unescape()` and surface as a decode error.
    let mut reader = NsReader::from_reader(source);
    let mut state = MarkupState::default();
    let mut buf = Vec::new();

    loop {
        let position = reader.buffer_position() as u64;
        let (ns, event) = {
            let (resolved, event) = reader
                .read_resolved_event_into(&mut buf)
                .map_err(|e| markup_error(position, e))?;
            let uri = namespace_uri(&resolved, position)?;
            if state.document_ns.is_none() && matches!(event, Event::Start(_) | Event::Empty(_)) {
                state.document_ns = Some(uri.map(<[u8]>::to_vec));
            }
            (state.classify(uri), event)
        };

        match event {
            Event::Start(start) => state.open(&reader, &start, ns, position)?,
            Event::Empty(start) => {
                state.open(&reader, &start, ns, position)?;
                state.close(position)?;
            }
            Event::End(_) => state.close(position)?,
            Event::Text(text) => {
                if let Some(slot) = state.text_slot() {
                    let text = text.unescape().map_err(|e| markup_error(position, e))?;
                    slot.push_str(&text);
                }
            }
            Event::CData(cdata) => {
                if let Some(slot) = state.text_slot() {
                    let bytes = cdata.into_inner();
                    let text = std::str::from_utf8(&bytes).map_err(|e| {
                        markup_error(position, format!("invalid UTF-8 in CDATA: {e}"))
                    })?;
                    slot.push_str(text);
                }
            }
            Event::Eof => return Err(state.eof_error(position)),
            _ => {}
        }

        if state.complete {
            break;
        }
        buf.clear();
    }

    Ok(state.builder.finish())
}

fn markup_error(position: u64, cause: impl ToString) -> FeedError {
    DecodeError::new(Format::Markup, Some(Position::Byte(position)), cause.to_string()).into()
}

fn namespace_uri<'a>(
    resolved: &'a ResolveResult<'_>,
    position: u64,
) -> Result<Option<&'a [u8]>, FeedError> {
    match resolved {
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Bound(ns) => Ok(Some(ns.as_ref())),
        ResolveResult::Unknown(prefix) => Err(markup_error(
            position,
            format!(
                "undeclared namespace prefix '{}'",
                String::from_utf8_lossy(prefix)
            ),
        )),
    }
}

fn attribute_ns(resolved: &ResolveResult<'_>) -> Ns {
    match resolved {
        ResolveResult::Unbound => Ns::Unqualified,
        ResolveResult::Bound(ns) if ns.as_ref() == DCTERMS_NS.as_bytes() => Ns::DublinCore,
        ResolveResult::Bound(ns) if ns.as_ref() == MEDIA_NS.as_bytes() => Ns::Media,
        _ => Ns::Other,
    }
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    Scope(Scope),
    Text(TextField),
    /// Unknown element; its whole subtree is ignored.
    Skip,
}

#[derive(Default)]
struct MarkupState {
    /// Namespace of the root element. Outer `None` until the root is seen,
    /// inner `None` when the root has no namespace.
    document_ns: Option<Option<Vec<u8>>>,
    stack: Vec<Frame>,
    builder: FeedBuilder,
    complete: bool,
}

impl MarkupState {
    fn classify(&self, uri: Option<&[u8]>) -> Ns {
        match uri {
            Some(uri) if uri == DCTERMS_NS.as_bytes() => Ns::DublinCore,
            Some(uri) if uri == MEDIA_NS.as_bytes() => Ns::Media,
            uri if self.document_ns.as_ref().map(Option::as_deref) == Some(uri) => Ns::Document,
            _ => Ns::Other,
        }
    }

    fn open<R>(
        &mut self,
        reader: &NsReader<R>,
        start: &BytesStart<'_>,
        ns: Ns,
        position: u64,
    ) -> Result<(), FeedError> {
        let parent = match self.stack.last() {
            None => Scope::Document,
            Some(Frame::Scope(scope)) => *scope,
            Some(Frame::Text(_)) | Some(Frame::Skip) => {
                self.stack.push(Frame::Skip);
                return Ok(());
            }
        };

        let frame = match lookup(parent, ns, start.local_name().as_ref()) {
            Some(Node::Scope(Scope::Item)) => {
                self.builder.item = Some(Item::default());
                Frame::Scope(Scope::Item)
            }
            Some(Node::Scope(Scope::Content)) => {
                self.builder.content = Some(content_from_attributes(reader, start, position)?);
                Frame::Scope(Scope::Content)
            }
            Some(Node::Scope(scope)) => Frame::Scope(scope),
            Some(Node::Text(field)) => {
                self.builder.begin_text(field);
                Frame::Text(field)
            }
            None if parent == Scope::Document => {
                return Err(markup_error(
                    position,
                    format!(
                        "expected root element <rss>, found <{}>",
                        String::from_utf8_lossy(start.name().as_ref())
                    ),
                ));
            }
            None => Frame::Skip,
        };
        self.stack.push(frame);
        Ok(())
    }

    fn close(&mut self, position: u64) -> Result<(), FeedError> {
        match self.stack.pop() {
            Some(Frame::Scope(Scope::Item)) => self.builder.finish_item(),
            Some(Frame::Scope(Scope::Content)) => self.builder.finish_content(),
            Some(Frame::Scope(Scope::Rss)) => self.complete = true,
            Some(_) => {}
            None => return Err(markup_error(position, "unexpected closing tag")),
        }
        Ok(())
    }

    fn text_slot(&mut self) -> Option<&mut String> {
        match self.stack.last() {
            Some(Frame::Text(field)) => {
                let field = *field;
                self.builder.text_slot(field)
            }
            _ => None,
        }
    }

    fn eof_error(&self, position: u64) -> FeedError {
        if self.document_ns.is_none() {
            markup_error(position, "document has no root element")
        } else {
            markup_error(
                position,
                format!(
                    "unexpected end of document with {} unclosed element(s)",
                    self.stack.len()
                ),
            )
        }
    }
}

fn content_from_attributes<R>(
    reader: &NsReader<R>,
    start: &BytesStart<'_>,
    position: u64,
) -> Result<MediaContent, FeedError> {
    let mut media = MediaContent::default();

    for attr in start.attributes() {
        let attr = attr.map_err(|e| markup_error(position, e))?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let (resolved, local) = reader.resolve_attribute(attr.key);
        let ns = attribute_ns(&resolved);
        let Some(rule) = CONTENT_ATTRIBUTES
            .iter()
            .find(|rule| rule.ns == ns && rule.local.as_bytes() == local.as_ref())
        else {
            continue;
        };

        let value = attr
            .unescape_value()
            .map_err(|e| markup_error(position, e))?
            .into_owned();
        match rule.field {
            ContentAttr::Url => media.url = value,
            ContentAttr::Type => media.media_type = value,
            ContentAttr::Medium => media.medium = value,
            ContentAttr::Duration => media.duration = value,
            ContentAttr::ChangeKey => media.change_key = value,
            ContentAttr::Valid => media.valid = Some(value),
        }
    }

    Ok(media)
}

/// Accumulates the model while the element stack is walked.
#[derive(Default)]
struct FeedBuilder {
    channel: Channel,
    item: Option<Item>,
    content: Option<MediaContent>,
}

impl FeedBuilder {
    /// A repeated scalar element replaces the earlier value.
    fn begin_text(&mut self, field: TextField) {
        if let Some(slot) = self.text_slot(field) {
            slot.clear();
        }
    }

    fn text_slot(&mut self, field: TextField) -> Option<&mut String> {
        match field {
            TextField::ChannelTitle => Some(&mut self.channel.title),
            TextField::ChannelDescription => Some(&mut self.channel.description),
            TextField::ItemTitle => self.item.as_mut().map(|item| &mut item.title),
            TextField::ItemDescription => self.item.as_mut().map(|item| &mut item.description),
            // Opening the element is what makes `valid` present, even if it stays empty.
            TextField::ItemValid => self
                .item
                .as_mut()
                .map(|item| item.valid.get_or_insert_with(String::new)),
            TextField::ContentValid => self
                .content
                .as_mut()
                .map(|media| media.valid.get_or_insert_with(String::new)),
        }
    }

    fn finish_content(&mut self) {
        if let (Some(media), Some(item)) = (self.content.take(), self.item.as_mut()) {
            item.media_contents.push(media);
        }
    }

    fn finish_item(&mut self) {
        if let Some(item) = self.item.take() {
            self.channel.items.push(item);
        }
    }

    fn finish(self) -> Feed {
        Feed {
            channel: self.channel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn decode(xml: &str) -> Result<Feed, FeedError> {
        decode_markup(xml.as_bytes())
    }

    fn expect_decode_error(xml: &str) -> DecodeError {
        match decode(xml) {
            Err(FeedError::Decode(e)) => e,
            other => panic!("Expected decode error, got {:?}", other),
        }
    }

    const TWO_ITEMS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/" xmlns:dcterms="http://purl.org/dc/terms/">
  <channel>
    <title>Lobby Screens</title>
    <description>Playlist for the lobby</description>
    <item>
      <title>Welcome</title>
      <description>Opening slide</description>
      <dcterms:valid>start=2024-01-01T00:00:00Z;end=2030-01-01T00:00:00Z</dcterms:valid>
      <media:content url="https://cdn.example.com/welcome.jpg" type="image/jpeg" medium="image" duration="10" change_key="rev-3">
        <dcterms:valid>end=2030-01-01T00:00:00Z</dcterms:valid>
      </media:content>
    </item>
    <item>
      <title>Menu</title>
      <description>Lunch menu</description>
      <media:content url="https://cdn.example.com/menu.mp4" type="video/mp4" medium="video" duration="30"/>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_decodes_channel_items_and_media() {
        let feed = decode(TWO_ITEMS).unwrap();
        assert_eq!(feed.channel.title, "Lobby Screens");
        assert_eq!(feed.channel.description, "Playlist for the lobby");
        assert_eq!(feed.channel.items.len(), 2);

        let welcome = &feed.channel.items[0];
        assert_eq!(welcome.title, "Welcome");
        assert_eq!(
            welcome.valid.as_deref(),
            Some("start=2024-01-01T00:00:00Z;end=2030-01-01T00:00:00Z")
        );
        assert_eq!(
            welcome.media_contents,
            vec![MediaContent {
                url: "https://cdn.example.com/welcome.jpg".into(),
                media_type: "image/jpeg".into(),
                medium: "image".into(),
                duration: "10".into(),
                change_key: "rev-3".into(),
                valid: Some("end=2030-01-01T00:00:00Z".into()),
            }]
        );

        let menu = &feed.channel.items[1];
        assert_eq!(menu.title, "Menu");
        assert_eq!(menu.valid, None);
        assert_eq!(menu.media_contents.len(), 1);
        assert_eq!(menu.media_contents[0].url, "https://cdn.example.com/menu.mp4");
        assert_eq!(menu.media_contents[0].change_key, "");
        assert_eq!(menu.media_contents[0].valid, None);
    }

    #[test]
    fn test_empty_valid_is_present() {
        let xml = r#"<rss xmlns:dcterms="http://purl.org/dc/terms/" xmlns:media="http://search.yahoo.com/mrss/"><channel>
            <item><dcterms:valid/><media:content url="a"><dcterms:valid></dcterms:valid></media:content></item>
        </channel></rss>"#;
        let feed = decode(xml).unwrap();
        let item = &feed.channel.items[0];
        assert_eq!(item.valid, Some(String::new()));
        assert_eq!(item.media_contents[0].valid, Some(String::new()));
    }

    #[test]
    fn test_namespaces_match_by_uri_not_prefix() {
        let xml = r#"<rss xmlns:x="http://purl.org/dc/terms/" xmlns:m="http://search.yahoo.com/mrss/"><channel>
            <item><x:valid>soon</x:valid><m:content url="https://cdn.example.com/a.png"/></item>
        </channel></rss>"#;
        let feed = decode(xml).unwrap();
        let item = &feed.channel.items[0];
        assert_eq!(item.valid.as_deref(), Some("soon"));
        assert_eq!(item.media_contents.len(), 1);
        assert_eq!(item.media_contents[0].url, "https://cdn.example.com/a.png");
    }

    #[test]
    fn test_familiar_prefix_in_wrong_namespace_is_ignored() {
        let xml = r#"<rss xmlns:dcterms="http://example.com/not-dublin-core/" xmlns:media="http://example.com/not-mrss/"><channel>
            <item><dcterms:valid>x</dcterms:valid><media:content url="a"/></item>
        </channel></rss>"#;
        let feed = decode(xml).unwrap();
        let item = &feed.channel.items[0];
        assert_eq!(item.valid, None);
        assert!(item.media_contents.is_empty());
    }

    #[test]
    fn test_unprefixed_valid_is_not_dublin_core() {
        let xml = r#"<rss><channel><item><valid>x</valid></item></channel></rss>"#;
        let feed = decode(xml).unwrap();
        assert_eq!(feed.channel.items[0].valid, None);
    }

    #[test]
    fn test_valid_attribute_on_content() {
        let xml = r#"<rss xmlns:dcterms="http://purl.org/dc/terms/" xmlns:media="http://search.yahoo.com/mrss/"><channel>
            <item><media:content url="a" dcterms:valid="end=2031"/></item>
        </channel></rss>"#;
        let feed = decode(xml).unwrap();
        assert_eq!(
            feed.channel.items[0].media_contents[0].valid.as_deref(),
            Some("end=2031")
        );
    }

    #[test]
    fn test_default_namespace_declaration_on_root() {
        let xml = r#"<rss xmlns="urn:example:rss" xmlns:media="http://search.yahoo.com/mrss/"><channel>
            <title>Namespaced</title>
            <item><title>One</title><media:content url="a"/></item>
        </channel></rss>"#;
        let feed = decode(xml).unwrap();
        assert_eq!(feed.channel.title, "Namespaced");
        assert_eq!(feed.channel.items[0].title, "One");
    }

    #[test]
    fn test_nested_title_does_not_overwrite_channel_title() {
        let xml = r#"<rss><channel>
            <title>Real</title>
            <image><title>Logo</title><url>https://example.com/logo.png</url></image>
        </channel></rss>"#;
        let feed = decode(xml).unwrap();
        assert_eq!(feed.channel.title, "Real");
    }

    #[test]
    fn test_unknown_elements_and_attributes_ignored() {
        let xml = r#"<rss xmlns:media="http://search.yahoo.com/mrss/"><channel>
            <generator>CMS</generator>
            <item>
                <guid>1</guid>
                <media:thumbnail url="thumb.jpg"/>
                <media:content url="a" bitrate="800" lang="en"/>
            </item>
        </channel></rss>"#;
        let feed = decode(xml).unwrap();
        assert_eq!(feed.channel.items.len(), 1);
        assert_eq!(feed.channel.items[0].media_contents.len(), 1);
        assert_eq!(feed.channel.items[0].media_contents[0].url, "a");
    }

    #[test]
    fn test_entities_and_cdata_in_text() {
        let xml = r#"<rss><channel>
            <title>Fish &amp; Chips</title>
            <description><![CDATA[<b>bold</b>]]></description>
        </channel></rss>"#;
        let feed = decode(xml).unwrap();
        assert_eq!(feed.channel.title, "Fish & Chips");
        assert_eq!(feed.channel.description, "<b>bold</b>");
    }

    #[test]
    fn test_escaped_attribute_value() {
        let xml = r#"<rss xmlns:media="http://search.yahoo.com/mrss/"><channel><item>
            <media:content url="https://cdn.example.com/a.mp4?x=1&amp;y=2"/>
        </item></channel></rss>"#;
        let feed = decode(xml).unwrap();
        assert_eq!(
            feed.channel.items[0].media_contents[0].url,
            "https://cdn.example.com/a.mp4?x=1&y=2"
        );
    }

    #[test]
    fn test_empty_channel() {
        let feed =
            decode(r#"<?xml version="1.0"?><rss version="2.0"><channel></channel></rss>"#).unwrap();
        assert_eq!(feed, Feed::default());
    }

    #[test]
    fn test_self_closing_root() {
        assert_eq!(decode("<rss/>").unwrap(), Feed::default());
    }

    #[test]
    fn test_multiple_media_keep_document_order() {
        let xml = r#"<rss xmlns:media="http://search.yahoo.com/mrss/"><channel><item>
            <media:content url="1"/><media:content url="2"/><media:content url="3"/>
        </item></channel></rss>"#;
        let feed = decode(xml).unwrap();
        let urls: Vec<&str> = feed.channel.items[0]
            .media_contents
            .iter()
            .map(|m| m.url.as_str())
            .collect();
        assert_eq!(urls, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_wrong_root_is_error() {
        let err = expect_decode_error(r#"<feed xmlns="http://www.w3.org/2005/Atom"></feed>"#);
        assert_eq!(err.format, Format::Markup);
        assert!(err.message.contains("<feed>"), "{}", err.message);
    }

    #[test]
    fn test_unclosed_tag_is_error() {
        expect_decode_error("<not valid xml");
    }

    #[test]
    fn test_truncated_document_is_error() {
        let err = expect_decode_error("<rss><channel><item><title>cut");
        assert!(matches!(err.position, Some(Position::Byte(_))));
    }

    #[test]
    fn test_mismatched_end_tag_is_error() {
        expect_decode_error("<rss><channel></item></rss>");
    }

    #[test]
    fn test_empty_document_is_error() {
        let err = expect_decode_error("");
        assert!(err.message.contains("no root element"), "{}", err.message);
    }

    #[test]
    fn test_undeclared_prefix_is_error() {
        let err =
            expect_decode_error("<rss><channel><item><dcterms:valid/></item></channel></rss>");
        assert!(err.message.contains("dcterms"), "{}", err.message);
    }

    #[test]
    fn test_unknown_entity_is_error() {
        expect_decode_error("<rss><channel><title>&xxe;</title></channel></rss>");
    }
}
