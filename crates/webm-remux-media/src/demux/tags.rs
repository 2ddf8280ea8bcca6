//! Tags.

use crate::ebml::read::{parse_children, read_string};
use crate::ebml::ElementId;
use crate::Result;

/// One name/value pair.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct SimpleTag {
    pub name: String,
    /// TagString; empty when the tag only carries binary data.
    pub value: String,
}

/// A Tag element: simple tags in file order. Targets are not kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct Tag {
    pub simple_tags: Vec<SimpleTag>,
}

impl Tag {
    fn parse(data: &[u8]) -> Result<Self> {
        let mut tag = Tag::default();
        for child in parse_children(data)? {
            if child.id == ElementId::SIMPLE_TAG {
                tag.simple_tags.push(parse_simple_tag(child.data)?);
            }
        }
        Ok(tag)
    }
}

fn parse_simple_tag(data: &[u8]) -> Result<SimpleTag> {
    let mut simple = SimpleTag {
        name: String::new(),
        value: String::new(),
    };
    for child in parse_children(data)? {
        match child.id {
            ElementId::TAG_NAME => simple.name = read_string(child.data)?,
            ElementId::TAG_STRING => simple.value = read_string(child.data)?,
            _ => {}
        }
    }
    Ok(simple)
}

/// Parse the payload of a Tags element.
pub fn parse_tags(data: &[u8]) -> Result<Vec<Tag>> {
    parse_children(data)?
        .into_iter()
        .filter(|child| child.id == ElementId::TAG)
        .map(|child| Tag::parse(child.data))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ebml::write::{end_master, put_string, put_uint, start_master};
    use bytes::BytesMut;

    #[test]
    fn test_parse_tags_preserves_order() {
        let mut buf = BytesMut::new();
        let tag = start_master(&mut buf, ElementId::TAG);
        let targets = start_master(&mut buf, ElementId::TARGETS);
        put_uint(&mut buf, ElementId(0x68CA), 50);
        end_master(&mut buf, targets);
        for (name, value) in [("TITLE", "Demo"), ("ARTIST", "Someone"), ("ENCODER", "")] {
            let simple = start_master(&mut buf, ElementId::SIMPLE_TAG);
            put_string(&mut buf, ElementId::TAG_NAME, name);
            if !value.is_empty() {
                put_string(&mut buf, ElementId::TAG_STRING, value);
            }
            end_master(&mut buf, simple);
        }
        end_master(&mut buf, tag);

        let empty = start_master(&mut buf, ElementId::TAG);
        end_master(&mut buf, empty);

        let tags = parse_tags(&buf).unwrap();
        assert_eq!(tags.len(), 2);
        let names: Vec<_> = tags[0].simple_tags.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["TITLE", "ARTIST", "ENCODER"]);
        assert_eq!(tags[0].simple_tags[1].value, "Someone");
        assert_eq!(tags[0].simple_tags[2].value, "");
        assert!(tags[1].simple_tags.is_empty());
    }
}
