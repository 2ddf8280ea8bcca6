//! Output tags.

use crate::ebml::write::{end_master, put_string, start_master};
use crate::ebml::ElementId;
use bytes::BytesMut;

/// A Tag under construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MuxTag {
    simple_tags: Vec<(String, String)>,
}

impl MuxTag {
    /// Append a name/value pair.
    pub fn add_simple_tag(&mut self, name: &str, value: &str) {
        self.simple_tags.push((name.to_string(), value.to_string()));
    }

    pub fn simple_tags(&self) -> &[(String, String)] {
        &self.simple_tags
    }

    pub(crate) fn write(&self, buf: &mut BytesMut) {
        let tag = start_master(buf, ElementId::TAG);
        // Empty Targets: the tag applies to the whole segment.
        let targets = start_master(buf, ElementId::TARGETS);
        end_master(buf, targets);
        for (name, value) in &self.simple_tags {
            let simple = start_master(buf, ElementId::SIMPLE_TAG);
            put_string(buf, ElementId::TAG_NAME, name);
            put_string(buf, ElementId::TAG_STRING, value);
            end_master(buf, simple);
        }
        end_master(buf, tag);
    }
}

/// Write the Tags element.
pub(crate) fn write_tags(buf: &mut BytesMut, tags: &[MuxTag]) {
    let master = start_master(buf, ElementId::TAGS);
    for tag in tags {
        tag.write(buf);
    }
    end_master(buf, master);
}
