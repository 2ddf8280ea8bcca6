//! Matroska/WebM parser.
//!
//! Read-only traversal of one segment: the EBML header is validated, the
//! segment's top-level children are walked once to pick up Info, Tracks and
//! Tags and to index clusters, and blocks are then decoded lazily cluster by
//! cluster.

mod cluster;
mod info;
mod tags;
mod tracks;

pub use cluster::{Block, Cluster, FrameRef};
pub use info::{SegmentInfo, DEFAULT_TIMECODE_SCALE};
pub use tags::{parse_tags, SimpleTag, Tag};
pub use tracks::{
    AudioSettings, Colour, MasteringMetadata, Track, TrackMedia, TrackType, Tracks,
    VideoSettings,
};

use crate::ebml::read::{parse_children, read_element_data, read_element_header, read_string, read_uint};
use crate::ebml::{ElementHeader, ElementId};
use crate::io::MkvReader;
use crate::{Error, Result};
use tracing::{debug, warn};

/// Parsed EBML header.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct EbmlHeader {
    pub version: u64,
    pub read_version: u64,
    pub max_id_length: u64,
    pub max_size_length: u64,
    pub doc_type: String,
    pub doc_type_version: u64,
    pub doc_type_read_version: u64,
}

impl Default for EbmlHeader {
    fn default() -> Self {
        Self {
            version: 1,
            read_version: 1,
            max_id_length: 4,
            max_size_length: 8,
            doc_type: "matroska".to_string(),
            doc_type_version: 1,
            doc_type_read_version: 1,
        }
    }
}

impl EbmlHeader {
    /// Parse and validate the header at the start of the stream.
    ///
    /// Returns the header and the offset where segment parsing resumes.
    pub fn parse<R: MkvReader>(reader: &mut R) -> Result<(Self, u64)> {
        let limit = reader.length()?.available;
        if limit == 0 {
            return Err(Error::format("empty input"));
        }

        let header = read_element_header(reader, 0, limit)?;
        if header.id != ElementId::EBML {
            return Err(Error::format(format!(
                "stream does not start with an EBML header (found {})",
                header.id
            )));
        }
        let data = read_element_data(reader, &header)?;

        let mut ebml = EbmlHeader::default();
        for child in parse_children(&data)? {
            match child.id {
                ElementId::EBML_VERSION => ebml.version = read_uint(child.data)?,
                ElementId::EBML_READ_VERSION => ebml.read_version = read_uint(child.data)?,
                ElementId::EBML_MAX_ID_LENGTH => ebml.max_id_length = read_uint(child.data)?,
                ElementId::EBML_MAX_SIZE_LENGTH => ebml.max_size_length = read_uint(child.data)?,
                ElementId::DOC_TYPE => ebml.doc_type = read_string(child.data)?,
                ElementId::DOC_TYPE_VERSION => ebml.doc_type_version = read_uint(child.data)?,
                ElementId::DOC_TYPE_READ_VERSION => {
                    ebml.doc_type_read_version = read_uint(child.data)?
                }
                _ => {}
            }
        }
        ebml.validate()?;

        let next = header
            .end()
            .ok_or_else(|| Error::format("EBML header has unknown size"))?;
        debug!(doc_type = %ebml.doc_type, next, "Parsed EBML header");
        Ok((ebml, next))
    }

    fn validate(&self) -> Result<()> {
        if self.doc_type != "webm" && self.doc_type != "matroska" {
            return Err(Error::format(format!("unsupported DocType {:?}", self.doc_type)));
        }
        if self.read_version > 1 {
            return Err(Error::format(format!(
                "unsupported EBMLReadVersion {}",
                self.read_version
            )));
        }
        if self.max_id_length > 4 || self.max_size_length > 8 {
            return Err(Error::format(format!(
                "unsupported EBMLMaxIDLength {} / EBMLMaxSizeLength {}",
                self.max_id_length, self.max_size_length
            )));
        }
        if self.doc_type_read_version > 4 {
            return Err(Error::format(format!(
                "unsupported DocTypeReadVersion {}",
                self.doc_type_read_version
            )));
        }
        Ok(())
    }
}

/// One Segment and everything loaded from it.
#[derive(Debug, Clone)]
pub struct Segment {
    offset: u64,
    data_offset: u64,
    size: Option<u64>,
    end: u64,
    info: Option<SegmentInfo>,
    tracks: Tracks,
    tags: Vec<Tag>,
    clusters: Vec<Cluster>,
}

impl Segment {
    /// Locate the Segment element at or after `position`, skipping Void.
    pub fn open<R: MkvReader>(reader: &mut R, position: u64) -> Result<Self> {
        let limit = reader.length()?.available;
        let mut pos = position;

        let header = loop {
            let header = read_element_header(reader, pos, limit)?;
            match header.id {
                ElementId::SEGMENT => break header,
                ElementId::VOID => {
                    pos = header
                        .end()
                        .ok_or_else(|| Error::format("Void element has unknown size"))?
                }
                other => {
                    return Err(Error::format(format!(
                        "expected Segment at {pos}, found {other}"
                    )))
                }
            }
        };

        let end = match header.end() {
            Some(end) if end > limit => {
                warn!(declared_end = end, available = limit, "Segment extends past the input; truncating");
                limit
            }
            Some(end) => end,
            None => limit,
        };

        debug!(offset = header.offset, size = ?header.size, "Opened segment");
        Ok(Self {
            offset: header.offset,
            data_offset: header.data_offset(),
            size: header.size,
            end,
            info: None,
            tracks: Tracks::default(),
            tags: Vec::new(),
            clusters: Vec::new(),
        })
    }

    /// Walk the segment's children: parse metadata and index clusters.
    pub fn load<R: MkvReader>(&mut self, reader: &mut R) -> Result<()> {
        let mut pos = self.data_offset;

        while pos < self.end {
            let header = read_element_header(reader, pos, self.end)?;

            if header.id == ElementId::CLUSTER {
                let (cluster, truncated) = self.index_cluster(reader, &header)?;
                pos = cluster.end;
                self.clusters.push(cluster);
                if truncated {
                    break;
                }
                continue;
            }

            let end = header
                .end()
                .ok_or_else(|| Error::format(format!("{} has unknown size", header.id)))?;
            if end > self.end {
                return Err(Error::format(format!(
                    "{} at {} runs past the end of the segment",
                    header.id, header.offset
                )));
            }

            match header.id {
                ElementId::INFO => {
                    self.info = Some(SegmentInfo::parse(&read_element_data(reader, &header)?)?)
                }
                ElementId::TRACKS => {
                    self.tracks = Tracks::parse(&read_element_data(reader, &header)?)?
                }
                ElementId::TAGS => self
                    .tags
                    .extend(parse_tags(&read_element_data(reader, &header)?)?),
                _ => {}
            }
            pos = end;
        }

        let scale = self
            .info
            .as_ref()
            .map_or(DEFAULT_TIMECODE_SCALE, |info| info.timecode_scale);
        for cluster in &mut self.clusters {
            cluster.timecode_scale = scale;
        }

        debug!(
            tracks = self.tracks.len(),
            tags = self.tags.len(),
            clusters = self.clusters.len(),
            "Loaded segment"
        );
        Ok(())
    }

    /// Index one cluster. The flag is set when an unknown-size cluster was
    /// cut short by the end of the input.
    fn index_cluster<R: MkvReader>(
        &self,
        reader: &mut R,
        header: &ElementHeader,
    ) -> Result<(Cluster, bool)> {
        let limit = match header.end() {
            Some(end) if end > self.end => {
                return Err(Error::format(format!(
                    "cluster at {} runs past the end of the segment",
                    header.offset
                )))
            }
            Some(end) => end,
            None => self.end,
        };
        let unknown_size = header.size.is_none();

        let mut timecode = None;
        let mut truncated = false;
        let mut pos = header.data_offset();

        while pos < limit {
            let child = match read_element_header(reader, pos, limit) {
                Ok(child) => child,
                Err(_) if unknown_size => {
                    truncated = true;
                    break;
                }
                Err(e) => return Err(e),
            };
            if unknown_size && child.id.is_segment_child() {
                break;
            }

            let child_end = match child.end() {
                Some(end) if end <= limit => end,
                Some(_) if unknown_size => {
                    truncated = true;
                    break;
                }
                _ => {
                    return Err(Error::format(format!(
                        "{} at {} does not fit in its cluster",
                        child.id, child.offset
                    )))
                }
            };

            if child.id == ElementId::TIMESTAMP {
                timecode = Some(read_uint(&read_element_data(reader, &child)?)?);
                if !unknown_size {
                    break;
                }
            }
            pos = child_end;
        }

        if truncated {
            warn!(offset = pos, "Input ends inside a cluster; dropping the incomplete tail");
        }

        let timecode = timecode.ok_or_else(|| {
            Error::format(format!("cluster at {} has no Timestamp", header.offset))
        })?;
        let end = if unknown_size { pos } else { limit };

        Ok((
            Cluster {
                offset: header.offset,
                data_offset: header.data_offset(),
                end,
                timecode,
                timecode_scale: DEFAULT_TIMECODE_SCALE,
            },
            truncated,
        ))
    }

    /// Stream offset of the Segment element.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Stream offset of the first child.
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// Declared size, `None` when unknown.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Segment information. Required for remuxing.
    pub fn info(&self) -> Result<&SegmentInfo> {
        self.info.as_ref().ok_or(Error::MissingElement("Info"))
    }

    pub fn tracks(&self) -> &Tracks {
        &self.tracks
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Clusters in file order.
    pub fn clusters(&self) -> std::slice::Iter<'_, Cluster> {
        self.clusters.iter()
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixtureBlock, WebmFixture};
    use crate::transport::{MemorySource, TransportReader};

    fn reader(data: Vec<u8>) -> TransportReader<MemorySource> {
        TransportReader::new(MemorySource::new(data))
    }

    #[test]
    fn test_parse_header_and_load() {
        let data = WebmFixture::av()
            .cluster(0, vec![FixtureBlock::video(0, true, b"v0"), FixtureBlock::audio(10, b"a0")])
            .cluster(40, vec![FixtureBlock::video(0, true, b"v1")])
            .build();
        let mut reader = reader(data);

        let (header, next) = EbmlHeader::parse(&mut reader).unwrap();
        assert_eq!(header.doc_type, "webm");

        let mut segment = Segment::open(&mut reader, next).unwrap();
        segment.load(&mut reader).unwrap();
        assert_eq!(segment.info().unwrap().timecode_scale, 1_000_000);
        assert_eq!(segment.tracks().len(), 2);
        assert_eq!(segment.cluster_count(), 2);

        let clusters: Vec<_> = segment.clusters().cloned().collect();
        assert_eq!(clusters[1].timecode(), 40);

        let first = clusters[0].first_block(&mut reader).unwrap().unwrap();
        assert_eq!(first.track_number(), 1);
        assert!(first.is_key());
        let second = clusters[0].next_block(&mut reader, &first).unwrap().unwrap();
        assert_eq!(second.track_number(), 2);
        assert_eq!(second.time_ns(&clusters[0]).unwrap(), 10_000_000);
        assert!(clusters[0].next_block(&mut reader, &second).unwrap().is_none());

        let mut buf = [0u8; 8];
        let n = second.frame(0).unwrap().read(&mut reader, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"a0");
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut data = WebmFixture::av().build();
        data[0] = 0x00;
        let err = EbmlHeader::parse(&mut reader(data)).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Format);
    }

    #[test]
    fn test_unsupported_doc_type_rejected() {
        let data = WebmFixture::av().doc_type("mkv3d").build();
        assert!(EbmlHeader::parse(&mut reader(data)).is_err());
    }

    #[test]
    fn test_missing_info() {
        let data = WebmFixture::av().without_info().build();
        let mut reader = reader(data);
        let (_, next) = EbmlHeader::parse(&mut reader).unwrap();
        let mut segment = Segment::open(&mut reader, next).unwrap();
        segment.load(&mut reader).unwrap();
        assert!(matches!(segment.info(), Err(Error::MissingElement("Info"))));
    }

    #[test]
    fn test_unknown_size_clusters() {
        let data = WebmFixture::av()
            .live()
            .cluster(0, vec![FixtureBlock::video(0, true, b"v0")])
            .cluster(33, vec![FixtureBlock::video(0, false, b"v1"), FixtureBlock::audio(5, b"a")])
            .build();
        let mut reader = reader(data);
        let (_, next) = EbmlHeader::parse(&mut reader).unwrap();
        let mut segment = Segment::open(&mut reader, next).unwrap();
        assert_eq!(segment.size(), None);
        segment.load(&mut reader).unwrap();

        let clusters: Vec<_> = segment.clusters().cloned().collect();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].end(), clusters[1].offset());

        let block = clusters[1].first_block(&mut reader).unwrap().unwrap();
        assert!(!block.is_key());
        let block = clusters[1].next_block(&mut reader, &block).unwrap().unwrap();
        assert_eq!(block.track_number(), 2);
        assert!(clusters[1].next_block(&mut reader, &block).unwrap().is_none());
    }

    #[test]
    fn test_truncated_live_cluster_keeps_complete_blocks() {
        let mut data = WebmFixture::av()
            .live()
            .cluster(0, vec![FixtureBlock::video(0, true, b"v0"), FixtureBlock::video(33, false, b"v1-long-frame")])
            .build();
        data.truncate(data.len() - 4);

        let mut reader = reader(data);
        let (_, next) = EbmlHeader::parse(&mut reader).unwrap();
        let mut segment = Segment::open(&mut reader, next).unwrap();
        segment.load(&mut reader).unwrap();

        let cluster = segment.clusters().next().unwrap().clone();
        let first = cluster.first_block(&mut reader).unwrap().unwrap();
        assert!(cluster.next_block(&mut reader, &first).unwrap().is_none());
    }

    #[test]
    fn test_block_group_fields() {
        let data = WebmFixture::av()
            .cluster(
                0,
                vec![
                    FixtureBlock::video(0, true, b"v0"),
                    FixtureBlock::audio(20, b"a0").with_discard_padding(3_500_000),
                    FixtureBlock::video(33, false, b"v1").in_group(),
                ],
            )
            .build();
        let mut reader = reader(data);
        let (_, next) = EbmlHeader::parse(&mut reader).unwrap();
        let mut segment = Segment::open(&mut reader, next).unwrap();
        segment.load(&mut reader).unwrap();

        let cluster = segment.clusters().next().unwrap().clone();
        let b0 = cluster.first_block(&mut reader).unwrap().unwrap();
        let b1 = cluster.next_block(&mut reader, &b0).unwrap().unwrap();
        assert_eq!(b1.discard_padding(), 3_500_000);
        assert!(b1.is_key());
        let b2 = cluster.next_block(&mut reader, &b1).unwrap().unwrap();
        assert!(!b2.is_key());
        assert_eq!(b2.relative_timecode(), 33);
    }

    #[test]
    fn test_tags_after_clusters_are_found() {
        let data = WebmFixture::av()
            .cluster(0, vec![FixtureBlock::video(0, true, b"v0")])
            .tag(&[("TITLE", "late")])
            .tags_after_clusters()
            .build();
        let mut reader = reader(data);
        let (_, next) = EbmlHeader::parse(&mut reader).unwrap();
        let mut segment = Segment::open(&mut reader, next).unwrap();
        segment.load(&mut reader).unwrap();
        assert_eq!(segment.tags().len(), 1);
        assert_eq!(segment.tags()[0].simple_tags[0].value, "late");
    }
}
