//! EBML and Matroska element ids.

/// Element id, stored with its length marker bits as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub u32);

impl ElementId {
    // EBML header
    pub const EBML: Self = Self(0x1A45_DFA3);
    pub const EBML_VERSION: Self = Self(0x4286);
    pub const EBML_READ_VERSION: Self = Self(0x42F7);
    pub const EBML_MAX_ID_LENGTH: Self = Self(0x42F2);
    pub const EBML_MAX_SIZE_LENGTH: Self = Self(0x42F3);
    pub const DOC_TYPE: Self = Self(0x4282);
    pub const DOC_TYPE_VERSION: Self = Self(0x4287);
    pub const DOC_TYPE_READ_VERSION: Self = Self(0x4285);

    // Global
    pub const VOID: Self = Self(0xEC);
    pub const CRC32: Self = Self(0xBF);

    // Segment and top-level children
    pub const SEGMENT: Self = Self(0x1853_8067);
    pub const SEEK_HEAD: Self = Self(0x114D_9B74);
    pub const INFO: Self = Self(0x1549_A966);
    pub const TRACKS: Self = Self(0x1654_AE6B);
    pub const CLUSTER: Self = Self(0x1F43_B675);
    pub const CUES: Self = Self(0x1C53_BB6B);
    pub const TAGS: Self = Self(0x1254_C367);
    pub const CHAPTERS: Self = Self(0x1043_A770);
    pub const ATTACHMENTS: Self = Self(0x1941_A469);

    // SeekHead
    pub const SEEK: Self = Self(0x4DBB);
    pub const SEEK_ID: Self = Self(0x53AB);
    pub const SEEK_POSITION: Self = Self(0x53AC);

    // Info
    pub const TIMECODE_SCALE: Self = Self(0x2A_D7B1);
    pub const DURATION: Self = Self(0x4489);
    pub const TITLE: Self = Self(0x7BA9);
    pub const MUXING_APP: Self = Self(0x4D80);
    pub const WRITING_APP: Self = Self(0x5741);

    // Tracks
    pub const TRACK_ENTRY: Self = Self(0xAE);
    pub const TRACK_NUMBER: Self = Self(0xD7);
    pub const TRACK_UID: Self = Self(0x73C5);
    pub const TRACK_TYPE: Self = Self(0x83);
    pub const NAME: Self = Self(0x536E);
    pub const CODEC_ID: Self = Self(0x86);
    pub const CODEC_PRIVATE: Self = Self(0x63A2);
    pub const CODEC_DELAY: Self = Self(0x56AA);
    pub const SEEK_PRE_ROLL: Self = Self(0x56BB);
    pub const CONTENT_ENCODINGS: Self = Self(0x6D80);
    pub const CONTENT_ENCODING: Self = Self(0x6240);
    pub const CONTENT_ENCRYPTION: Self = Self(0x5035);

    // Video
    pub const VIDEO: Self = Self(0xE0);
    pub const PIXEL_WIDTH: Self = Self(0xB0);
    pub const PIXEL_HEIGHT: Self = Self(0xBA);
    pub const FRAME_RATE: Self = Self(0x23_83E3);
    pub const COLOUR: Self = Self(0x55B0);
    pub const MATRIX_COEFFICIENTS: Self = Self(0x55B1);
    pub const BITS_PER_CHANNEL: Self = Self(0x55B2);
    pub const CHROMA_SUBSAMPLING_HORZ: Self = Self(0x55B3);
    pub const CHROMA_SUBSAMPLING_VERT: Self = Self(0x55B4);
    pub const CB_SUBSAMPLING_HORZ: Self = Self(0x55B5);
    pub const CB_SUBSAMPLING_VERT: Self = Self(0x55B6);
    pub const CHROMA_SITING_HORZ: Self = Self(0x55B7);
    pub const CHROMA_SITING_VERT: Self = Self(0x55B8);
    pub const RANGE: Self = Self(0x55B9);
    pub const TRANSFER_CHARACTERISTICS: Self = Self(0x55BA);
    pub const PRIMARIES: Self = Self(0x55BB);
    pub const MAX_CLL: Self = Self(0x55BC);
    pub const MAX_FALL: Self = Self(0x55BD);
    pub const MASTERING_METADATA: Self = Self(0x55D0);
    pub const PRIMARY_R_CHROMATICITY_X: Self = Self(0x55D1);
    pub const PRIMARY_R_CHROMATICITY_Y: Self = Self(0x55D2);
    pub const PRIMARY_G_CHROMATICITY_X: Self = Self(0x55D3);
    pub const PRIMARY_G_CHROMATICITY_Y: Self = Self(0x55D4);
    pub const PRIMARY_B_CHROMATICITY_X: Self = Self(0x55D5);
    pub const PRIMARY_B_CHROMATICITY_Y: Self = Self(0x55D6);
    pub const WHITE_POINT_CHROMATICITY_X: Self = Self(0x55D7);
    pub const WHITE_POINT_CHROMATICITY_Y: Self = Self(0x55D8);
    pub const LUMINANCE_MAX: Self = Self(0x55D9);
    pub const LUMINANCE_MIN: Self = Self(0x55DA);

    // Audio
    pub const AUDIO: Self = Self(0xE1);
    pub const SAMPLING_FREQUENCY: Self = Self(0xB5);
    pub const CHANNELS: Self = Self(0x9F);
    pub const BIT_DEPTH: Self = Self(0x6264);

    // Cluster
    pub const TIMESTAMP: Self = Self(0xE7);
    pub const POSITION: Self = Self(0xA7);
    pub const PREV_SIZE: Self = Self(0xAB);
    pub const SIMPLE_BLOCK: Self = Self(0xA3);
    pub const BLOCK_GROUP: Self = Self(0xA0);
    pub const BLOCK: Self = Self(0xA1);
    pub const BLOCK_DURATION: Self = Self(0x9B);
    pub const REFERENCE_BLOCK: Self = Self(0xFB);
    pub const DISCARD_PADDING: Self = Self(0x75A2);

    // Cues
    pub const CUE_POINT: Self = Self(0xBB);
    pub const CUE_TIME: Self = Self(0xB3);
    pub const CUE_TRACK_POSITIONS: Self = Self(0xB7);
    pub const CUE_TRACK: Self = Self(0xF7);
    pub const CUE_CLUSTER_POSITION: Self = Self(0xF1);
    pub const CUE_BLOCK_NUMBER: Self = Self(0x5378);

    // Tags
    pub const TAG: Self = Self(0x7373);
    pub const TARGETS: Self = Self(0x63C0);
    pub const SIMPLE_TAG: Self = Self(0x67C8);
    pub const TAG_NAME: Self = Self(0x45A3);
    pub const TAG_STRING: Self = Self(0x4487);

    /// Whether this id may only appear directly under the Segment.
    ///
    /// Seeing one of these while scanning a cluster of unknown size ends
    /// that cluster.
    pub fn is_segment_child(&self) -> bool {
        matches!(
            *self,
            Self::SEEK_HEAD
                | Self::INFO
                | Self::TRACKS
                | Self::CLUSTER
                | Self::CUES
                | Self::TAGS
                | Self::CHAPTERS
                | Self::ATTACHMENTS
        )
    }

    /// Human-readable name for the ids this crate knows about.
    pub fn name(&self) -> Option<&'static str> {
        let name = match *self {
            Self::EBML => "EBML",
            Self::SEGMENT => "Segment",
            Self::SEEK_HEAD => "SeekHead",
            Self::INFO => "Info",
            Self::TRACKS => "Tracks",
            Self::TRACK_ENTRY => "TrackEntry",
            Self::CLUSTER => "Cluster",
            Self::CUES => "Cues",
            Self::TAGS => "Tags",
            Self::TAG => "Tag",
            Self::CHAPTERS => "Chapters",
            Self::ATTACHMENTS => "Attachments",
            Self::VOID => "Void",
            Self::SIMPLE_BLOCK => "SimpleBlock",
            Self::BLOCK_GROUP => "BlockGroup",
            Self::BLOCK => "Block",
            Self::TIMESTAMP => "Timestamp",
            _ => return None,
        };
        Some(name)
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "0x{:X}", self.0),
        }
    }
}
