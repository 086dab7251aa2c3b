// In-memory box tree for random access parsing.
//
// `decode` turns a buffer into a tree of [`Mp4Box`] nodes with typed
// bodies for the recognised box set and raw payloads for everything
// else. `encode_to_bytes` serializes a tree back to its on-disk layout.

mod decode;
mod encode;

pub use decode::{decode, DecodeError};
pub use encode::encode_to_bytes;

use bmff::{
    is_full_box, BoxType, CttsEntry, ElstEntry, StscEntry, SttsEntry, TrunEntry, TYPE_CO64,
    TYPE_CSLG, TYPE_CTTS, TYPE_DINF, TYPE_DREF, TYPE_EDTS, TYPE_ELST, TYPE_HDLR, TYPE_MDHD,
    TYPE_MDIA, TYPE_MEHD, TYPE_META, TYPE_MFHD, TYPE_MINF, TYPE_MVEX, TYPE_MVHD, TYPE_SAIO,
    TYPE_SAIZ, TYPE_SBGP, TYPE_SDTP, TYPE_SGPD, TYPE_SMHD, TYPE_STBL, TYPE_STCO, TYPE_STSC,
    TYPE_STSD, TYPE_STSS, TYPE_STSZ, TYPE_STTS, TYPE_TFDT, TYPE_TFHD, TYPE_TKHD, TYPE_TRAF,
    TYPE_TRAK, TYPE_TREF, TYPE_TREX, TYPE_TRGR, TYPE_TRUN, TYPE_UDTA, TYPE_VMHD,
};
use std::collections::HashMap;

// A node in the decoded box tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mp4Box {
    pub box_type: BoxType,
    // Total size on disk including headers. Zero for synthesized nodes.
    pub size: u64,
    pub version: u8,
    pub flags: u32,
    pub has_full_box: bool,
    pub body: BoxBody,
    children: HashMap<BoxType, Vec<Mp4Box>>,
    other_boxes: Vec<Mp4Box>,
}

// Typed body of a recognised box, or the raw payload for everything
// else. Pure containers carry `None`.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum BoxBody {
    #[default]
    None,
    Ftyp(Ftyp),
    Mvhd(Mvhd),
    Tkhd(Tkhd),
    Mdhd(Mdhd),
    Hdlr(Hdlr),
    Stsd(Stsd),
    Visual(Visual),
    Audio(Audio),
    AvcC(AvcC),
    Esds(Esds),
    Stts(Stts),
    Ctts(Ctts),
    Stsc(Stsc),
    Stsz(Stsz),
    Stco(Stco),
    Co64(Co64),
    Stss(Stss),
    Elst(Elst),
    Mehd(Mehd),
    Trex(Trex),
    Mfhd(Mfhd),
    Tfhd(Tfhd),
    Tfdt(Tfdt),
    Trun(Trun),
    Raw(Vec<u8>),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ftyp {
    pub major_brand: [u8; 4],
    pub minor_version: u32,
    pub compatible_brands: Vec<[u8; 4]>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Mvhd {
    pub timescale: u32,
    pub duration: u64,
    pub next_track_id: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tkhd {
    pub track_id: u32,
    pub duration: u64,
    // 16.16 fixed point.
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Mdhd {
    pub timescale: u32,
    pub duration: u64,
    pub language: u16,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Hdlr {
    pub handler_type: [u8; 4],
    pub name: String,
}

// The stsd entries are themselves boxes: visual or audio sample
// entries with nested children, or raw leaves for unrecognised codecs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Stsd {
    pub entries: Vec<Mp4Box>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Visual {
    pub data_reference_index: u16,
    pub width: u16,
    pub height: u16,
    // 16.16 fixed point.
    pub horiz_resolution: u32,
    pub vert_resolution: u32,
    pub frame_count: u16,
    pub compressor_name: String,
    pub depth: u16,
    pub children: Vec<Mp4Box>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Audio {
    pub data_reference_index: u16,
    pub channel_count: u16,
    pub sample_size: u16,
    // 16.16 fixed point.
    pub sample_rate: u32,
    pub children: Vec<Mp4Box>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AvcC {
    // Codec suffix for MIME strings, e.g. "64001f".
    pub mime_codec: Option<String>,
    pub buffer: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Esds {
    // Codec suffix for MIME strings, e.g. "40.2".
    pub mime_codec: Option<String>,
    pub buffer: Vec<u8>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stts {
    pub entries: Vec<SttsEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ctts {
    pub entries: Vec<CttsEntry>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stsc {
    pub entries: Vec<StscEntry>,
}

// When `sample_size` is non-zero the table is virtual and
// `entry_sizes` is empty.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stsz {
    pub sample_size: u32,
    pub sample_count: u32,
    pub entry_sizes: Vec<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stco {
    pub chunk_offsets: Vec<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Co64 {
    pub chunk_offsets: Vec<u64>,
}

// Sample numbers are 1-based.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stss {
    pub sample_numbers: Vec<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Elst {
    pub entries: Vec<ElstEntry>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Mehd {
    pub fragment_duration: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Trex {
    pub track_id: u32,
    pub default_sample_description_index: u32,
    pub default_sample_duration: u32,
    pub default_sample_size: u32,
    pub default_sample_flags: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Mfhd {
    pub sequence_number: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tfhd {
    pub track_id: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tfdt {
    pub base_media_decode_time: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Trun {
    pub data_offset: i32,
    pub first_sample_flags: u32,
    pub entries: Vec<TrunEntry>,
}

macro_rules! body_accessor {
    ($name:ident, $variant:ident, $ty:ty) => {
        #[must_use]
        pub fn $name(&self) -> Option<&$ty> {
            match &self.body {
                BoxBody::$variant(v) => Some(v),
                _ => None,
            }
        }
    };
}

impl Mp4Box {
    #[must_use]
    pub fn new(box_type: BoxType, body: BoxBody) -> Self {
        Self {
            box_type,
            size: 0,
            version: 0,
            flags: 0,
            has_full_box: is_full_box(box_type),
            body,
            children: HashMap::new(),
            other_boxes: Vec::new(),
        }
    }

    // A synthesized pure container.
    #[must_use]
    pub fn container(box_type: BoxType) -> Self {
        Self::new(box_type, BoxBody::None)
    }

    #[must_use]
    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Mp4Box) -> Self {
        self.push_child(child);
        self
    }

    // Children of types in the parent's canonical order are indexed by
    // type; everything else lands in the "other" list in insertion
    // order, which is also where encode writes it back.
    pub(crate) fn push_child(&mut self, child: Mp4Box) {
        let indexed = canonical_children(self.box_type)
            .is_some_and(|order| order.contains(&child.box_type));
        if indexed {
            self.children.entry(child.box_type).or_default().push(child);
        } else {
            self.other_boxes.push(child);
        }
    }

    // First direct child of the given type. Not recursive.
    #[must_use]
    pub fn child(&self, t: BoxType) -> Option<&Mp4Box> {
        if let Some(v) = self.children.get(&t).and_then(|v| v.first()) {
            return Some(v);
        }
        self.other_boxes.iter().find(|b| b.box_type == t)
    }

    // Every direct child of the given type, in insertion order.
    #[must_use]
    pub fn child_list(&self, t: BoxType) -> &[Mp4Box] {
        self.children.get(&t).map_or(&[], Vec::as_slice)
    }

    // Children that are not part of the parent's canonical order,
    // preserved verbatim in insertion order.
    #[must_use]
    pub fn other_boxes(&self) -> &[Mp4Box] {
        &self.other_boxes
    }

    body_accessor!(ftyp, Ftyp, Ftyp);
    body_accessor!(mvhd, Mvhd, Mvhd);
    body_accessor!(tkhd, Tkhd, Tkhd);
    body_accessor!(mdhd, Mdhd, Mdhd);
    body_accessor!(hdlr, Hdlr, Hdlr);
    body_accessor!(stsd, Stsd, Stsd);
    body_accessor!(visual, Visual, Visual);
    body_accessor!(audio, Audio, Audio);
    body_accessor!(avcc, AvcC, AvcC);
    body_accessor!(esds, Esds, Esds);
    body_accessor!(stts, Stts, Stts);
    body_accessor!(ctts, Ctts, Ctts);
    body_accessor!(stsc, Stsc, Stsc);
    body_accessor!(stsz, Stsz, Stsz);
    body_accessor!(stco, Stco, Stco);
    body_accessor!(co64, Co64, Co64);
    body_accessor!(stss, Stss, Stss);
    body_accessor!(elst, Elst, Elst);
    body_accessor!(mehd, Mehd, Mehd);
    body_accessor!(trex, Trex, Trex);
    body_accessor!(mfhd, Mfhd, Mfhd);
    body_accessor!(tfhd, Tfhd, Tfhd);
    body_accessor!(tfdt, Tfdt, Tfdt);
    body_accessor!(trun, Trun, Trun);

    // Raw payload of an unrecognised leaf.
    #[must_use]
    pub fn raw(&self) -> Option<&[u8]> {
        match &self.body {
            BoxBody::Raw(v) => Some(v),
            _ => None,
        }
    }
}

// Canonical write order of the recognised children per container type.
pub(crate) fn canonical_children(t: BoxType) -> Option<&'static [BoxType]> {
    match &t {
        b"moov" => Some(&[TYPE_MVHD, TYPE_META, TYPE_TRAK, TYPE_MVEX]),
        b"trak" => Some(&[
            TYPE_TKHD, TYPE_TREF, TYPE_TRGR, TYPE_EDTS, TYPE_META, TYPE_MDIA, TYPE_UDTA,
        ]),
        b"edts" => Some(&[TYPE_ELST]),
        b"mdia" => Some(&[TYPE_MDHD, TYPE_HDLR, TYPE_MINF]),
        b"minf" => Some(&[TYPE_VMHD, TYPE_SMHD, TYPE_DINF, TYPE_STBL]),
        b"dinf" => Some(&[TYPE_DREF]),
        b"stbl" => Some(&[
            TYPE_STSD, TYPE_STTS, TYPE_CTTS, TYPE_CSLG, TYPE_STSC, TYPE_STSZ, TYPE_STCO,
            TYPE_CO64, TYPE_STSS, TYPE_SDTP, TYPE_SBGP, TYPE_SGPD, TYPE_SAIZ, TYPE_SAIO,
        ]),
        b"mvex" => Some(&[TYPE_MEHD, TYPE_TREX]),
        b"moof" => Some(&[TYPE_MFHD, TYPE_META, TYPE_TRAF]),
        b"traf" => Some(&[
            TYPE_TFHD, TYPE_TFDT, TYPE_TRUN, TYPE_SBGP, TYPE_SGPD, TYPE_SAIZ, TYPE_SAIO,
            TYPE_META,
        ]),
        _ => None,
    }
}
