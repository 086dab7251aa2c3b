// Codec for the ISO Base Media File Format box structure.
//
// Three access styles are provided, from cheapest to most convenient:
//
// - `Scanner` discovers top-level boxes in a seekable stream without
//   buffering their payloads.
// - `Reader` walks an in-memory buffer zero-copy, with explicit
//   enter/exit for containers.
// - The cursors in `iter` decode the packed sample tables entry by
//   entry, and `Writer` builds boxes with size backpatching.

mod descriptor;
mod iter;
mod reader;
mod scanner;
#[cfg(test)]
mod test;
mod writer;

pub use descriptor::read_esds_codec;
pub use iter::{
    read_audio_sample_entry, read_avcc_codec, read_ftyp, read_visual_sample_entry,
    AudioSampleEntry, Co64Iter, CttsEntry,
    CttsIter, ElstEntry, ElstIter, FtypInfo, SidxEntry, StscEntry, StscIter, SttsEntry, SttsIter,
    StszIter, TrunEntry, TrunIter, U32Iter, VisualSampleEntry, TFHD_BASE_DATA_OFFSET_PRESENT,
    TFHD_DEFAULT_BASE_IS_MOOF, TFHD_DEFAULT_SAMPLE_DURATION_PRESENT,
    TFHD_DEFAULT_SAMPLE_FLAGS_PRESENT, TFHD_DEFAULT_SAMPLE_SIZE_PRESENT,
    TFHD_DURATION_IS_EMPTY, TFHD_SAMPLE_DESCRIPTION_INDEX_PRESENT, TRUN_DATA_OFFSET_PRESENT,
    TRUN_FIRST_SAMPLE_FLAGS_PRESENT, TRUN_SAMPLE_COMPOSITION_TIME_OFFSET_PRESENT,
    TRUN_SAMPLE_DURATION_PRESENT, TRUN_SAMPLE_FLAGS_PRESENT, TRUN_SAMPLE_SIZE_PRESENT,
};
pub use reader::{
    parse_hdlr_name, parse_mdhd, parse_mvhd, parse_tkhd, MdhdFields, MvhdFields, Reader,
    TkhdFields, TrexFields,
};
pub use scanner::{ScanEntry, ScanError, Scanner};
pub use writer::Writer;

// Mpeg box type.
pub type BoxType = [u8; 4];

pub const TYPE_FTYP: BoxType = *b"ftyp";
pub const TYPE_STYP: BoxType = *b"styp";
pub const TYPE_MOOV: BoxType = *b"moov";
pub const TYPE_MVHD: BoxType = *b"mvhd";
pub const TYPE_TRAK: BoxType = *b"trak";
pub const TYPE_TKHD: BoxType = *b"tkhd";
pub const TYPE_TREF: BoxType = *b"tref";
pub const TYPE_TRGR: BoxType = *b"trgr";
pub const TYPE_EDTS: BoxType = *b"edts";
pub const TYPE_ELST: BoxType = *b"elst";
pub const TYPE_MDIA: BoxType = *b"mdia";
pub const TYPE_MDHD: BoxType = *b"mdhd";
pub const TYPE_HDLR: BoxType = *b"hdlr";
pub const TYPE_MINF: BoxType = *b"minf";
pub const TYPE_VMHD: BoxType = *b"vmhd";
pub const TYPE_SMHD: BoxType = *b"smhd";
pub const TYPE_DINF: BoxType = *b"dinf";
pub const TYPE_DREF: BoxType = *b"dref";
pub const TYPE_URL: BoxType = *b"url ";
pub const TYPE_STBL: BoxType = *b"stbl";
pub const TYPE_STSD: BoxType = *b"stsd";
pub const TYPE_STTS: BoxType = *b"stts";
pub const TYPE_CTTS: BoxType = *b"ctts";
pub const TYPE_CSLG: BoxType = *b"cslg";
pub const TYPE_STSC: BoxType = *b"stsc";
pub const TYPE_STSZ: BoxType = *b"stsz";
pub const TYPE_STCO: BoxType = *b"stco";
pub const TYPE_CO64: BoxType = *b"co64";
pub const TYPE_STSS: BoxType = *b"stss";
pub const TYPE_SDTP: BoxType = *b"sdtp";
pub const TYPE_SBGP: BoxType = *b"sbgp";
pub const TYPE_SGPD: BoxType = *b"sgpd";
pub const TYPE_SAIZ: BoxType = *b"saiz";
pub const TYPE_SAIO: BoxType = *b"saio";
pub const TYPE_MVEX: BoxType = *b"mvex";
pub const TYPE_MEHD: BoxType = *b"mehd";
pub const TYPE_TREX: BoxType = *b"trex";
pub const TYPE_MOOF: BoxType = *b"moof";
pub const TYPE_MFHD: BoxType = *b"mfhd";
pub const TYPE_TRAF: BoxType = *b"traf";
pub const TYPE_TFHD: BoxType = *b"tfhd";
pub const TYPE_TFDT: BoxType = *b"tfdt";
pub const TYPE_TRUN: BoxType = *b"trun";
pub const TYPE_SIDX: BoxType = *b"sidx";
pub const TYPE_EMSG: BoxType = *b"emsg";
pub const TYPE_META: BoxType = *b"meta";
pub const TYPE_UDTA: BoxType = *b"udta";
pub const TYPE_MDAT: BoxType = *b"mdat";
pub const TYPE_FREE: BoxType = *b"free";
pub const TYPE_SKIP: BoxType = *b"skip";
pub const TYPE_AVC1: BoxType = *b"avc1";
pub const TYPE_AVCC: BoxType = *b"avcC";
pub const TYPE_BTRT: BoxType = *b"btrt";
pub const TYPE_PASP: BoxType = *b"pasp";
pub const TYPE_MP4A: BoxType = *b"mp4a";
pub const TYPE_ESDS: BoxType = *b"esds";

// ASCII form of a box type for diagnostics.
#[must_use]
pub fn type_str(t: BoxType) -> String {
    String::from_utf8_lossy(&t).into_owned()
}

// Returns true if the box type has version and flags fields.
#[must_use]
pub fn is_full_box(t: BoxType) -> bool {
    matches!(
        &t,
        b"mvhd"
            | b"tkhd"
            | b"mdhd"
            | b"hdlr"
            | b"vmhd"
            | b"smhd"
            | b"dref"
            | b"stsd"
            | b"stts"
            | b"ctts"
            | b"stsc"
            | b"stsz"
            | b"stco"
            | b"co64"
            | b"stss"
            | b"elst"
            | b"meta"
            | b"esds"
            | b"mehd"
            | b"trex"
            | b"mfhd"
            | b"tfhd"
            | b"tfdt"
            | b"trun"
            | b"sbgp"
            | b"sgpd"
            | b"saiz"
            | b"saio"
            | b"cslg"
            | b"sdtp"
            | b"sidx"
            | b"emsg"
    )
}

// Returns true if the box type is a container that holds child boxes.
#[must_use]
pub fn is_container_box(t: BoxType) -> bool {
    matches!(
        &t,
        b"moov"
            | b"trak"
            | b"edts"
            | b"mdia"
            | b"minf"
            | b"dinf"
            | b"stbl"
            | b"udta"
            | b"meta"
            | b"mvex"
            | b"moof"
            | b"traf"
            | b"tref"
            | b"trgr"
    )
}

pub(crate) fn be_u16(buf: &[u8], pos: usize) -> u16 {
    u16::from_be_bytes([buf[pos], buf[pos + 1]])
}

pub(crate) fn be_u32(buf: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes(
        buf[pos..pos + 4]
            .try_into()
            .expect("slice length matches array"),
    )
}

pub(crate) fn be_u64(buf: &[u8], pos: usize) -> u64 {
    u64::from_be_bytes(
        buf[pos..pos + 8]
            .try_into()
            .expect("slice length matches array"),
    )
}
