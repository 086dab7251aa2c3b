use crate::{be_u16, be_u32, be_u64};

// Single-pass cursors over the packed table payloads. Each cursor
// borrows the raw box data (after the version/flags word) and stops at
// the truncation boundary if the payload is shorter than its declared
// count.

// Cursor over sample sizes in an stsz box. When the box carries a
// non-zero default size the table is virtual and every sample yields
// that size.
pub struct StszIter<'a> {
    buf: &'a [u8],
    sample_size: u32,
    count: u32,
    index: u32,
}

impl<'a> StszIter<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        if data.len() < 8 {
            return Self {
                buf: &[],
                sample_size: 0,
                count: 0,
                index: 0,
            };
        }
        Self {
            buf: data,
            sample_size: be_u32(data, 0),
            count: be_u32(data, 4),
            index: 0,
        }
    }

    // Total number of samples.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[must_use]
    pub fn default_sample_size(&self) -> u32 {
        self.sample_size
    }
}

impl Iterator for StszIter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.index >= self.count {
            return None;
        }
        let size = if self.sample_size != 0 {
            self.sample_size
        } else {
            let offset = 8 + usize::try_from(self.index).expect("u32 fits usize") * 4;
            if offset + 4 > self.buf.len() {
                return None;
            }
            be_u32(self.buf, offset)
        };
        self.index += 1;
        Some(size)
    }
}

// Cursor over u64 chunk offsets in a co64 box.
pub struct Co64Iter<'a> {
    buf: &'a [u8],
    count: u32,
    index: u32,
}

impl<'a> Co64Iter<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        if data.len() < 4 {
            return Self {
                buf: &[],
                count: 0,
                index: 0,
            };
        }
        Self {
            buf: data,
            count: be_u32(data, 0),
            index: 0,
        }
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }
}

impl Iterator for Co64Iter<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.index >= self.count {
            return None;
        }
        let offset = 4 + usize::try_from(self.index).expect("u32 fits usize") * 8;
        if offset + 8 > self.buf.len() {
            return None;
        }
        self.index += 1;
        Some(be_u64(self.buf, offset))
    }
}

// Time-to-sample entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SttsEntry {
    pub sample_count: u32,
    pub sample_delta: u32,
}

// Cursor over stts entries.
pub struct SttsIter<'a> {
    buf: &'a [u8],
    count: u32,
    index: u32,
}

impl<'a> SttsIter<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        if data.len() < 4 {
            return Self {
                buf: &[],
                count: 0,
                index: 0,
            };
        }
        Self {
            buf: data,
            count: be_u32(data, 0),
            index: 0,
        }
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }
}

impl Iterator for SttsIter<'_> {
    type Item = SttsEntry;

    fn next(&mut self) -> Option<SttsEntry> {
        if self.index >= self.count {
            return None;
        }
        let offset = 4 + usize::try_from(self.index).expect("u32 fits usize") * 8;
        if offset + 8 > self.buf.len() {
            return None;
        }
        self.index += 1;
        Some(SttsEntry {
            sample_count: be_u32(self.buf, offset),
            sample_delta: be_u32(self.buf, offset + 4),
        })
    }
}

// Composition offset entry. The offset is surfaced as signed in both
// box versions: the standard says v0 offsets are unsigned, but many
// producers emit logically-signed values there, so the 32-bit pattern
// is reinterpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CttsEntry {
    pub sample_count: u32,
    pub sample_offset: i32,
}

// Cursor over ctts entries.
pub struct CttsIter<'a> {
    buf: &'a [u8],
    count: u32,
    index: u32,
}

impl<'a> CttsIter<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        if data.len() < 4 {
            return Self {
                buf: &[],
                count: 0,
                index: 0,
            };
        }
        Self {
            buf: data,
            count: be_u32(data, 0),
            index: 0,
        }
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }
}

impl Iterator for CttsIter<'_> {
    type Item = CttsEntry;

    fn next(&mut self) -> Option<CttsEntry> {
        if self.index >= self.count {
            return None;
        }
        let offset = 4 + usize::try_from(self.index).expect("u32 fits usize") * 8;
        if offset + 8 > self.buf.len() {
            return None;
        }
        self.index += 1;
        #[allow(clippy::cast_possible_wrap, clippy::as_conversions)]
        Some(CttsEntry {
            sample_count: be_u32(self.buf, offset),
            sample_offset: be_u32(self.buf, offset + 4) as i32,
        })
    }
}

// Sample-to-chunk entry. Chunk numbering is 1-based.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StscEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_id: u32,
}

// Cursor over stsc entries.
pub struct StscIter<'a> {
    buf: &'a [u8],
    count: u32,
    index: u32,
}

impl<'a> StscIter<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        if data.len() < 4 {
            return Self {
                buf: &[],
                count: 0,
                index: 0,
            };
        }
        Self {
            buf: data,
            count: be_u32(data, 0),
            index: 0,
        }
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }
}

impl Iterator for StscIter<'_> {
    type Item = StscEntry;

    fn next(&mut self) -> Option<StscEntry> {
        if self.index >= self.count {
            return None;
        }
        let offset = 4 + usize::try_from(self.index).expect("u32 fits usize") * 12;
        if offset + 12 > self.buf.len() {
            return None;
        }
        self.index += 1;
        Some(StscEntry {
            first_chunk: be_u32(self.buf, offset),
            samples_per_chunk: be_u32(self.buf, offset + 4),
            sample_description_id: be_u32(self.buf, offset + 8),
        })
    }
}

// Edit list entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ElstEntry {
    pub segment_duration: u64,
    pub media_time: i64,
    pub media_rate_int: i16,
    pub media_rate_frac: i16,
}

// Cursor over elst entries. The version decides the field widths.
pub struct ElstIter<'a> {
    buf: &'a [u8],
    count: u32,
    index: u32,
    version: u8,
}

impl<'a> ElstIter<'a> {
    #[must_use]
    pub fn new(data: &'a [u8], version: u8) -> Self {
        if data.len() < 4 {
            return Self {
                buf: &[],
                count: 0,
                index: 0,
                version,
            };
        }
        Self {
            buf: data,
            count: be_u32(data, 0),
            index: 0,
            version,
        }
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }
}

impl Iterator for ElstIter<'_> {
    type Item = ElstEntry;

    #[allow(
        clippy::cast_possible_wrap,
        clippy::cast_possible_truncation,
        clippy::as_conversions
    )]
    fn next(&mut self) -> Option<ElstEntry> {
        if self.index >= self.count {
            return None;
        }
        let index = usize::try_from(self.index).expect("u32 fits usize");
        let e = if self.version == 1 {
            let offset = 4 + index * 20;
            if offset + 20 > self.buf.len() {
                return None;
            }
            ElstEntry {
                segment_duration: be_u64(self.buf, offset),
                media_time: be_u64(self.buf, offset + 8) as i64,
                media_rate_int: be_u16(self.buf, offset + 16) as i16,
                media_rate_frac: be_u16(self.buf, offset + 18) as i16,
            }
        } else {
            let offset = 4 + index * 12;
            if offset + 12 > self.buf.len() {
                return None;
            }
            ElstEntry {
                segment_duration: u64::from(be_u32(self.buf, offset)),
                media_time: i64::from(be_u32(self.buf, offset + 4) as i32),
                media_rate_int: be_u16(self.buf, offset + 8) as i16,
                media_rate_frac: be_u16(self.buf, offset + 10) as i16,
            }
        };
        self.index += 1;
        Some(e)
    }
}

// Track run sample entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrunEntry {
    pub sample_duration: u32,
    pub sample_size: u32,
    pub sample_flags: u32,
    pub sample_composition_time_offset: i32,
}

// Trun flags.
pub const TRUN_DATA_OFFSET_PRESENT: u32 = 0x00_0001;
pub const TRUN_FIRST_SAMPLE_FLAGS_PRESENT: u32 = 0x00_0004;
pub const TRUN_SAMPLE_DURATION_PRESENT: u32 = 0x00_0100;
pub const TRUN_SAMPLE_SIZE_PRESENT: u32 = 0x00_0200;
pub const TRUN_SAMPLE_FLAGS_PRESENT: u32 = 0x00_0400;
pub const TRUN_SAMPLE_COMPOSITION_TIME_OFFSET_PRESENT: u32 = 0x00_0800;

// Tfhd flags.
pub const TFHD_BASE_DATA_OFFSET_PRESENT: u32 = 0x00_0001;
pub const TFHD_SAMPLE_DESCRIPTION_INDEX_PRESENT: u32 = 0x00_0002;
pub const TFHD_DEFAULT_SAMPLE_DURATION_PRESENT: u32 = 0x00_0008;
pub const TFHD_DEFAULT_SAMPLE_SIZE_PRESENT: u32 = 0x00_0010;
pub const TFHD_DEFAULT_SAMPLE_FLAGS_PRESENT: u32 = 0x00_0020;
pub const TFHD_DURATION_IS_EMPTY: u32 = 0x01_0000;
pub const TFHD_DEFAULT_BASE_IS_MOOF: u32 = 0x02_0000;

// Cursor over trun entries. The layout of each entry depends on the
// trun flags mask.
pub struct TrunIter<'a> {
    buf: &'a [u8],
    flags: u32,
    count: u32,
    index: u32,
    data_offset: i32,
    first_sample_flags: u32,
    stride: usize,
    entries_start: usize,
}

impl<'a> TrunIter<'a> {
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::as_conversions)]
    pub fn new(data: &'a [u8], flags: u32) -> Self {
        let empty = Self {
            buf: &[],
            flags: 0,
            count: 0,
            index: 0,
            data_offset: 0,
            first_sample_flags: 0,
            stride: 0,
            entries_start: 0,
        };
        if data.len() < 4 {
            return empty;
        }
        let mut it = Self {
            buf: data,
            flags,
            count: be_u32(data, 0),
            ..empty
        };
        let mut ptr = 4;
        if flags & TRUN_DATA_OFFSET_PRESENT != 0 {
            if ptr + 4 > data.len() {
                return empty;
            }
            it.data_offset = be_u32(data, ptr) as i32;
            ptr += 4;
        }
        if flags & TRUN_FIRST_SAMPLE_FLAGS_PRESENT != 0 {
            if ptr + 4 > data.len() {
                return empty;
            }
            it.first_sample_flags = be_u32(data, ptr);
            ptr += 4;
        }
        it.entries_start = ptr;

        if flags & TRUN_SAMPLE_DURATION_PRESENT != 0 {
            it.stride += 4;
        }
        if flags & TRUN_SAMPLE_SIZE_PRESENT != 0 {
            it.stride += 4;
        }
        if flags & TRUN_SAMPLE_FLAGS_PRESENT != 0 {
            it.stride += 4;
        }
        if flags & TRUN_SAMPLE_COMPOSITION_TIME_OFFSET_PRESENT != 0 {
            it.stride += 4;
        }
        it
    }

    // Total number of samples.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[must_use]
    pub fn data_offset(&self) -> i32 {
        self.data_offset
    }

    // The first sample flags, if present.
    #[must_use]
    pub fn first_sample_flags(&self) -> u32 {
        self.first_sample_flags
    }
}

impl Iterator for TrunIter<'_> {
    type Item = TrunEntry;

    #[allow(clippy::cast_possible_wrap, clippy::as_conversions)]
    fn next(&mut self) -> Option<TrunEntry> {
        if self.index >= self.count {
            return None;
        }
        let offset =
            self.entries_start + usize::try_from(self.index).expect("u32 fits usize") * self.stride;
        if offset + self.stride > self.buf.len() {
            return None;
        }
        let mut e = TrunEntry::default();
        let mut p = offset;
        if self.flags & TRUN_SAMPLE_DURATION_PRESENT != 0 {
            e.sample_duration = be_u32(self.buf, p);
            p += 4;
        }
        if self.flags & TRUN_SAMPLE_SIZE_PRESENT != 0 {
            e.sample_size = be_u32(self.buf, p);
            p += 4;
        }
        if self.flags & TRUN_SAMPLE_FLAGS_PRESENT != 0 {
            e.sample_flags = be_u32(self.buf, p);
            p += 4;
        }
        if self.flags & TRUN_SAMPLE_COMPOSITION_TIME_OFFSET_PRESENT != 0 {
            e.sample_composition_time_offset = be_u32(self.buf, p) as i32;
        }
        self.index += 1;
        Some(e)
    }
}

// Cursor over u32 entries preceded by a count (stco, stss).
pub struct U32Iter<'a> {
    buf: &'a [u8],
    count: u32,
    index: u32,
}

impl<'a> U32Iter<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        if data.len() < 4 {
            return Self {
                buf: &[],
                count: 0,
                index: 0,
            };
        }
        Self {
            buf: data,
            count: be_u32(data, 0),
            index: 0,
        }
    }

    #[must_use]
    pub fn count(&self) -> u32 {
        self.count
    }
}

impl Iterator for U32Iter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.index >= self.count {
            return None;
        }
        let offset = 4 + usize::try_from(self.index).expect("u32 fits usize") * 4;
        if offset + 4 > self.buf.len() {
            return None;
        }
        self.index += 1;
        Some(be_u32(self.buf, offset))
    }
}

// Parsed fields of an ftyp box.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FtypInfo {
    pub major_brand: [u8; 4],
    pub minor_version: u32,
    pub compatible_brands: Vec<[u8; 4]>,
}

#[must_use]
pub fn read_ftyp(data: &[u8]) -> Option<FtypInfo> {
    if data.len() < 8 {
        return None;
    }
    let mut info = FtypInfo {
        minor_version: be_u32(data, 4),
        ..FtypInfo::default()
    };
    info.major_brand.copy_from_slice(&data[0..4]);
    let mut i = 8;
    while i + 4 <= data.len() {
        let mut b = [0; 4];
        b.copy_from_slice(&data[i..i + 4]);
        info.compatible_brands.push(b);
        i += 4;
    }
    Some(info)
}

// Parsed fields of a visual sample entry (e.g. avc1). Child boxes start
// at `child_offset` within the box data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VisualSampleEntry {
    pub data_reference_index: u16,
    pub width: u16,
    pub height: u16,
    // 16.16 fixed point.
    pub horiz_resolution: u32,
    pub vert_resolution: u32,
    pub frame_count: u16,
    pub compressor_name: String,
    pub depth: u16,
    pub child_offset: usize,
}

#[must_use]
pub fn read_visual_sample_entry(data: &[u8]) -> Option<VisualSampleEntry> {
    if data.len() < 78 {
        return None;
    }
    let name_len = usize::from(data[42]).min(31);
    Some(VisualSampleEntry {
        data_reference_index: be_u16(data, 6),
        width: be_u16(data, 24),
        height: be_u16(data, 26),
        horiz_resolution: be_u32(data, 28),
        vert_resolution: be_u32(data, 32),
        frame_count: be_u16(data, 40),
        compressor_name: String::from_utf8_lossy(&data[43..43 + name_len]).into_owned(),
        depth: be_u16(data, 74),
        child_offset: 78,
    })
}

// Parsed fields of an audio sample entry (e.g. mp4a). Child boxes start
// at `child_offset` within the box data.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AudioSampleEntry {
    pub data_reference_index: u16,
    pub channel_count: u16,
    pub sample_size: u16,
    // 16.16 fixed point.
    pub sample_rate: u32,
    pub child_offset: usize,
}

#[must_use]
pub fn read_audio_sample_entry(data: &[u8]) -> Option<AudioSampleEntry> {
    if data.len() < 28 {
        return None;
    }
    Some(AudioSampleEntry {
        data_reference_index: be_u16(data, 6),
        channel_count: be_u16(data, 16),
        sample_size: be_u16(data, 18),
        sample_rate: be_u32(data, 24),
        child_offset: 28,
    })
}

// Extracts the codec profile string from avcC box data: the three bytes
// at offsets 1..4 as lowercase hex, e.g. "64001f" for use in MIME type
// codec parameters.
#[must_use]
pub fn read_avcc_codec(data: &[u8]) -> Option<String> {
    let profile = data.get(1..4)?;
    let mut s = String::with_capacity(6);
    for &b in profile {
        s.push(char::from(hex_digit(b >> 4)));
        s.push(char::from(hex_digit(b)));
    }
    Some(s)
}

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

pub(crate) fn hex_digit(b: u8) -> u8 {
    HEX_CHARS[usize::from(b & 0x0f)]
}

// One reference in a sidx box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SidxEntry {
    // false = media, true = sub-sidx.
    pub reference_type: bool,
    pub referenced_size: u32,
    // In timescale units.
    pub subseg_duration: u32,
    pub starts_with_sap: bool,
    pub sap_type: u8,
}
