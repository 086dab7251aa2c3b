use crate::{
    Audio, AvcC, BoxBody, Co64, Ctts, Elst, Esds, Ftyp, Hdlr, Mdhd, Mehd, Mfhd, Mp4Box, Mvhd,
    Stco, Stsc, Stsd, Stss, Stsz, Stts, Tfdt, Tfhd, Tkhd, Trex, Trun, Visual,
};
use bmff::{
    is_container_box, is_full_box, parse_hdlr_name, parse_mdhd, parse_mvhd, parse_tkhd,
    read_audio_sample_entry, read_avcc_codec, read_esds_codec, read_ftyp,
    read_visual_sample_entry, type_str, BoxType, Co64Iter, CttsIter, ElstIter, StscIter, SttsIter,
    StszIter, TrunIter, U32Iter, TYPE_AVC1, TYPE_MP4A,
};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("truncated box header at offset {0}")]
    TruncatedHeader(usize),

    #[error("invalid box size {size} at offset {offset}")]
    InvalidSize { size: u64, offset: usize },

    #[error("box at offset {offset} extends past parent end {end}")]
    PastEnd { offset: usize, end: usize },
}

// Decodes a single box starting at `start`. Container boxes are
// decoded recursively until the parent's end; unknown types are kept
// as raw payloads.
pub fn decode(buf: &[u8], start: usize, end: usize) -> Result<Mp4Box, DecodeError> {
    let end = end.min(buf.len());
    let (box_type, size, version, flags, data_start, box_end) = decode_header(buf, start, end)?;

    let mut node = Mp4Box {
        box_type,
        size,
        version,
        flags,
        has_full_box: is_full_box(box_type),
        ..Mp4Box::default()
    };

    if is_container_box(box_type) {
        let mut p = data_start;
        while p < box_end {
            let child = decode(buf, p, box_end)?;
            // Header validation guarantees forward progress.
            p += usize::try_from(child.size).expect("child size within parent");
            node.push_child(child);
        }
    } else {
        node.body = decode_body(buf, box_type, version, flags, data_start, box_end)?;
    }

    Ok(node)
}

// Parses a box header and validates it against the parent boundary.
// Returns (type, size, version, flags, data_start, box_end).
fn decode_header(
    buf: &[u8],
    start: usize,
    end: usize,
) -> Result<(BoxType, u64, u8, u32, usize, usize), DecodeError> {
    use DecodeError::*;

    if start + 8 > end {
        return Err(TruncatedHeader(start));
    }
    let mut size = u64::from(be_u32(buf, start));
    let mut box_type: BoxType = [0; 4];
    box_type.copy_from_slice(&buf[start + 4..start + 8]);
    let mut ptr = start + 8;

    if size == 1 {
        if start + 16 > end {
            return Err(TruncatedHeader(start));
        }
        size = be_u64(buf, ptr);
        ptr += 8;
    }
    if size == 0 {
        size = u64::try_from(end - start).expect("range fits in u64");
    }

    if size < u64::try_from(ptr - start).expect("header size fits in u64") {
        return Err(InvalidSize { size, offset: start });
    }
    let box_end = usize::try_from(size)
        .ok()
        .and_then(|s| start.checked_add(s))
        .ok_or(InvalidSize { size, offset: start })?;
    if box_end > end {
        return Err(PastEnd { offset: start, end });
    }

    let (version, flags) = if is_full_box(box_type) {
        if box_end - ptr < 4 {
            return Err(TruncatedHeader(start));
        }
        let vf = be_u32(buf, ptr);
        ptr += 4;
        #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
        ((vf >> 24) as u8, vf & 0x00ff_ffff)
    } else {
        (0, 0)
    };

    Ok((box_type, size, version, flags, ptr, box_end))
}

#[allow(clippy::too_many_lines)]
fn decode_body(
    buf: &[u8],
    box_type: BoxType,
    version: u8,
    flags: u32,
    data_start: usize,
    box_end: usize,
) -> Result<BoxBody, DecodeError> {
    let data = &buf[data_start..box_end];

    let body = match &box_type {
        b"ftyp" | b"styp" => read_ftyp(data).map(|f| {
            BoxBody::Ftyp(Ftyp {
                major_brand: f.major_brand,
                minor_version: f.minor_version,
                compatible_brands: f.compatible_brands,
            })
        }),
        b"mvhd" => parse_mvhd(data, version).map(|m| {
            BoxBody::Mvhd(Mvhd {
                timescale: m.timescale,
                duration: m.duration,
                next_track_id: m.next_track_id,
            })
        }),
        b"tkhd" => parse_tkhd(data, version).map(|t| {
            BoxBody::Tkhd(Tkhd {
                track_id: t.track_id,
                duration: t.duration,
                width: t.width,
                height: t.height,
            })
        }),
        b"mdhd" => parse_mdhd(data, version).map(|m| {
            BoxBody::Mdhd(Mdhd {
                timescale: m.timescale,
                duration: m.duration,
                language: m.language,
            })
        }),
        b"hdlr" => data.get(4..8).map(|t| {
            BoxBody::Hdlr(Hdlr {
                handler_type: t.try_into().expect("slice length is 4"),
                name: parse_hdlr_name(data).to_owned(),
            })
        }),
        b"stsd" => Some(decode_stsd(buf, data_start, box_end)?),
        b"avcC" => Some(BoxBody::AvcC(AvcC {
            mime_codec: read_avcc_codec(data),
            buffer: data.to_vec(),
        })),
        b"esds" => Some(BoxBody::Esds(Esds {
            mime_codec: read_esds_codec(data),
            buffer: data.to_vec(),
        })),
        b"stts" => Some(BoxBody::Stts(Stts {
            entries: SttsIter::new(data).collect(),
        })),
        b"ctts" => Some(BoxBody::Ctts(Ctts {
            entries: CttsIter::new(data).collect(),
        })),
        b"stsc" => Some(BoxBody::Stsc(Stsc {
            entries: StscIter::new(data).collect(),
        })),
        b"stsz" => {
            let it = StszIter::new(data);
            let sample_size = it.default_sample_size();
            let sample_count = StszIter::count(&it);
            Some(BoxBody::Stsz(Stsz {
                sample_size,
                sample_count,
                entry_sizes: if sample_size == 0 {
                    it.collect()
                } else {
                    Vec::new()
                },
            }))
        }
        b"stco" => Some(BoxBody::Stco(Stco {
            chunk_offsets: U32Iter::new(data).collect(),
        })),
        b"co64" => Some(BoxBody::Co64(Co64 {
            chunk_offsets: Co64Iter::new(data).collect(),
        })),
        b"stss" => Some(BoxBody::Stss(Stss {
            sample_numbers: U32Iter::new(data).collect(),
        })),
        b"elst" => Some(BoxBody::Elst(Elst {
            entries: ElstIter::new(data, version).collect(),
        })),
        b"mehd" => {
            let duration = if version == 1 {
                data.get(..8).map(|_| be_u64(data, 0))
            } else {
                data.get(..4).map(|_| u64::from(be_u32(data, 0)))
            };
            duration.map(|fragment_duration| BoxBody::Mehd(Mehd { fragment_duration }))
        }
        b"trex" => data.get(..20).map(|_| {
            BoxBody::Trex(Trex {
                track_id: be_u32(data, 0),
                default_sample_description_index: be_u32(data, 4),
                default_sample_duration: be_u32(data, 8),
                default_sample_size: be_u32(data, 12),
                default_sample_flags: be_u32(data, 16),
            })
        }),
        b"mfhd" => data.get(..4).map(|_| {
            BoxBody::Mfhd(Mfhd {
                sequence_number: be_u32(data, 0),
            })
        }),
        b"tfhd" => data.get(..4).map(|_| {
            BoxBody::Tfhd(Tfhd {
                track_id: be_u32(data, 0),
            })
        }),
        b"tfdt" => {
            let time = if version == 1 {
                data.get(..8).map(|_| be_u64(data, 0))
            } else {
                data.get(..4).map(|_| u64::from(be_u32(data, 0)))
            };
            time.map(|base_media_decode_time| BoxBody::Tfdt(Tfdt {
                base_media_decode_time,
            }))
        }
        b"trun" => {
            let mut it = TrunIter::new(data, flags);
            let data_offset = it.data_offset();
            let first_sample_flags = it.first_sample_flags();
            Some(BoxBody::Trun(Trun {
                data_offset,
                first_sample_flags,
                entries: it.by_ref().collect(),
            }))
        }
        _ => {
            debug!("keeping unrecognised box {} as raw payload", type_str(box_type));
            None
        }
    };

    // Anything the typed parsers reject is preserved verbatim.
    Ok(body.unwrap_or_else(|| BoxBody::Raw(data.to_vec())))
}

// stsd is decoded in two passes: the entry-count word is skipped, then
// each sample entry is decoded as a leaf box carrying the visual or
// audio header and its nested children.
fn decode_stsd(buf: &[u8], data_start: usize, box_end: usize) -> Result<BoxBody, DecodeError> {
    let mut entries = Vec::new();
    let mut p = data_start + 4;
    if p > box_end {
        return Ok(BoxBody::Stsd(Stsd { entries }));
    }
    while p < box_end {
        let entry = decode_sample_entry(buf, p, box_end)?;
        p += usize::try_from(entry.size).expect("entry size within parent");
        entries.push(entry);
    }
    Ok(BoxBody::Stsd(Stsd { entries }))
}

fn decode_sample_entry(buf: &[u8], start: usize, end: usize) -> Result<Mp4Box, DecodeError> {
    let (box_type, size, version, flags, data_start, box_end) = decode_header(buf, start, end)?;
    let data = &buf[data_start..box_end];

    let body = match &box_type {
        t if *t == TYPE_AVC1 => read_visual_sample_entry(data).map(|v| {
            Ok::<_, DecodeError>(BoxBody::Visual(Visual {
                data_reference_index: v.data_reference_index,
                width: v.width,
                height: v.height,
                horiz_resolution: v.horiz_resolution,
                vert_resolution: v.vert_resolution,
                frame_count: v.frame_count,
                compressor_name: v.compressor_name,
                depth: v.depth,
                children: decode_children(buf, data_start + v.child_offset, box_end)?,
            }))
        }),
        t if *t == TYPE_MP4A => read_audio_sample_entry(data).map(|a| {
            Ok::<_, DecodeError>(BoxBody::Audio(Audio {
                data_reference_index: a.data_reference_index,
                channel_count: a.channel_count,
                sample_size: a.sample_size,
                sample_rate: a.sample_rate,
                children: decode_children(buf, data_start + a.child_offset, box_end)?,
            }))
        }),
        _ => None,
    };
    let body = match body {
        Some(b) => b?,
        None => BoxBody::Raw(data.to_vec()),
    };

    Ok(Mp4Box {
        box_type,
        size,
        version,
        flags,
        has_full_box: is_full_box(box_type),
        body,
        ..Mp4Box::default()
    })
}

fn decode_children(buf: &[u8], mut p: usize, end: usize) -> Result<Vec<Mp4Box>, DecodeError> {
    let mut children = Vec::new();
    while p < end {
        let child = decode(buf, p, end)?;
        p += usize::try_from(child.size).expect("child size within parent");
        children.push(child);
    }
    Ok(children)
}

fn be_u32(buf: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes(
        buf[pos..pos + 4]
            .try_into()
            .expect("slice length matches array"),
    )
}

fn be_u64(buf: &[u8], pos: usize) -> u64 {
    u64::from_be_bytes(
        buf[pos..pos + 8]
            .try_into()
            .expect("slice length matches array"),
    )
}
