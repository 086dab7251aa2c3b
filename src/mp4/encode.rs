use crate::{canonical_children, BoxBody, Mp4Box};
use bmff::Writer;

// Serializes a box tree to its on-disk layout.
//
// Containers with a canonical child order write those children first,
// then the "other" children in their original order. Leaf bodies go
// through the typed writers, which re-derive version fields from the
// values, so a tree assembled in memory serializes the same way a
// decoded one does.
#[must_use]
pub fn encode_to_bytes(b: &Mp4Box) -> Vec<u8> {
    let mut w = Writer::with_capacity(usize::try_from(b.size).unwrap_or(0).max(512));
    encode_box(&mut w, b);
    w.into_bytes()
}

#[allow(clippy::too_many_lines)]
fn encode_box(w: &mut Writer, b: &Mp4Box) {
    match &b.body {
        BoxBody::None => {
            if b.has_full_box {
                w.start_full_box(b.box_type, b.version, b.flags);
            } else {
                w.start_box(b.box_type);
            }
            encode_children(w, b);
            w.end_box();
        }
        BoxBody::Ftyp(f) => {
            if b.box_type == bmff::TYPE_STYP {
                w.write_styp(f.major_brand, f.minor_version, &f.compatible_brands);
            } else {
                w.write_ftyp(f.major_brand, f.minor_version, &f.compatible_brands);
            }
        }
        BoxBody::Mvhd(m) => w.write_mvhd(m.timescale, m.duration, m.next_track_id),
        BoxBody::Tkhd(t) => w.write_tkhd(b.flags, t.track_id, t.duration, t.width, t.height),
        BoxBody::Mdhd(m) => w.write_mdhd(m.timescale, m.duration, m.language),
        BoxBody::Hdlr(h) => w.write_hdlr(h.handler_type, &h.name),
        BoxBody::Stsd(s) => {
            w.start_full_box(b.box_type, b.version, b.flags);
            w.put_u32(u32::try_from(s.entries.len()).expect("entry count fits in u32"));
            for entry in &s.entries {
                encode_box(w, entry);
            }
            w.end_box();
        }
        BoxBody::Visual(v) => {
            w.start_box(b.box_type);
            w.write_visual_sample_entry(
                v.data_reference_index,
                v.width,
                v.height,
                v.frame_count,
                v.depth,
                &v.compressor_name,
            );
            for child in &v.children {
                encode_box(w, child);
            }
            w.end_box();
        }
        BoxBody::Audio(a) => {
            w.start_box(b.box_type);
            w.write_audio_sample_entry(
                a.data_reference_index,
                a.channel_count,
                a.sample_size,
                a.sample_rate,
            );
            for child in &a.children {
                encode_box(w, child);
            }
            w.end_box();
        }
        BoxBody::AvcC(v) => {
            w.start_box(b.box_type);
            w.put_bytes(&v.buffer);
            w.end_box();
        }
        BoxBody::Esds(e) => {
            w.start_full_box(b.box_type, b.version, b.flags);
            w.put_bytes(&e.buffer);
            w.end_box();
        }
        BoxBody::Stts(s) => w.write_stts(&s.entries),
        BoxBody::Ctts(c) => w.write_ctts(&c.entries),
        BoxBody::Stsc(s) => w.write_stsc(&s.entries),
        BoxBody::Stsz(s) => w.write_stsz(s.sample_size, s.sample_count, &s.entry_sizes),
        BoxBody::Stco(s) => w.write_stco(&s.chunk_offsets),
        BoxBody::Co64(c) => w.write_co64(&c.chunk_offsets),
        BoxBody::Stss(s) => w.write_stss(&s.sample_numbers),
        BoxBody::Elst(e) => w.write_elst(&e.entries),
        BoxBody::Mehd(m) => w.write_mehd(m.fragment_duration),
        BoxBody::Trex(t) => w.write_trex(
            t.track_id,
            t.default_sample_description_index,
            t.default_sample_duration,
            t.default_sample_size,
            t.default_sample_flags,
        ),
        BoxBody::Mfhd(m) => w.write_mfhd(m.sequence_number),
        BoxBody::Tfhd(t) => w.write_tfhd(b.flags, t.track_id),
        BoxBody::Tfdt(t) => w.write_tfdt(t.base_media_decode_time),
        BoxBody::Trun(t) => {
            w.write_trun(b.version, b.flags, t.data_offset, t.first_sample_flags, &t.entries);
        }
        BoxBody::Raw(data) => {
            if b.has_full_box {
                w.start_full_box(b.box_type, b.version, b.flags);
            } else {
                w.start_box(b.box_type);
            }
            w.put_bytes(data);
            w.end_box();
        }
    }
}

fn encode_children(w: &mut Writer, b: &Mp4Box) {
    if let Some(order) = canonical_children(b.box_type) {
        for &t in order {
            for child in b.child_list(t) {
                encode_box(w, child);
            }
        }
    }
    for child in b.other_boxes() {
        encode_box(w, child);
    }
}
