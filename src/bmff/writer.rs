use crate::{
    iter::{CttsEntry, ElstEntry, SidxEntry, StscEntry, SttsEntry, TrunEntry},
    reader::MAX_DEPTH,
    BoxType, TYPE_CO64, TYPE_CTTS, TYPE_DREF, TYPE_ELST, TYPE_FTYP, TYPE_HDLR, TYPE_MDHD,
    TYPE_MEHD, TYPE_MFHD, TYPE_MVHD, TYPE_SIDX, TYPE_SMHD, TYPE_STCO, TYPE_STSC, TYPE_STSS,
    TYPE_STSZ, TYPE_STTS, TYPE_STYP, TYPE_TFDT, TYPE_TFHD, TYPE_TKHD, TYPE_TREX, TYPE_TRUN,
    TYPE_URL, TYPE_VMHD,
};
use crate::{
    TRUN_DATA_OFFSET_PRESENT, TRUN_FIRST_SAMPLE_FLAGS_PRESENT,
    TRUN_SAMPLE_COMPOSITION_TIME_OFFSET_PRESENT, TRUN_SAMPLE_DURATION_PRESENT,
    TRUN_SAMPLE_FLAGS_PRESENT, TRUN_SAMPLE_SIZE_PRESENT,
};

// Builder for boxes with automatic size backpatching.
//
// `start_box` reserves a size placeholder and `end_box` patches in the
// final size. The typed `write_*` methods emit complete boxes and pick
// version 1 automatically whenever a widened field would overflow its
// 32-bit form.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
    // Start offsets of open boxes, for size backpatching.
    stack: [usize; MAX_DEPTH],
    depth: usize,
}

impl Writer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    // The written data.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // Number of bytes written.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    // Clears the buffer for reuse, keeping its capacity.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.depth = 0;
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_zeros(&mut self, n: usize) {
        self.buf.resize(self.buf.len() + n, 0);
    }

    pub fn put_bytes(&mut self, p: &[u8]) {
        self.buf.extend_from_slice(p);
    }

    // Writes a fixed-length string field with NUL padding.
    pub fn put_fixed_str(&mut self, s: &str, length: usize) {
        let n = s.len().min(length);
        self.buf.extend_from_slice(&s.as_bytes()[..n]);
        self.put_zeros(length - n);
    }

    // Begins a new box. Write content, then call `end_box`.
    pub fn start_box(&mut self, t: BoxType) {
        self.stack[self.depth] = self.buf.len();
        self.depth += 1;
        self.put_u32(0); // placeholder size
        self.put_bytes(&t);
    }

    // Begins a new full box with version and flags.
    pub fn start_full_box(&mut self, t: BoxType, version: u8, flags: u32) {
        self.start_box(t);
        let vf = (u32::from(version) << 24) | (flags & 0x00ff_ffff);
        self.put_u32(vf);
    }

    // Finishes the current box by backpatching its size.
    pub fn end_box(&mut self) {
        self.depth -= 1;
        let offset = self.stack[self.depth];
        let size = u32::try_from(self.buf.len() - offset).expect("box fits in u32");
        self.buf[offset..offset + 4].copy_from_slice(&size.to_be_bytes());
    }

    pub fn write_ftyp(&mut self, brand: [u8; 4], brand_version: u32, compat: &[[u8; 4]]) {
        self.write_brand_box(TYPE_FTYP, brand, brand_version, compat);
    }

    // Segment type box, same wire layout as ftyp.
    pub fn write_styp(&mut self, brand: [u8; 4], brand_version: u32, compat: &[[u8; 4]]) {
        self.write_brand_box(TYPE_STYP, brand, brand_version, compat);
    }

    fn write_brand_box(
        &mut self,
        t: BoxType,
        brand: [u8; 4],
        brand_version: u32,
        compat: &[[u8; 4]],
    ) {
        self.start_box(t);
        self.put_bytes(&brand);
        self.put_u32(brand_version);
        for c in compat {
            self.put_bytes(c);
        }
        self.end_box();
    }

    pub fn write_mvhd(&mut self, timescale: u32, duration: u64, next_track_id: u32) {
        if let Ok(duration32) = u32::try_from(duration) {
            self.start_full_box(TYPE_MVHD, 0, 0);
            self.put_u32(0); // creation time
            self.put_u32(0); // modification time
            self.put_u32(timescale);
            self.put_u32(duration32);
        } else {
            self.start_full_box(TYPE_MVHD, 1, 0);
            self.put_u64(0); // creation time
            self.put_u64(0); // modification time
            self.put_u32(timescale);
            self.put_u64(duration);
        }
        self.put_u32(0x0001_0000); // rate 1.0
        self.put_u16(0x0100); // volume 1.0
        self.put_zeros(10); // reserved
        self.put_identity_matrix();
        self.put_zeros(24); // predefined
        self.put_u32(next_track_id);
        self.end_box();
    }

    pub fn write_tkhd(&mut self, flags: u32, track_id: u32, duration: u64, width: u32, height: u32) {
        if let Ok(duration32) = u32::try_from(duration) {
            self.start_full_box(TYPE_TKHD, 0, flags);
            self.put_u32(0); // creation time
            self.put_u32(0); // modification time
            self.put_u32(track_id);
            self.put_u32(0); // reserved
            self.put_u32(duration32);
        } else {
            self.start_full_box(TYPE_TKHD, 1, flags);
            self.put_u64(0); // creation time
            self.put_u64(0); // modification time
            self.put_u32(track_id);
            self.put_u32(0); // reserved
            self.put_u64(duration);
        }
        self.put_zeros(8); // reserved
        self.put_u16(0); // layer
        self.put_u16(0); // alternate group
        self.put_u16(0); // volume
        self.put_u16(0); // reserved
        self.put_identity_matrix();
        self.put_u32(width); // 16.16
        self.put_u32(height); // 16.16
        self.end_box();
    }

    pub fn write_mdhd(&mut self, timescale: u32, duration: u64, language: u16) {
        if let Ok(duration32) = u32::try_from(duration) {
            self.start_full_box(TYPE_MDHD, 0, 0);
            self.put_u32(0); // creation time
            self.put_u32(0); // modification time
            self.put_u32(timescale);
            self.put_u32(duration32);
        } else {
            self.start_full_box(TYPE_MDHD, 1, 0);
            self.put_u64(0); // creation time
            self.put_u64(0); // modification time
            self.put_u32(timescale);
            self.put_u64(duration);
        }
        self.put_u16(language);
        self.put_u16(0); // quality
        self.end_box();
    }

    pub fn write_hdlr(&mut self, handler_type: [u8; 4], name: &str) {
        self.start_full_box(TYPE_HDLR, 0, 0);
        self.put_u32(0); // predefined
        self.put_bytes(&handler_type);
        self.put_zeros(12); // reserved
        self.put_bytes(name.as_bytes());
        self.put_u8(0); // NUL terminator
        self.end_box();
    }

    pub fn write_vmhd(&mut self) {
        self.start_full_box(TYPE_VMHD, 0, 1);
        self.put_u16(0); // graphicsmode
        self.put_zeros(6); // opcolor
        self.end_box();
    }

    pub fn write_smhd(&mut self) {
        self.start_full_box(TYPE_SMHD, 0, 0);
        self.put_u16(0); // balance
        self.put_u16(0); // reserved
        self.end_box();
    }

    // dref box with a single self-referencing url entry.
    pub fn write_dref(&mut self) {
        self.start_full_box(TYPE_DREF, 0, 0);
        self.put_u32(1); // entry count
        self.start_full_box(TYPE_URL, 0, 1); // self-contained
        self.end_box();
        self.end_box();
    }

    pub fn write_stsz(&mut self, sample_size: u32, sample_count: u32, entries: &[u32]) {
        self.start_full_box(TYPE_STSZ, 0, 0);
        self.put_u32(sample_size);
        self.put_u32(sample_count);
        if sample_size == 0 {
            for &e in entries {
                self.put_u32(e);
            }
        }
        self.end_box();
    }

    pub fn write_stco(&mut self, entries: &[u32]) {
        self.write_u32_table(TYPE_STCO, entries);
    }

    pub fn write_stss(&mut self, entries: &[u32]) {
        self.write_u32_table(TYPE_STSS, entries);
    }

    fn write_u32_table(&mut self, t: BoxType, entries: &[u32]) {
        self.start_full_box(t, 0, 0);
        self.put_u32(u32::try_from(entries.len()).expect("entry count fits in u32"));
        for &e in entries {
            self.put_u32(e);
        }
        self.end_box();
    }

    pub fn write_co64(&mut self, entries: &[u64]) {
        self.start_full_box(TYPE_CO64, 0, 0);
        self.put_u32(u32::try_from(entries.len()).expect("entry count fits in u32"));
        for &e in entries {
            self.put_u64(e);
        }
        self.end_box();
    }

    pub fn write_stts(&mut self, entries: &[SttsEntry]) {
        self.start_full_box(TYPE_STTS, 0, 0);
        self.put_u32(u32::try_from(entries.len()).expect("entry count fits in u32"));
        for e in entries {
            self.put_u32(e.sample_count);
            self.put_u32(e.sample_delta);
        }
        self.end_box();
    }

    pub fn write_ctts(&mut self, entries: &[CttsEntry]) {
        self.start_full_box(TYPE_CTTS, 0, 0);
        self.put_u32(u32::try_from(entries.len()).expect("entry count fits in u32"));
        for e in entries {
            self.put_u32(e.sample_count);
            self.put_i32(e.sample_offset);
        }
        self.end_box();
    }

    pub fn write_stsc(&mut self, entries: &[StscEntry]) {
        self.start_full_box(TYPE_STSC, 0, 0);
        self.put_u32(u32::try_from(entries.len()).expect("entry count fits in u32"));
        for e in entries {
            self.put_u32(e.first_chunk);
            self.put_u32(e.samples_per_chunk);
            self.put_u32(e.sample_description_id);
        }
        self.end_box();
    }

    pub fn write_elst(&mut self, entries: &[ElstEntry]) {
        let v1 = entries.iter().any(|e| {
            u32::try_from(e.segment_duration).is_err() || i32::try_from(e.media_time).is_err()
        });
        self.start_full_box(TYPE_ELST, u8::from(v1), 0);
        self.put_u32(u32::try_from(entries.len()).expect("entry count fits in u32"));
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::as_conversions
        )]
        for e in entries {
            if v1 {
                self.put_u64(e.segment_duration);
                self.put_u64(e.media_time as u64);
            } else {
                self.put_u32(e.segment_duration as u32);
                self.put_i32(e.media_time as i32);
            }
            self.put_u16(e.media_rate_int as u16);
            self.put_u16(e.media_rate_frac as u16);
        }
        self.end_box();
    }

    pub fn write_mehd(&mut self, fragment_duration: u64) {
        if let Ok(duration32) = u32::try_from(fragment_duration) {
            self.start_full_box(TYPE_MEHD, 0, 0);
            self.put_u32(duration32);
        } else {
            self.start_full_box(TYPE_MEHD, 1, 0);
            self.put_u64(fragment_duration);
        }
        self.end_box();
    }

    pub fn write_trex(
        &mut self,
        track_id: u32,
        desc_idx: u32,
        def_duration: u32,
        def_size: u32,
        def_flags: u32,
    ) {
        self.start_full_box(TYPE_TREX, 0, 0);
        self.put_u32(track_id);
        self.put_u32(desc_idx);
        self.put_u32(def_duration);
        self.put_u32(def_size);
        self.put_u32(def_flags);
        self.end_box();
    }

    pub fn write_mfhd(&mut self, sequence_number: u32) {
        self.start_full_box(TYPE_MFHD, 0, 0);
        self.put_u32(sequence_number);
        self.end_box();
    }

    pub fn write_tfhd(&mut self, flags: u32, track_id: u32) {
        self.start_full_box(TYPE_TFHD, 0, flags);
        self.put_u32(track_id);
        self.end_box();
    }

    pub fn write_tfdt(&mut self, base_media_decode_time: u64) {
        if let Ok(time32) = u32::try_from(base_media_decode_time) {
            self.start_full_box(TYPE_TFDT, 0, 0);
            self.put_u32(time32);
        } else {
            self.start_full_box(TYPE_TFDT, 1, 0);
            self.put_u64(base_media_decode_time);
        }
        self.end_box();
    }

    pub fn write_trun(
        &mut self,
        version: u8,
        flags: u32,
        data_offset: i32,
        first_sample_flags: u32,
        entries: &[TrunEntry],
    ) {
        self.start_full_box(TYPE_TRUN, version, flags);
        self.put_u32(u32::try_from(entries.len()).expect("entry count fits in u32"));
        if flags & TRUN_DATA_OFFSET_PRESENT != 0 {
            self.put_i32(data_offset);
        }
        if flags & TRUN_FIRST_SAMPLE_FLAGS_PRESENT != 0 {
            self.put_u32(first_sample_flags);
        }
        for e in entries {
            if flags & TRUN_SAMPLE_DURATION_PRESENT != 0 {
                self.put_u32(e.sample_duration);
            }
            if flags & TRUN_SAMPLE_SIZE_PRESENT != 0 {
                self.put_u32(e.sample_size);
            }
            if flags & TRUN_SAMPLE_FLAGS_PRESENT != 0 {
                self.put_u32(e.sample_flags);
            }
            if flags & TRUN_SAMPLE_COMPOSITION_TIME_OFFSET_PRESENT != 0 {
                self.put_i32(e.sample_composition_time_offset);
            }
        }
        self.end_box();
    }

    // Writes the 78-byte visual sample entry header. The caller must
    // start the box (e.g. avc1) and end it after writing children.
    pub fn write_visual_sample_entry(
        &mut self,
        data_ref_idx: u16,
        width: u16,
        height: u16,
        frame_count: u16,
        depth: u16,
        compressor: &str,
    ) {
        self.put_zeros(6); // reserved
        self.put_u16(data_ref_idx);
        self.put_zeros(16); // predefined + reserved
        self.put_u16(width);
        self.put_u16(height);
        self.put_u32(0x0048_0000); // hresolution 72 dpi
        self.put_u32(0x0048_0000); // vresolution 72 dpi
        self.put_zeros(4); // reserved
        self.put_u16(frame_count);
        let name_len = compressor.len().min(31);
        self.put_u8(u8::try_from(name_len).expect("name_len <= 31"));
        self.put_fixed_str(compressor, 31);
        self.put_u16(depth);
        self.put_u16(0xffff); // predefined = -1
    }

    // Writes the 28-byte audio sample entry header. The caller must
    // start the box (e.g. mp4a) and end it after writing children.
    pub fn write_audio_sample_entry(
        &mut self,
        data_ref_idx: u16,
        channel_count: u16,
        sample_size: u16,
        sample_rate: u32,
    ) {
        self.put_zeros(6); // reserved
        self.put_u16(data_ref_idx);
        self.put_zeros(8); // reserved
        self.put_u16(channel_count);
        self.put_u16(sample_size);
        self.put_zeros(4); // predefined + reserved
        self.put_u32(sample_rate); // 16.16
    }

    // Segment index box, version 1 with 64-bit times.
    pub fn write_sidx(
        &mut self,
        reference_id: u32,
        timescale: u32,
        earliest_pts: u64,
        first_offset: u64,
        entries: &[SidxEntry],
    ) {
        self.start_full_box(TYPE_SIDX, 1, 0);
        self.put_u32(reference_id);
        self.put_u32(timescale);
        self.put_u64(earliest_pts);
        self.put_u64(first_offset);
        self.put_u16(0); // reserved
        self.put_u16(u16::try_from(entries.len()).expect("reference count fits in u16"));
        for e in entries {
            let mut ref_type_and_size = e.referenced_size & 0x7fff_ffff;
            if e.reference_type {
                ref_type_and_size |= 0x8000_0000;
            }
            self.put_u32(ref_type_and_size);
            self.put_u32(e.subseg_duration);
            let mut sap = u32::from(e.sap_type) << 28;
            if e.starts_with_sap {
                sap |= 0x8000_0000;
            }
            self.put_u32(sap);
        }
        self.end_box();
    }

    fn put_identity_matrix(&mut self) {
        self.put_u32(0x0001_0000);
        self.put_zeros(12);
        self.put_u32(0x0001_0000);
        self.put_zeros(12);
        self.put_u32(0x4000_0000);
    }
}
