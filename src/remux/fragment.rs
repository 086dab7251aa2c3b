// SPDX-License-Identifier: GPL-2.0-or-later

use crate::Track;
use bmff::TrunEntry;
use std::io::Write;

// Minimum fragment duration in seconds when no end time bounds the
// run.
pub(crate) const MIN_FRAGMENT_DURATION_SECS: i64 = 1;

// Fixed sample-flags words: sample-depends-on and the is-sync bit.
const SAMPLE_FLAGS_SYNC: u32 = 0x0200_0000;
const SAMPLE_FLAGS_NON_SYNC: u32 = 0x0101_0000;

// A contiguous range of payload bytes in the source file, end
// exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ByteRange {
    pub start: u64,
    pub end: u64,
}

// Selects the samples of the next fragment starting at `first_sample`
// and fills the reused `trun_entries` and `ranges` buffers.
//
// With an end time the run stops exclusively before the first sample
// at or past it. Without one, a new fragment begins at the next sync
// sample once the minimum duration has elapsed. Payload ranges of
// adjacent samples are coalesced so the stream writer can copy with a
// minimum of seeks.
//
// Returns (mdat payload size, next sample index, trun version). The
// trun version is 1 iff any selected sample has a negative composition
// offset.
pub(crate) fn generate_fragment(
    track: &Track,
    first_sample: usize,
    end_time_scaled: i64,
    trun_entries: &mut Vec<TrunEntry>,
    ranges: &mut Vec<ByteRange>,
) -> (u64, usize, u8) {
    trun_entries.clear();
    ranges.clear();

    let samples = track.samples();
    if first_sample >= samples.len() {
        return (0, first_sample, 0);
    }

    let start_dts = samples[first_sample].dts;
    let threshold = i64::from(track.timescale) * MIN_FRAGMENT_DURATION_SECS;

    // Find the end of this fragment.
    let mut last_sample = first_sample;
    while last_sample < samples.len() {
        let s = &samples[last_sample];

        // Hard stop: don't include any sample at or past the end time.
        if end_time_scaled > 0 && s.pts() >= end_time_scaled {
            break;
        }

        // Fragment boundary: when no end time is given, break at sync
        // samples after the minimum duration.
        if end_time_scaled == 0
            && last_sample > first_sample
            && s.sync
            && s.dts - start_dts >= threshold
        {
            break;
        }

        last_sample += 1;
    }

    if last_sample == first_sample {
        return (0, last_sample, 0);
    }

    let mut mdat_size: u64 = 0;
    let mut trun_version: u8 = 0;

    for s in &samples[first_sample..last_sample] {
        if s.presentation_offset < 0 {
            trun_version = 1;
        }
        let flags = if s.sync {
            SAMPLE_FLAGS_SYNC
        } else {
            SAMPLE_FLAGS_NON_SYNC
        };
        trun_entries.push(TrunEntry {
            sample_duration: s.duration,
            sample_size: s.size,
            sample_flags: flags,
            sample_composition_time_offset: s.presentation_offset,
        });
        mdat_size += u64::from(s.size);

        let start = s.offset;
        let end = s.offset + u64::from(s.size);
        match ranges.last_mut() {
            Some(last) if last.end == start => last.end = end,
            _ => ranges.push(ByteRange { start, end }),
        }
    }

    (mdat_size, last_sample, trun_version)
}

// Serializes a complete moof box into `buf` and writes it to `w`.
//
// The layout is fixed: mfhd, one traf with tfhd (default-base-is-moof),
// tfdt and a single trun carrying duration, size, flags and composition
// offset per sample. tfdt stays version 0 with a 32-bit decode time,
// matching the rebased times the stream writer feeds in.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub(crate) fn write_moof<W: Write + ?Sized>(
    w: &mut W,
    buf: &mut Vec<u8>,
    seq_num: u32,
    track_id: u32,
    base_media_decode_time: u32,
    entries: &[TrunEntry],
    trun_version: u8,
) -> Result<(), std::io::Error> {
    // moof header:  8
    // mfhd:         16  (8 hdr + 4 ver/flags + 4 seq_num)
    // traf header:  8
    // tfhd:         16  (8 hdr + 4 ver/flags + 4 track_id)
    // tfdt:         16  (8 hdr + 4 ver/flags + 4 decode_time)
    // trun header:  20  (8 hdr + 4 ver/flags + 4 count + 4 data_offset)
    // trun entries: 16 each
    let n = entries.len();
    let trun_size = 20 + n * 16;
    let traf_size = 8 + 16 + 16 + trun_size;
    let moof_size = 8 + 16 + traf_size;
    let data_offset = moof_size + 8; // +8 for the mdat header

    buf.clear();
    buf.reserve(moof_size);

    put_u32(buf, moof_size as u32);
    buf.extend_from_slice(b"moof");

    put_u32(buf, 16);
    buf.extend_from_slice(b"mfhd");
    put_u32(buf, 0); // version 0, flags 0
    put_u32(buf, seq_num);

    put_u32(buf, traf_size as u32);
    buf.extend_from_slice(b"traf");

    put_u32(buf, 16);
    buf.extend_from_slice(b"tfhd");
    put_u32(buf, 0x0002_0000); // version 0, default-base-is-moof
    put_u32(buf, track_id);

    put_u32(buf, 16);
    buf.extend_from_slice(b"tfdt");
    put_u32(buf, 0); // version 0, flags 0
    put_u32(buf, base_media_decode_time);

    // Flags: data-offset, sample-duration, sample-size, sample-flags
    // and sample-composition-time-offset present.
    put_u32(buf, trun_size as u32);
    buf.extend_from_slice(b"trun");
    put_u32(buf, (u32::from(trun_version) << 24) | 0x000f01);
    put_u32(buf, n as u32);
    put_u32(buf, data_offset as u32);

    for e in entries {
        put_u32(buf, e.sample_duration);
        put_u32(buf, e.sample_size);
        put_u32(buf, e.sample_flags);
        put_u32(buf, e.sample_composition_time_offset as u32);
    }

    w.write_all(buf)
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}
