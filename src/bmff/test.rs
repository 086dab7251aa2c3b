#![allow(clippy::unwrap_used, clippy::as_conversions)]

use crate::*;
use pretty_assertions::assert_eq;
use std::io::Cursor;
use test_case::test_case;

#[test]
fn test_writer_backpatch_nesting() {
    let mut w = Writer::new();
    w.start_box(TYPE_MOOV);
    w.start_box(TYPE_TRAK);
    w.put_u32(0xdead_beef);
    w.end_box();
    w.end_box();

    let want = vec![
        0, 0, 0, 0x14, b'm', b'o', b'o', b'v', //
        0, 0, 0, 0x0c, b't', b'r', b'a', b'k', //
        0xde, 0xad, 0xbe, 0xef, //
    ];
    assert_eq!(want, w.bytes());
}

#[test]
fn test_write_ftyp() {
    let mut w = Writer::new();
    w.write_ftyp(*b"iso5", 0, &[*b"iso5"]);

    let want = vec![
        0, 0, 0, 0x14, b'f', b't', b'y', b'p', //
        b'i', b's', b'o', b'5', // Major brand.
        0, 0, 0, 0, // Minor version.
        b'i', b's', b'o', b'5', // Compatible brand.
    ];
    assert_eq!(want, w.bytes());
}

#[test]
fn test_write_styp() {
    let mut w = Writer::new();
    w.write_styp(*b"msdh", 0, &[*b"msdh", *b"msix"]);

    let want = vec![
        0, 0, 0, 0x18, b's', b't', b'y', b'p', //
        b'm', b's', b'd', b'h', //
        0, 0, 0, 0, //
        b'm', b's', b'd', b'h', //
        b'm', b's', b'i', b'x', //
    ];
    assert_eq!(want, w.bytes());
}

#[test]
fn test_write_mvhd_v0() {
    let mut w = Writer::new();
    w.write_mvhd(1000, 0x11, 2);

    let want = vec![
        0, 0, 0, 0x6c, b'm', b'v', b'h', b'd', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 0, // Creation time.
        0, 0, 0, 0, // Modification time.
        0, 0, 3, 0xe8, // Timescale.
        0, 0, 0, 0x11, // Duration.
        0, 1, 0, 0, // Rate.
        1, 0, // Volume.
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, // Reserved.
        0, 1, 0, 0, 0, 0, 0, 0, 0, // Matrix.
        0, 0, 0, 0, 0, 0, 0, 0, 1, //
        0, 0, 0, 0, 0, 0, 0, 0, 0, //
        0, 0, 0, 0, 0, 0x40, 0, 0, 0, //
        0, 0, 0, 0, 0, 0, // Predefined.
        0, 0, 0, 0, 0, 0, //
        0, 0, 0, 0, 0, 0, //
        0, 0, 0, 0, 0, 0, //
        0, 0, 0, 2, // Next track ID.
    ];
    assert_eq!(pretty_hex::pretty_hex(&want), pretty_hex::pretty_hex(&w.bytes()));
}

#[test]
fn test_write_mvhd_widens_to_v1() {
    let mut w = Writer::new();
    w.write_mvhd(90000, 0x1_0000_0001, 2);

    let b = w.bytes();
    assert_eq!(120, b.len());
    assert_eq!(1, b[8]); // version
    assert_eq!(0x1_0000_0001, u64::from_be_bytes(b[32..40].try_into().unwrap()));
}

#[test]
fn test_write_tkhd_v0() {
    let mut w = Writer::new();
    w.write_tkhd(3, 1, 0x11, 640 << 16, 480 << 16);

    let want = vec![
        0, 0, 0, 0x5c, b't', b'k', b'h', b'd', //
        0, 0, 0, 3, // FullBox.
        0, 0, 0, 0, // Creation time.
        0, 0, 0, 0, // Modification time.
        0, 0, 0, 1, // Track ID.
        0, 0, 0, 0, // Reserved.
        0, 0, 0, 0x11, // Duration.
        0, 0, 0, 0, 0, 0, 0, 0, // Reserved.
        0, 0, // Layer.
        0, 0, // Alternate group.
        0, 0, // Volume.
        0, 0, // Reserved.
        0, 1, 0, 0, 0, 0, 0, 0, 0, // Matrix.
        0, 0, 0, 0, 0, 0, 0, 0, 1, //
        0, 0, 0, 0, 0, 0, 0, 0, 0, //
        0, 0, 0, 0, 0, 0x40, 0, 0, 0, //
        2, 0x80, 0, 0, // Width.
        1, 0xe0, 0, 0, // Height.
    ];
    assert_eq!(pretty_hex::pretty_hex(&want), pretty_hex::pretty_hex(&w.bytes()));
}

#[test]
fn test_write_mdhd_v0() {
    let mut w = Writer::new();
    w.write_mdhd(90000, 0x11, 0x55c4);

    let want = vec![
        0, 0, 0, 0x20, b'm', b'd', b'h', b'd', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 0, // Creation time.
        0, 0, 0, 0, // Modification time.
        0, 1, 0x5f, 0x90, // Timescale.
        0, 0, 0, 0x11, // Duration.
        0x55, 0xc4, // Language.
        0, 0, // Quality.
    ];
    assert_eq!(want, w.bytes());
}

#[test_case(0x11, 0; "v0")]
#[test_case(0x1_0000_0000, 1; "widens to v1")]
fn test_write_mdhd_version(duration: u64, want_version: u8) {
    let mut w = Writer::new();
    w.write_mdhd(90000, duration, 0x55c4);
    assert_eq!(want_version, w.bytes()[8]);
}

#[test]
fn test_write_hdlr() {
    let mut w = Writer::new();
    w.write_hdlr(*b"vide", "VideoHandler");

    let want = vec![
        0, 0, 0, 0x2d, b'h', b'd', b'l', b'r', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 0, // Predefined.
        b'v', b'i', b'd', b'e', // Handler type.
        0, 0, 0, 0, // Reserved.
        0, 0, 0, 0, //
        0, 0, 0, 0, //
        b'V', b'i', b'd', b'e', b'o', b'H', b'a', b'n', b'd', b'l', b'e', b'r', 0, //
    ];
    assert_eq!(want, w.bytes());
}

#[test]
fn test_write_vmhd_smhd_dref() {
    let mut w = Writer::new();
    w.write_vmhd();
    w.write_smhd();
    w.write_dref();

    let want = vec![
        0, 0, 0, 0x14, b'v', b'm', b'h', b'd', //
        0, 0, 0, 1, // FullBox.
        0, 0, // Graphics mode.
        0, 0, 0, 0, 0, 0, // OpColor.
        0, 0, 0, 0x10, b's', b'm', b'h', b'd', //
        0, 0, 0, 0, // FullBox.
        0, 0, // Balance.
        0, 0, // Reserved.
        0, 0, 0, 0x1c, b'd', b'r', b'e', b'f', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 1, // Entry count.
        0, 0, 0, 0x0c, b'u', b'r', b'l', b' ', //
        0, 0, 0, 1, // FullBox, self-contained.
    ];
    assert_eq!(want, w.bytes());
}

#[test]
fn test_write_sample_tables() {
    let mut w = Writer::new();
    w.write_stts(&[SttsEntry {
        sample_count: 3,
        sample_delta: 9,
    }]);
    w.write_ctts(&[CttsEntry {
        sample_count: 1,
        sample_offset: -2,
    }]);
    w.write_stsc(&[StscEntry {
        first_chunk: 1,
        samples_per_chunk: 3,
        sample_description_id: 1,
    }]);
    w.write_stsz(0, 2, &[2, 5]);
    w.write_stco(&[0x2c9]);
    w.write_stss(&[1]);

    let want = vec![
        0, 0, 0, 0x18, b's', b't', b't', b's', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 1, // Entry count.
        0, 0, 0, 3, // Sample count.
        0, 0, 0, 9, // Sample delta.
        0, 0, 0, 0x18, b'c', b't', b't', b's', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 1, // Entry count.
        0, 0, 0, 1, // Sample count.
        0xff, 0xff, 0xff, 0xfe, // Sample offset.
        0, 0, 0, 0x1c, b's', b't', b's', b'c', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 1, // Entry count.
        0, 0, 0, 1, // First chunk.
        0, 0, 0, 3, // Samples per chunk.
        0, 0, 0, 1, // Sample description index.
        0, 0, 0, 0x1c, b's', b't', b's', b'z', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 0, // Sample size.
        0, 0, 0, 2, // Sample count.
        0, 0, 0, 2, // Entry1.
        0, 0, 0, 5, // Entry2.
        0, 0, 0, 0x14, b's', b't', b'c', b'o', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 1, // Entry count.
        0, 0, 2, 0xc9, // Chunk offset.
        0, 0, 0, 0x14, b's', b't', b's', b's', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 1, // Entry count.
        0, 0, 0, 1, // Sample number.
    ];
    assert_eq!(pretty_hex::pretty_hex(&want), pretty_hex::pretty_hex(&w.bytes()));
}

#[test]
fn test_write_stsz_default_size_has_no_entries() {
    let mut w = Writer::new();
    w.write_stsz(0x400, 7, &[]);

    let want = vec![
        0, 0, 0, 0x14, b's', b't', b's', b'z', //
        0, 0, 0, 0, // FullBox.
        0, 0, 4, 0, // Sample size.
        0, 0, 0, 7, // Sample count.
    ];
    assert_eq!(want, w.bytes());
}

#[test]
fn test_write_co64() {
    let mut w = Writer::new();
    w.write_co64(&[0x1_0000_0010]);

    let want = vec![
        0, 0, 0, 0x18, b'c', b'o', b'6', b'4', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 1, // Entry count.
        0, 0, 0, 1, 0, 0, 0, 0x10, // Chunk offset.
    ];
    assert_eq!(want, w.bytes());
}

#[test]
fn test_write_elst_v0() {
    let mut w = Writer::new();
    w.write_elst(&[ElstEntry {
        segment_duration: 0x100,
        media_time: -1,
        media_rate_int: 1,
        media_rate_frac: 0,
    }]);

    let want = vec![
        0, 0, 0, 0x1c, b'e', b'l', b's', b't', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 1, // Entry count.
        0, 0, 1, 0, // Segment duration.
        0xff, 0xff, 0xff, 0xff, // Media time.
        0, 1, // Media rate integer.
        0, 0, // Media rate fraction.
    ];
    assert_eq!(want, w.bytes());
}

#[test]
fn test_write_elst_widens_to_v1() {
    let mut w = Writer::new();
    w.write_elst(&[ElstEntry {
        segment_duration: 0x1_0000_0000,
        media_time: 0,
        media_rate_int: 1,
        media_rate_frac: 0,
    }]);

    let want = vec![
        0, 0, 0, 0x24, b'e', b'l', b's', b't', //
        1, 0, 0, 0, // FullBox.
        0, 0, 0, 1, // Entry count.
        0, 0, 0, 1, 0, 0, 0, 0, // Segment duration.
        0, 0, 0, 0, 0, 0, 0, 0, // Media time.
        0, 1, // Media rate integer.
        0, 0, // Media rate fraction.
    ];
    assert_eq!(want, w.bytes());
}

#[test_case(0x100, 0, 16; "v0")]
#[test_case(0x1_0000_0000, 1, 20; "widens to v1")]
fn test_write_mehd(duration: u64, want_version: u8, want_size: usize) {
    let mut w = Writer::new();
    w.write_mehd(duration);
    assert_eq!(want_size, w.len());
    assert_eq!(want_version, w.bytes()[8]);
}

#[test]
fn test_write_trex() {
    let mut w = Writer::new();
    w.write_trex(1, 1, 0, 0, 0);

    let want = vec![
        0, 0, 0, 0x20, b't', b'r', b'e', b'x', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 1, // Track ID.
        0, 0, 0, 1, // Default sample description index.
        0, 0, 0, 0, // Default sample duration.
        0, 0, 0, 0, // Default sample size.
        0, 0, 0, 0, // Default sample flags.
    ];
    assert_eq!(want, w.bytes());
}

#[test]
fn test_write_fragment_headers() {
    let mut w = Writer::new();
    w.write_mfhd(7);
    w.write_tfhd(TFHD_DEFAULT_BASE_IS_MOOF, 1);
    w.write_tfdt(0xea60);

    let want = vec![
        0, 0, 0, 0x10, b'm', b'f', b'h', b'd', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0, 7, // Sequence number.
        0, 0, 0, 0x10, b't', b'f', b'h', b'd', //
        0, 2, 0, 0, // FullBox, default-base-is-moof.
        0, 0, 0, 1, // Track ID.
        0, 0, 0, 0x10, b't', b'f', b'd', b't', //
        0, 0, 0, 0, // FullBox.
        0, 0, 0xea, 0x60, // Base media decode time.
    ];
    assert_eq!(want, w.bytes());
}

#[test]
fn test_write_tfdt_widens_to_v1() {
    let mut w = Writer::new();
    w.write_tfdt(0x1_0000_0000);

    let want = vec![
        0, 0, 0, 0x14, b't', b'f', b'd', b't', //
        1, 0, 0, 0, // FullBox.
        0, 0, 0, 1, 0, 0, 0, 0, // Base media decode time.
    ];
    assert_eq!(want, w.bytes());
}

#[test]
fn test_write_trun() {
    let flags = TRUN_DATA_OFFSET_PRESENT
        | TRUN_SAMPLE_DURATION_PRESENT
        | TRUN_SAMPLE_SIZE_PRESENT
        | TRUN_SAMPLE_FLAGS_PRESENT
        | TRUN_SAMPLE_COMPOSITION_TIME_OFFSET_PRESENT;
    let entries = [
        TrunEntry {
            sample_duration: 9,
            sample_size: 4,
            sample_flags: 0x0200_0000,
            sample_composition_time_offset: 0,
        },
        TrunEntry {
            sample_duration: 9,
            sample_size: 5,
            sample_flags: 0x0101_0000,
            sample_composition_time_offset: -3,
        },
    ];
    let mut w = Writer::new();
    w.write_trun(1, flags, 0x70, 0, &entries);

    let want = vec![
        0, 0, 0, 0x34, b't', b'r', b'u', b'n', //
        1, 0, 0xf, 1, // FullBox.
        0, 0, 0, 2, // Sample count.
        0, 0, 0, 0x70, // Data offset.
        0, 0, 0, 9, // Entry1 sample duration.
        0, 0, 0, 4, // Entry1 sample size.
        2, 0, 0, 0, // Entry1 sample flags.
        0, 0, 0, 0, // Entry1 composition time offset.
        0, 0, 0, 9, // Entry2 sample duration.
        0, 0, 0, 5, // Entry2 sample size.
        1, 1, 0, 0, // Entry2 sample flags.
        0xff, 0xff, 0xff, 0xfd, // Entry2 composition time offset.
    ];
    assert_eq!(pretty_hex::pretty_hex(&want), pretty_hex::pretty_hex(&w.bytes()));
}

#[test]
fn test_write_visual_sample_entry() {
    let mut w = Writer::new();
    w.start_box(TYPE_AVC1);
    w.write_visual_sample_entry(1, 650, 450, 1, 24, "");
    w.end_box();

    let want = vec![
        0, 0, 0, 0x56, b'a', b'v', b'c', b'1', //
        0, 0, 0, 0, 0, 0, // Reserved.
        0, 1, // Data reference index.
        0, 0, // Predefined.
        0, 0, // Reserved.
        0, 0, 0, 0, // Predefined2.
        0, 0, 0, 0, //
        0, 0, 0, 0, //
        2, 0x8a, // Width.
        1, 0xc2, // Height.
        0, 0x48, 0, 0, // Horizresolution.
        0, 0x48, 0, 0, // Vertresolution.
        0, 0, 0, 0, // Reserved2.
        0, 1, // Frame count.
        0, 0, 0, 0, 0, 0, 0, 0, // Compressor name.
        0, 0, 0, 0, 0, 0, 0, 0, //
        0, 0, 0, 0, 0, 0, 0, 0, //
        0, 0, 0, 0, 0, 0, 0, 0, //
        0, 0x18, // Depth.
        0xff, 0xff, // Predefined3.
    ];
    assert_eq!(pretty_hex::pretty_hex(&want), pretty_hex::pretty_hex(&w.bytes()));
}

#[test]
fn test_write_audio_sample_entry() {
    let mut w = Writer::new();
    w.start_box(TYPE_MP4A);
    w.write_audio_sample_entry(1, 2, 16, 44100 << 16);
    w.end_box();

    let want = vec![
        0, 0, 0, 0x24, b'm', b'p', b'4', b'a', //
        0, 0, 0, 0, 0, 0, // Reserved.
        0, 1, // Data reference index.
        0, 0, 0, 0, 0, 0, 0, 0, // Reserved.
        0, 2, // Channel count.
        0, 0x10, // Sample size.
        0, 0, 0, 0, // Predefined + reserved.
        0xac, 0x44, 0, 0, // Sample rate.
    ];
    assert_eq!(want, w.bytes());
}

#[test]
fn test_write_sidx() {
    let mut w = Writer::new();
    w.write_sidx(
        1,
        90000,
        0x10,
        0,
        &[SidxEntry {
            reference_type: false,
            referenced_size: 0x1000,
            subseg_duration: 90000,
            starts_with_sap: true,
            sap_type: 1,
        }],
    );

    let want = vec![
        0, 0, 0, 0x34, b's', b'i', b'd', b'x', //
        1, 0, 0, 0, // FullBox.
        0, 0, 0, 1, // Reference ID.
        0, 1, 0x5f, 0x90, // Timescale.
        0, 0, 0, 0, 0, 0, 0, 0x10, // Earliest presentation time.
        0, 0, 0, 0, 0, 0, 0, 0, // First offset.
        0, 0, // Reserved.
        0, 1, // Reference count.
        0, 0, 0x10, 0, // Reference type + size.
        0, 1, 0x5f, 0x90, // Subsegment duration.
        0x90, 0, 0, 0, // SAP.
        ];
    assert_eq!(pretty_hex::pretty_hex(&want), pretty_hex::pretty_hex(&w.bytes()));
}

#[test]
fn test_reader_round_trip_of_writer_output() {
    let mut w = Writer::new();
    w.start_box(TYPE_MOOV);
    w.write_mvhd(1000, 60000, 2);
    w.start_box(TYPE_TRAK);
    w.write_tkhd(3, 1, 60000, 640 << 16, 480 << 16);
    w.end_box();
    w.end_box();
    let buf = w.into_bytes();

    let mut r = Reader::new(&buf);
    assert!(r.next());
    assert_eq!(TYPE_MOOV, r.box_type());
    r.enter();

    assert!(r.next());
    assert_eq!(TYPE_MVHD, r.box_type());
    assert_eq!(
        Some(MvhdFields {
            timescale: 1000,
            duration: 60000,
            next_track_id: 2,
        }),
        r.read_mvhd()
    );

    assert!(r.next());
    assert_eq!(TYPE_TRAK, r.box_type());
    r.enter();
    assert!(r.next());
    assert_eq!(
        Some(TkhdFields {
            track_id: 1,
            duration: 60000,
            width: 640 << 16,
            height: 480 << 16,
        }),
        r.read_tkhd()
    );
    assert!(!r.next());
    r.exit();

    assert!(!r.next());
    r.exit();
    assert!(!r.next());
}

// Scanning a buffer and iterating a reader at depth 0 must agree on the
// top-level box list.
#[test]
fn test_scanner_reader_agreement() {
    let mut w = Writer::new();
    w.write_ftyp(*b"iso5", 0, &[*b"iso5"]);
    w.start_box(TYPE_MOOV);
    w.write_mvhd(1000, 0, 2);
    w.end_box();
    w.start_box(TYPE_MDAT);
    w.put_bytes(&[1, 2, 3]);
    w.end_box();
    let buf = w.into_bytes();

    let mut scanned = Vec::new();
    let mut sc = Scanner::new(Cursor::new(buf.clone()));
    while sc.next() {
        let e = sc.entry();
        scanned.push((e.box_type, e.offset, e.size));
    }
    assert!(sc.err().is_none());

    let mut read = Vec::new();
    let mut r = Reader::new(&buf);
    while r.next() {
        read.push((r.box_type(), r.offset() as u64, r.size()));
    }

    assert_eq!(scanned, read);
    assert_eq!(3, scanned.len());
}

#[test]
fn test_stsz_iter_stored_sizes() {
    let data = vec![
        0, 0, 0, 0, // Sample size.
        0, 0, 0, 3, // Sample count.
        0, 0, 0, 2, //
        0, 0, 0, 5, //
        0, 0, 0, 9, //
    ];
    let mut it = StszIter::new(&data);
    assert_eq!(3, StszIter::count(&it));
    assert_eq!(0, it.default_sample_size());
    assert_eq!(vec![2, 5, 9], it.by_ref().collect::<Vec<_>>());
    assert_eq!(None, it.next());
}

#[test]
fn test_stsz_iter_default_size() {
    let data = vec![
        0, 0, 4, 0, // Sample size.
        0, 0, 0, 2, // Sample count.
    ];
    let it = StszIter::new(&data);
    assert_eq!(vec![0x400, 0x400], it.collect::<Vec<_>>());
}

#[test]
fn test_stsz_iter_truncated_stops_early() {
    let data = vec![
        0, 0, 0, 0, // Sample size.
        0, 0, 0, 3, // Sample count.
        0, 0, 0, 2, // Only one stored entry.
    ];
    let it = StszIter::new(&data);
    assert_eq!(vec![2], it.collect::<Vec<_>>());
}

#[test]
fn test_stts_iter() {
    let data = vec![
        0, 0, 0, 2, // Entry count.
        0, 0, 0, 3, 0, 0, 0, 9, //
        0, 0, 0, 1, 0, 0, 0, 5, //
    ];
    let entries: Vec<_> = SttsIter::new(&data).collect();
    assert_eq!(
        vec![
            SttsEntry {
                sample_count: 3,
                sample_delta: 9,
            },
            SttsEntry {
                sample_count: 1,
                sample_delta: 5,
            },
        ],
        entries
    );
}

#[test]
fn test_ctts_iter_signed_offsets() {
    let data = vec![
        0, 0, 0, 2, // Entry count.
        0, 0, 0, 1, 0, 0, 0, 0x12, //
        0, 0, 0, 1, 0xff, 0xff, 0xff, 0xfe, // Negative offset.
    ];
    let entries: Vec<_> = CttsIter::new(&data).collect();
    assert_eq!(
        vec![
            CttsEntry {
                sample_count: 1,
                sample_offset: 0x12,
            },
            CttsEntry {
                sample_count: 1,
                sample_offset: -2,
            },
        ],
        entries
    );
}

#[test]
fn test_stsc_iter() {
    let data = vec![
        0, 0, 0, 1, // Entry count.
        0, 0, 0, 1, 0, 0, 0, 3, 0, 0, 0, 1, //
    ];
    let entries: Vec<_> = StscIter::new(&data).collect();
    assert_eq!(
        vec![StscEntry {
            first_chunk: 1,
            samples_per_chunk: 3,
            sample_description_id: 1,
        }],
        entries
    );
}

#[test]
fn test_co64_iter() {
    let data = vec![
        0, 0, 0, 1, // Entry count.
        0, 0, 0, 1, 0, 0, 0, 0x10, //
    ];
    let entries: Vec<_> = Co64Iter::new(&data).collect();
    assert_eq!(vec![0x1_0000_0010], entries);
}

#[test]
fn test_u32_iter_truncated_stops_early() {
    let data = vec![
        0, 0, 0, 3, // Entry count.
        0, 0, 0, 7, //
        0, 0, 0, 8, // Third entry missing.
    ];
    let entries: Vec<_> = U32Iter::new(&data).collect();
    assert_eq!(vec![7, 8], entries);
}

#[test_case(0; "v0")]
#[test_case(1; "v1")]
fn test_elst_iter(version: u8) {
    let mut w = Writer::new();
    let want = vec![ElstEntry {
        segment_duration: if version == 1 { 0x1_0000_0000 } else { 0x100 },
        media_time: -1,
        media_rate_int: 1,
        media_rate_frac: 0,
    }];
    w.write_elst(&want);
    let buf = w.into_bytes();

    assert_eq!(version, buf[8]);
    // Strip box header and version/flags word.
    let entries: Vec<_> = ElstIter::new(&buf[12..], version).collect();
    assert_eq!(want, entries);
}

#[test]
fn test_trun_iter_round_trip() {
    let flags = TRUN_DATA_OFFSET_PRESENT
        | TRUN_SAMPLE_DURATION_PRESENT
        | TRUN_SAMPLE_SIZE_PRESENT
        | TRUN_SAMPLE_FLAGS_PRESENT
        | TRUN_SAMPLE_COMPOSITION_TIME_OFFSET_PRESENT;
    let want = vec![
        TrunEntry {
            sample_duration: 9,
            sample_size: 4,
            sample_flags: 0x0200_0000,
            sample_composition_time_offset: -3,
        },
        TrunEntry {
            sample_duration: 9,
            sample_size: 5,
            sample_flags: 0x0101_0000,
            sample_composition_time_offset: 0,
        },
    ];
    let mut w = Writer::new();
    w.write_trun(1, flags, 0x70, 0, &want);
    let buf = w.into_bytes();

    let mut it = TrunIter::new(&buf[12..], flags);
    assert_eq!(2, TrunIter::count(&it));
    assert_eq!(0x70, it.data_offset());
    assert_eq!(want, it.by_ref().collect::<Vec<_>>());
}

#[test]
fn test_trun_iter_partial_layout() {
    // Only sizes present: stride is a single field.
    let data = vec![
        0, 0, 0, 2, // Sample count.
        0, 0, 0, 4, //
        0, 0, 0, 5, //
    ];
    let entries: Vec<_> = TrunIter::new(&data, TRUN_SAMPLE_SIZE_PRESENT).collect();
    assert_eq!(
        vec![
            TrunEntry {
                sample_size: 4,
                ..TrunEntry::default()
            },
            TrunEntry {
                sample_size: 5,
                ..TrunEntry::default()
            },
        ],
        entries
    );
}

#[test]
fn test_read_ftyp() {
    let data = vec![
        b'i', b's', b'o', b'5', //
        0, 0, 0, 0, //
        b'i', b's', b'o', b'5', //
        b'd', b'a', b's', b'h', //
    ];
    let info = read_ftyp(&data).unwrap();
    assert_eq!(
        FtypInfo {
            major_brand: *b"iso5",
            minor_version: 0,
            compatible_brands: vec![*b"iso5", *b"dash"],
        },
        info
    );
}

#[test]
fn test_sample_entry_round_trip() {
    let mut w = Writer::new();
    w.write_visual_sample_entry(1, 650, 450, 1, 24, "codec");
    let visual = read_visual_sample_entry(w.bytes()).unwrap();
    assert_eq!(650, visual.width);
    assert_eq!(450, visual.height);
    assert_eq!(1, visual.frame_count);
    assert_eq!(24, visual.depth);
    assert_eq!("codec", visual.compressor_name);
    assert_eq!(78, visual.child_offset);

    let mut w = Writer::new();
    w.write_audio_sample_entry(1, 2, 16, 44100 << 16);
    let audio = read_audio_sample_entry(w.bytes()).unwrap();
    assert_eq!(2, audio.channel_count);
    assert_eq!(16, audio.sample_size);
    assert_eq!(44100 << 16, audio.sample_rate);
    assert_eq!(28, audio.child_offset);
}

#[test]
fn test_read_avcc_codec() {
    let data = [1, 0x64, 0x00, 0x1f, 0xff];
    assert_eq!(Some("64001f".to_owned()), read_avcc_codec(&data));
    assert_eq!(None, read_avcc_codec(&[1, 0x64]));
}

#[test]
fn test_type_str() {
    assert_eq!("moov", type_str(TYPE_MOOV));
    assert!(is_container_box(TYPE_MOOV));
    assert!(!is_container_box(TYPE_MVHD));
    assert!(is_full_box(TYPE_MVHD));
    assert!(!is_full_box(TYPE_FTYP));
    // meta is both a full box and a container.
    assert!(is_full_box(TYPE_META));
    assert!(is_container_box(TYPE_META));
}
