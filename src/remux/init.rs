// SPDX-License-Identifier: GPL-2.0-or-later

use bmff::{
    TYPE_DINF, TYPE_FTYP, TYPE_MDHD, TYPE_MDIA, TYPE_MEHD, TYPE_MINF, TYPE_MOOV, TYPE_MVEX,
    TYPE_MVHD, TYPE_SMHD, TYPE_STBL, TYPE_STCO, TYPE_STSC, TYPE_STSS, TYPE_STSZ, TYPE_STTS,
    TYPE_TKHD, TYPE_TRAK, TYPE_VMHD,
};
use bytes::Bytes;
use mp4::{encode_to_bytes, BoxBody, Ftyp, Mehd, Mp4Box, Trex};

// Source boxes for the init segment, extracted from the decoded moov.
pub(crate) struct InitSource<'a> {
    pub mvhd: mp4::Mvhd,
    pub tkhd_flags: u32,
    pub tkhd: mp4::Tkhd,
    pub mdhd: mp4::Mdhd,
    pub hdlr: &'a Mp4Box,
    pub minf: &'a Mp4Box,
    pub stsd: &'a Mp4Box,
}

// Builds the byte-exact ftyp+moov prefix consumed once per stream.
//
// The moov carries the source headers with zeroed durations, an
// emptied sample table around the preserved stsd, and an mvex that
// announces the movie as fragmented. Identical inputs produce
// bitwise-identical segments.
pub(crate) fn build_init_segment(src: &InitSource, track_id: u32, default_sdi: u32) -> Bytes {
    let mut mvhd = src.mvhd;
    let original_duration = mvhd.duration;
    mvhd.duration = 0;

    let mut tkhd = src.tkhd;
    tkhd.duration = 0;

    let mut mdhd = src.mdhd;
    mdhd.duration = 0;

    let mut stbl = Mp4Box::container(TYPE_STBL).with_child(src.stsd.clone());
    for t in [TYPE_STTS, bmff::TYPE_CTTS, TYPE_STSC, TYPE_STSZ, TYPE_STCO, TYPE_STSS] {
        stbl = stbl.with_child(empty_table(t));
    }

    let mut minf = Mp4Box::container(TYPE_MINF);
    for t in [TYPE_VMHD, TYPE_SMHD, TYPE_DINF] {
        if let Some(b) = src.minf.child(t) {
            minf = minf.with_child(b.clone());
        }
    }
    minf = minf.with_child(stbl);

    let moov = Mp4Box::container(TYPE_MOOV)
        .with_child(Mp4Box::new(TYPE_MVHD, BoxBody::Mvhd(mvhd)))
        .with_child(
            Mp4Box::container(TYPE_TRAK)
                .with_child(Mp4Box::new(TYPE_TKHD, BoxBody::Tkhd(tkhd)).with_flags(src.tkhd_flags))
                .with_child(
                    Mp4Box::container(TYPE_MDIA)
                        .with_child(Mp4Box::new(TYPE_MDHD, BoxBody::Mdhd(mdhd)))
                        .with_child(src.hdlr.clone())
                        .with_child(minf),
                ),
        )
        .with_child(
            Mp4Box::container(TYPE_MVEX)
                .with_child(Mp4Box::new(
                    TYPE_MEHD,
                    BoxBody::Mehd(Mehd {
                        fragment_duration: original_duration,
                    }),
                ))
                .with_child(Mp4Box::new(
                    bmff::TYPE_TREX,
                    BoxBody::Trex(Trex {
                        track_id,
                        default_sample_description_index: default_sdi,
                        ..Trex::default()
                    }),
                )),
        );

    let ftyp = Mp4Box::new(
        TYPE_FTYP,
        BoxBody::Ftyp(Ftyp {
            major_brand: *b"iso5",
            minor_version: 0,
            compatible_brands: vec![*b"iso5"],
        }),
    );

    let mut out = encode_to_bytes(&ftyp);
    out.extend_from_slice(&encode_to_bytes(&moov));
    Bytes::from(out)
}

fn empty_table(t: bmff::BoxType) -> Mp4Box {
    let body = match &t {
        b"stts" => BoxBody::Stts(mp4::Stts::default()),
        b"ctts" => BoxBody::Ctts(mp4::Ctts::default()),
        b"stsc" => BoxBody::Stsc(mp4::Stsc::default()),
        b"stsz" => BoxBody::Stsz(mp4::Stsz::default()),
        b"stco" => BoxBody::Stco(mp4::Stco::default()),
        _ => BoxBody::Stss(mp4::Stss::default()),
    };
    Mp4Box::new(t, body)
}
