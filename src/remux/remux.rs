// SPDX-License-Identifier: GPL-2.0-or-later

// Reads progressive MP4 files and re-emits them as fragmented MP4
// streams for HTTP delivery. Payload bytes are copied from the source
// untouched; only the container structure is rebuilt.

mod fragment;
mod init;
mod sample_table;
#[cfg(test)]
mod test;
mod writer;

pub use sample_table::BuildSampleTableError;
pub use writer::{write_to, ReadAt, WriteStreamError, Writer};

use bmff::{Scanner, TYPE_AVC1, TYPE_AVCC, TYPE_ESDS, TYPE_MOOV, TYPE_MP4A};
use bytes::Bytes;
use init::InitSource;
use mp4::Mp4Box;
use sample_table::build_sample_table;
use std::io::{Read, Seek};
use thiserror::Error;
use tracing::debug;

// A single decoded sample (frame) with the metadata needed for
// remuxing. Times are in the track's media timescale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Sample {
    // Absolute byte offset of the payload in the source file.
    pub offset: u64,
    pub size: u32,
    pub duration: u32,
    pub dts: i64,
    pub presentation_offset: i32,
    pub sync: bool,
}

impl Sample {
    #[must_use]
    pub fn pts(&self) -> i64 {
        self.dts + i64::from(self.presentation_offset)
    }
}

// Parsed metadata for one playable track.
pub struct Track {
    pub track_id: u32,
    pub timescale: u32,
    // Codec label, e.g. "avc1.64001f" or "mp4a.40.2".
    pub codec: String,
    // MIME type, e.g. `video/mp4; codecs="avc1.64001f"`.
    pub mime: String,

    samples: Vec<Sample>,
    // Pre-encoded ftyp+moov init segment, shared by every stream
    // produced for this track.
    init_segment: Bytes,
    // From the last stsc entry seen during the sample-table build.
    default_sample_description_index: u32,
}

impl Track {
    // The dense sample table in decode order.
    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    // The pre-built init segment (ftyp+moov) for this track.
    #[must_use]
    pub fn init_segment(&self) -> &Bytes {
        &self.init_segment
    }

    // The sample description index announced in the trex box, taken
    // from the last stsc entry.
    #[must_use]
    pub fn default_sample_description_index(&self) -> u32 {
        self.default_sample_description_index
    }

    // Total duration of the track in seconds.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn duration(&self) -> f64 {
        let Some(last) = self.samples.last() else {
            return 0.0;
        };
        if self.timescale == 0 {
            return 0.0;
        }
        (last.dts + i64::from(last.duration)) as f64 / f64::from(self.timescale)
    }

    // Finds the first sync sample at or after the given time in
    // seconds. Useful for finding a clean start point for time-based
    // extraction.
    #[must_use]
    pub fn find_sample_after(&self, time_seconds: f64) -> usize {
        let scaled = self.scale_time(time_seconds);

        // Binary search: first sample with pts >= scaled.
        let mut idx = self.samples.partition_point(|s| s.pts() < scaled);

        if idx >= self.samples.len() {
            return self.samples.len().saturating_sub(1);
        }

        // Walk forward to the next sync sample.
        while idx < self.samples.len() && !self.samples[idx].sync {
            idx += 1;
        }
        if idx >= self.samples.len() {
            return self.samples.len() - 1;
        }
        idx
    }

    // Finds the sync sample at or before the given time in seconds.
    // Useful for seeking backward to a safe playback position.
    #[must_use]
    pub fn find_sample_before(&self, time_seconds: f64) -> usize {
        let scaled = self.scale_time(time_seconds);

        // Binary search: last sample with pts <= scaled.
        let mut idx = self
            .samples
            .partition_point(|s| s.pts() <= scaled)
            .saturating_sub(1);

        // Walk backward to the preceding sync sample.
        while idx > 0 && !self.samples[idx].sync {
            idx -= 1;
        }
        idx
    }

    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    fn scale_time(&self, time_seconds: f64) -> i64 {
        (time_seconds * f64::from(self.timescale)) as i64
    }
}

// Parsed MP4 metadata, one entry per playable track. Immutable once
// built; any number of [`Writer`]s may stream from it concurrently.
pub struct Remuxer {
    pub tracks: Vec<Track>,
}

#[derive(Debug, Error)]
pub enum CreateRemuxerError {
    #[error("moov box not found")]
    MoovNotFound,

    #[error("scan: {0}")]
    Scan(bmff::ScanError),

    #[error("read moov: {0}")]
    ReadMoov(std::io::Error),

    #[error("decode moov: {0}")]
    Decode(#[from] mp4::DecodeError),

    #[error("missing mvhd")]
    MissingMvhd,

    #[error("no tracks found")]
    NoTracks,

    #[error("no playable tracks")]
    NoPlayableTracks,
}

impl Remuxer {
    // Locates and parses the moov box of a seekable MP4 source and
    // prepares per-track metadata. Only the moov itself is read into
    // memory.
    pub fn new<RS: Read + Seek>(rs: RS) -> Result<Self, CreateRemuxerError> {
        use CreateRemuxerError::*;

        let mut sc = Scanner::new(rs);
        while sc.next() {
            let entry = sc.entry();
            if entry.box_type != TYPE_MOOV {
                continue;
            }
            let mut buf =
                vec![0; usize::try_from(entry.size).expect("moov fits in memory")];
            sc.read_box(&mut buf).map_err(ReadMoov)?;
            let moov = mp4::decode(&buf, 0, buf.len())?;
            return Self::from_moov(&moov);
        }
        match sc.into_err() {
            Some(e) => Err(Scan(e)),
            None => Err(MoovNotFound),
        }
    }

    // Parses the moov box of an in-memory MP4 file.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CreateRemuxerError> {
        let mut r = bmff::Reader::new(data);
        while r.next() {
            if r.box_type() == TYPE_MOOV {
                let end = r.offset() + usize::try_from(r.size()).expect("size within buffer");
                let moov = mp4::decode(data, r.offset(), end)?;
                return Self::from_moov(&moov);
            }
        }
        Err(CreateRemuxerError::MoovNotFound)
    }

    fn from_moov(moov: &Mp4Box) -> Result<Self, CreateRemuxerError> {
        use CreateRemuxerError::*;

        let mvhd = *moov
            .child(bmff::TYPE_MVHD)
            .and_then(Mp4Box::mvhd)
            .ok_or(MissingMvhd)?;

        let traks = moov.child_list(bmff::TYPE_TRAK);
        if traks.is_empty() {
            return Err(NoTracks);
        }

        let mut tracks = Vec::new();
        let mut has_video = false;
        let mut has_audio = false;

        for trak in traks {
            if let Some(track) = build_track(mvhd, trak, &mut has_video, &mut has_audio) {
                tracks.push(track);
            }
        }

        if tracks.is_empty() {
            return Err(NoPlayableTracks);
        }
        Ok(Self { tracks })
    }
}

// Builds one track from a trak box. Tracks with missing required
// boxes, unsupported codecs, or a kind that was already accepted are
// dropped.
fn build_track(
    mvhd: mp4::Mvhd,
    trak: &Mp4Box,
    has_video: &mut bool,
    has_audio: &mut bool,
) -> Option<Track> {
    let tkhd_node = trak.child(bmff::TYPE_TKHD)?;
    let tkhd = *tkhd_node.tkhd()?;
    let mdia = trak.child(bmff::TYPE_MDIA)?;
    let mdhd_node = mdia.child(bmff::TYPE_MDHD)?;
    let mdhd = *mdhd_node.mdhd()?;
    let hdlr_node = mdia.child(bmff::TYPE_HDLR)?;
    let hdlr = hdlr_node.hdlr()?;
    let minf = mdia.child(bmff::TYPE_MINF)?;
    let stbl = minf.child(bmff::TYPE_STBL)?;
    let stsd_node = stbl.child(bmff::TYPE_STSD)?;
    let stsd = stsd_node.stsd()?;
    let entry = stsd.entries.first()?;

    let codec = match (&hdlr.handler_type, entry.box_type) {
        (b"vide", t) if t == TYPE_AVC1 => {
            if *has_video {
                debug!(track_id = tkhd.track_id, "skipping duplicate video track");
                return None;
            }
            *has_video = true;
            video_codec_label(entry)
        }
        (b"soun", t) if t == TYPE_MP4A => {
            if *has_audio {
                debug!(track_id = tkhd.track_id, "skipping duplicate audio track");
                return None;
            }
            *has_audio = true;
            audio_codec_label(entry)
        }
        (handler, entry_type) => {
            debug!(
                track_id = tkhd.track_id,
                handler = bmff::type_str(*handler),
                entry = bmff::type_str(entry_type),
                "skipping unsupported track"
            );
            return None;
        }
    };

    let mime = if hdlr.handler_type == *b"vide" {
        format!("video/mp4; codecs=\"{codec}\"")
    } else {
        format!("audio/mp4; codecs=\"{codec}\"")
    };

    let (samples, default_sdi) = match build_sample_table(stbl) {
        Ok(v) => v,
        Err(e) => {
            debug!(track_id = tkhd.track_id, "rejecting track: {e}");
            return None;
        }
    };
    if samples.is_empty() {
        debug!(track_id = tkhd.track_id, "rejecting track without samples");
        return None;
    }

    let init_segment = init::build_init_segment(
        &InitSource {
            mvhd,
            tkhd_flags: tkhd_node.flags,
            tkhd,
            mdhd,
            hdlr: hdlr_node,
            minf,
            stsd: stsd_node,
        },
        tkhd.track_id,
        default_sdi,
    );

    Some(Track {
        track_id: tkhd.track_id,
        timescale: mdhd.timescale,
        codec,
        mime,
        samples,
        init_segment,
        default_sample_description_index: default_sdi,
    })
}

fn video_codec_label(entry: &Mp4Box) -> String {
    let suffix = entry.visual().and_then(|v| {
        v.children
            .iter()
            .filter(|c| c.box_type == TYPE_AVCC)
            .find_map(|c| c.avcc().and_then(|a| a.mime_codec.clone()))
    });
    match suffix {
        Some(s) => format!("avc1.{s}"),
        None => "avc1".to_owned(),
    }
}

fn audio_codec_label(entry: &Mp4Box) -> String {
    let suffix = entry.audio().and_then(|a| {
        a.children
            .iter()
            .filter(|c| c.box_type == TYPE_ESDS)
            .find_map(|c| c.esds().and_then(|e| e.mime_codec.clone()))
    });
    match suffix {
        Some(s) => format!("mp4a.{s}"),
        None => "mp4a".to_owned(),
    }
}
