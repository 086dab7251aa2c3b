// SPDX-License-Identifier: GPL-2.0-or-later

use crate::{
    fragment::{generate_fragment, write_moof, ByteRange},
    Track,
};
use bmff::TrunEntry;
use std::io::{Read, Seek, SeekFrom, Write};
use thiserror::Error;

const TRUN_ENTRIES_CAPACITY: usize = 512;
const RANGES_CAPACITY: usize = 64;
const COPY_BUF_SIZE: usize = 32 * 1024;
const MOOF_BUF_CAPACITY: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum WriteStreamError {
    #[error("write: {0}")]
    Write(std::io::Error),

    #[error("seek source: {0}")]
    Seek(std::io::Error),

    #[error("read source: {0}")]
    Read(std::io::Error),

    #[error("source ended {0} bytes short of a sample payload")]
    SourceTooShort(u64),
}

// A positional byte source that does not mutate a cursor, so a single
// instance may back any number of concurrent writers.
pub trait ReadAt {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize>;
}

#[cfg(unix)]
impl ReadAt for std::fs::File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(self, buf, offset)
    }
}

#[cfg(windows)]
impl ReadAt for std::fs::File {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(self, buf, offset)
    }
}

impl ReadAt for [u8] {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        let Ok(offset) = usize::try_from(offset) else {
            return Ok(0);
        };
        if offset >= self.len() {
            return Ok(0);
        }
        let n = (self.len() - offset).min(buf.len());
        buf[..n].copy_from_slice(&self[offset..offset + n]);
        Ok(n)
    }
}

impl<T: ReadAt + ?Sized> ReadAt for &T {
    fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
        (**self).read_at(buf, offset)
    }
}

// Writes fragmented MP4 streams, owning the reusable scratch buffers.
//
// A Writer is NOT safe for concurrent use. Use one Writer per thread,
// or protect it with a mutex.
pub struct Writer {
    trun_entries: Vec<TrunEntry>,
    ranges: Vec<ByteRange>,
    copy_buf: Vec<u8>,
    moof_buf: Vec<u8>,
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            trun_entries: Vec::with_capacity(TRUN_ENTRIES_CAPACITY),
            ranges: Vec::with_capacity(RANGES_CAPACITY),
            copy_buf: vec![0; COPY_BUF_SIZE],
            moof_buf: Vec::with_capacity(MOOF_BUF_CAPACITY),
        }
    }

    // Writes a complete fragmented MP4 stream for a single track to w,
    // starting at `start_time` seconds. With `end_time` > 0, stops
    // before the first sample at or past it; otherwise the stream runs
    // to the end of the track.
    //
    // The source is read through its seek position, which serializes
    // use of the source. For a source shared across concurrent
    // writers, use [`Writer::write_to_from`] instead.
    pub fn write_to<W, RS>(
        &mut self,
        w: &mut W,
        rs: &mut RS,
        track: &Track,
        start_time: f64,
        end_time: f64,
    ) -> Result<(), WriteStreamError>
    where
        W: Write,
        RS: Read + Seek,
    {
        self.write_stream(w, &mut SeekSource(rs), track, start_time, end_time)
    }

    // Like [`Writer::write_to`], but reads payload through a
    // positional [`ReadAt`] source, which is safe to share between
    // concurrent writers (each with its own Writer).
    pub fn write_to_from<W, R>(
        &mut self,
        w: &mut W,
        ra: &R,
        track: &Track,
        start_time: f64,
        end_time: f64,
    ) -> Result<(), WriteStreamError>
    where
        W: Write,
        R: ReadAt + ?Sized,
    {
        self.write_stream(w, &mut PositionalSource(ra), track, start_time, end_time)
    }

    fn write_stream<W: Write, S: CopySource>(
        &mut self,
        w: &mut W,
        src: &mut S,
        track: &Track,
        start_time: f64,
        end_time: f64,
    ) -> Result<(), WriteStreamError> {
        use WriteStreamError::Write;

        let (first_sample, dts_offset, end_time_scaled) =
            resolve_range(track, start_time, end_time);

        w.write_all(track.init_segment()).map_err(Write)?;

        let samples = track.samples();
        let mut seq_num: u32 = 1;
        let mut sample = first_sample;

        while sample < samples.len() {
            if end_time_scaled > 0 && samples[sample].pts() >= end_time_scaled {
                break;
            }

            let (mdat_size, next_sample, trun_version) = generate_fragment(
                track,
                sample,
                end_time_scaled,
                &mut self.trun_entries,
                &mut self.ranges,
            );
            if self.trun_entries.is_empty() {
                break;
            }

            // tfdt stays version 0: decode times are rebased to the
            // first emitted sample and truncated to 32 bits.
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                clippy::as_conversions
            )]
            let base_media_decode_time = (samples[sample].dts - dts_offset) as u32;

            write_moof(
                w,
                &mut self.moof_buf,
                seq_num,
                track.track_id,
                base_media_decode_time,
                &self.trun_entries,
                trun_version,
            )
            .map_err(Write)?;

            let mut mdat_hdr = [0u8; 8];
            #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
            mdat_hdr[..4].copy_from_slice(&((8 + mdat_size) as u32).to_be_bytes());
            mdat_hdr[4..].copy_from_slice(b"mdat");
            w.write_all(&mdat_hdr).map_err(Write)?;

            for range in &self.ranges {
                src.copy_range(*range, &mut self.copy_buf, w)?;
            }

            seq_num += 1;
            sample = next_sample;
        }

        Ok(())
    }
}

// Resolves the starting sample, the dts rebase offset, and the scaled
// end time. When the sync sample after `start_time` already lies past
// the end time, fall back to the sync sample before it.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn resolve_range(track: &Track, start_time: f64, end_time: f64) -> (usize, i64, i64) {
    let mut first_sample = track.find_sample_after(start_time);
    let samples = track.samples();

    let end_scaled = (end_time * f64::from(track.timescale)) as i64;
    if end_time > 0.0 && first_sample < samples.len() && samples[first_sample].pts() >= end_scaled
    {
        first_sample = track.find_sample_before(start_time);
    }

    let dts_offset = samples.get(first_sample).map_or(0, |s| s.dts);
    let end_time_scaled = if end_time > 0.0 { end_scaled } else { 0 };

    (first_sample, dts_offset, end_time_scaled)
}

// Copies payload ranges from the media source to the sink, retrying
// short reads and writes until each range is fully delivered.
trait CopySource {
    fn copy_range(
        &mut self,
        range: ByteRange,
        copy_buf: &mut [u8],
        w: &mut dyn Write,
    ) -> Result<(), WriteStreamError>;
}

struct SeekSource<'a, RS>(&'a mut RS);

impl<RS: Read + Seek> CopySource for SeekSource<'_, RS> {
    #[allow(clippy::as_conversions)]
    fn copy_range(
        &mut self,
        range: ByteRange,
        copy_buf: &mut [u8],
        w: &mut dyn Write,
    ) -> Result<(), WriteStreamError> {
        use WriteStreamError::*;

        self.0.seek(SeekFrom::Start(range.start)).map_err(Seek)?;
        let mut remaining = range.end - range.start;
        while remaining > 0 {
            let n = usize::try_from(remaining.min(copy_buf.len() as u64))
                .expect("bounded by buffer length");
            let nr = self.0.read(&mut copy_buf[..n]).map_err(Read)?;
            if nr == 0 {
                return Err(SourceTooShort(remaining));
            }
            w.write_all(&copy_buf[..nr]).map_err(Write)?;
            remaining -= nr as u64;
        }
        Ok(())
    }
}

struct PositionalSource<'a, R: ?Sized>(&'a R);

impl<R: ReadAt + ?Sized> CopySource for PositionalSource<'_, R> {
    #[allow(clippy::as_conversions)]
    fn copy_range(
        &mut self,
        range: ByteRange,
        copy_buf: &mut [u8],
        w: &mut dyn Write,
    ) -> Result<(), WriteStreamError> {
        use WriteStreamError::*;

        let mut offset = range.start;
        let mut remaining = range.end - range.start;
        while remaining > 0 {
            let n = usize::try_from(remaining.min(copy_buf.len() as u64))
                .expect("bounded by buffer length");
            let nr = self.0.read_at(&mut copy_buf[..n], offset).map_err(Read)?;
            if nr == 0 {
                return Err(SourceTooShort(remaining));
            }
            w.write_all(&copy_buf[..nr]).map_err(Write)?;
            offset += nr as u64;
            remaining -= nr as u64;
        }
        Ok(())
    }
}

// Writes a complete fragmented MP4 stream with a throwaway [`Writer`].
// For repeated calls, create a Writer once and reuse it instead.
pub fn write_to<W, RS>(
    w: &mut W,
    rs: &mut RS,
    track: &Track,
    start_time: f64,
    end_time: f64,
) -> Result<(), WriteStreamError>
where
    W: Write,
    RS: Read + Seek,
{
    Writer::new().write_to(w, rs, track, start_time, end_time)
}
