// SPDX-License-Identifier: GPL-2.0-or-later

use crate::Sample;
use bmff::{TYPE_CO64, TYPE_CTTS, TYPE_STCO, TYPE_STSC, TYPE_STSS, TYPE_STSZ, TYPE_STTS};
use mp4::Mp4Box;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildSampleTableError {
    #[error("missing stsz")]
    MissingStsz,

    #[error("missing stts")]
    MissingStts,

    #[error("missing stsc")]
    MissingStsc,

    #[error("missing stco/co64")]
    MissingChunkOffsets,

    #[error("stsz lists {stored} sizes for {declared} samples")]
    TruncatedSizeTable { stored: usize, declared: usize },

    #[error("stts exhausted at sample {0}")]
    TimeTableExhausted(usize),

    #[error("stsc exhausted at sample {0}")]
    ChunkMapExhausted(usize),

    #[error("chunk offset table exhausted at chunk {0}")]
    ChunkOffsetsExhausted(u32),
}

// Fuses the sparse stbl tables into a dense per-sample view: one
// forward pass over the sample count declared by stsz, with
// independent cursors over the chunk map, the decode-time table, the
// optional composition offsets, and the optional sync table.
//
// Returns the samples in decode order plus the sample description
// index from the last stsc entry seen.
pub(crate) fn build_sample_table(
    stbl: &Mp4Box,
) -> Result<(Vec<Sample>, u32), BuildSampleTableError> {
    use BuildSampleTableError::*;

    let stsz = stbl.child(TYPE_STSZ).and_then(Mp4Box::stsz).ok_or(MissingStsz)?;
    let stts = stbl.child(TYPE_STTS).and_then(Mp4Box::stts).ok_or(MissingStts)?;
    let stsc = stbl.child(TYPE_STSC).and_then(Mp4Box::stsc).ok_or(MissingStsc)?;

    // Chunk offset table: co64 or stco, at most one present.
    let chunk_offsets: Vec<u64> =
        if let Some(co64) = stbl.child(TYPE_CO64).and_then(Mp4Box::co64) {
            co64.chunk_offsets.clone()
        } else if let Some(stco) = stbl.child(TYPE_STCO).and_then(Mp4Box::stco) {
            stco.chunk_offsets.iter().map(|&v| u64::from(v)).collect()
        } else {
            return Err(MissingChunkOffsets);
        };

    let num_samples = usize::try_from(stsz.sample_count).expect("sample count fits usize");
    if stsz.sample_size == 0 && stsz.entry_sizes.len() < num_samples {
        return Err(TruncatedSizeTable {
            stored: stsz.entry_sizes.len(),
            declared: num_samples,
        });
    }

    let stsc_entries = &stsc.entries;
    let stts_entries = &stts.entries;
    let ctts_entries = stbl
        .child(TYPE_CTTS)
        .and_then(Mp4Box::ctts)
        .map(|c| c.entries.as_slice());
    let sync_numbers = stbl
        .child(TYPE_STSS)
        .and_then(Mp4Box::stss)
        .map(|s| s.sample_numbers.as_slice());

    let mut samples = Vec::with_capacity(num_samples);

    // Chunk cursor.
    let mut sample_in_chunk: u32 = 0;
    let mut chunk: u32 = 0;
    let mut offset_in_chunk: u64 = 0;
    let mut stsc_index: usize = 0;

    // Decode-time cursor.
    let mut dts: i64 = 0;
    let mut stts_index: usize = 0;
    let mut stts_consumed: u32 = 0;

    // Composition-offset cursor.
    let mut ctts_index: usize = 0;
    let mut ctts_consumed: u32 = 0;

    // Sync cursor.
    let mut sync_index: usize = 0;

    let mut default_sdi: u32 = 0;

    for i in 0..num_samples {
        let chunk_entry = *stsc_entries.get(stsc_index).ok_or(ChunkMapExhausted(i))?;
        default_sdi = chunk_entry.sample_description_id;

        let size = if stsz.sample_size != 0 {
            stsz.sample_size
        } else {
            stsz.entry_sizes[i]
        };
        let duration = stts_entries
            .get(stts_index)
            .ok_or(TimeTableExhausted(i))?
            .sample_delta;

        let presentation_offset = ctts_entries
            .map_or(0, |entries| entries.get(ctts_index).map_or(0, |e| e.sample_offset));

        let sample_number = u32::try_from(i + 1).expect("sample number fits u32");
        let sync = sync_numbers.map_or(true, |numbers| {
            numbers.get(sync_index) == Some(&sample_number)
        });

        let chunk_offset = *chunk_offsets
            .get(usize::try_from(chunk).expect("u32 fits usize"))
            .ok_or(ChunkOffsetsExhausted(chunk))?;

        samples.push(Sample {
            offset: chunk_offset + offset_in_chunk,
            size,
            duration,
            dts,
            presentation_offset,
            sync,
        });

        if i + 1 >= num_samples {
            break;
        }

        // Advance the chunk position. The stsc entry switches when the
        // upcoming chunk (1-based) reaches the next entry's first_chunk.
        sample_in_chunk += 1;
        offset_in_chunk += u64::from(size);
        if sample_in_chunk >= chunk_entry.samples_per_chunk {
            sample_in_chunk = 0;
            offset_in_chunk = 0;
            chunk += 1;
            if let Some(next) = stsc_entries.get(stsc_index + 1) {
                if chunk + 1 >= next.first_chunk {
                    stsc_index += 1;
                }
            }
        }

        // Advance decode time.
        dts += i64::from(duration);
        stts_consumed += 1;
        if stts_consumed >= stts_entries[stts_index].sample_count {
            stts_index += 1;
            stts_consumed = 0;
        }

        // Advance the composition offset.
        if let Some(entries) = ctts_entries {
            ctts_consumed += 1;
            if let Some(e) = entries.get(ctts_index) {
                if ctts_consumed >= e.sample_count {
                    ctts_index += 1;
                    ctts_consumed = 0;
                }
            }
        }

        // Advance the sync table.
        if sync {
            sync_index += 1;
        }
    }

    Ok((samples, default_sdi))
}
