use crate::{be_u32, be_u64, BoxType};
use std::io::{Read, Seek, SeekFrom};
use thiserror::Error;

// A top-level box discovered by the Scanner.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScanEntry {
    pub box_type: BoxType,
    // Total box size including header.
    pub size: u64,
    // Byte offset from the start of the stream.
    pub offset: u64,
    // Header size (8 or 16 bytes).
    pub header_size: u8,
}

impl ScanEntry {
    // Size of the box data, excluding the header.
    #[must_use]
    pub fn data_size(&self) -> u64 {
        self.size - u64::from(self.header_size)
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("read header: {0}")]
    Read(std::io::Error),

    #[error("seek: {0}")]
    Seek(std::io::Error),

    #[error("box size {size} at offset {offset} is smaller than its header")]
    BadSize { size: u64, offset: u64 },
}

// Scanner reads top-level box headers from a seekable source without
// loading box contents into memory. This lets callers discover box
// positions and sizes, then selectively read only the boxes they need
// (e.g. moov) into a buffer for parsing with [`crate::Reader`].
//
// ```no_run
// # use std::fs::File;
// let file = File::open("video.mp4").unwrap();
// let mut sc = bmff::Scanner::new(file);
// while sc.next() {
//     let entry = sc.entry();
//     if entry.box_type == bmff::TYPE_MOOV {
//         let mut buf = vec![0; usize::try_from(entry.data_size()).unwrap()];
//         sc.read_body(&mut buf).unwrap();
//         // parse moov contents...
//     }
// }
// assert!(sc.err().is_none());
// ```
pub struct Scanner<RS> {
    rs: RS,
    hdr: [u8; 16],
    entry: ScanEntry,
    err: Option<ScanError>,
    // Current position in the stream.
    pos: u64,
    done: bool,
}

impl<RS: Read + Seek> Scanner<RS> {
    pub fn new(rs: RS) -> Self {
        Self {
            rs,
            hdr: [0; 16],
            entry: ScanEntry::default(),
            err: None,
            pos: 0,
            done: false,
        }
    }

    pub fn into_inner(self) -> RS {
        self.rs
    }

    // Advances to the next top-level box. Returns false when there are
    // no more boxes or an error occurred. Check `err()` after the loop.
    pub fn next(&mut self) -> bool {
        if self.done {
            return false;
        }

        // A short read before the minimum 8-byte header is a clean
        // end-of-stream, not a failure.
        if let Err(e) = self.rs.read_exact(&mut self.hdr[..8]) {
            if e.kind() != std::io::ErrorKind::UnexpectedEof {
                self.err = Some(ScanError::Read(e));
            }
            self.done = true;
            return false;
        }

        let box_start = self.pos;
        let mut size = u64::from(be_u32(&self.hdr, 0));
        let mut box_type: BoxType = [0; 4];
        box_type.copy_from_slice(&self.hdr[4..8]);

        let mut header_size: u8 = 8;

        if size == 1 {
            // Extended 64-bit size.
            if let Err(e) = self.rs.read_exact(&mut self.hdr[8..16]) {
                self.err = Some(ScanError::Read(e));
                self.done = true;
                return false;
            }
            size = be_u64(&self.hdr, 8);
            header_size = 16;
        }

        if size == 0 {
            // Box extends to the end of the stream.
            match self.resolve_end_size(box_start) {
                Ok(v) => size = v,
                Err(e) => {
                    self.err = Some(e);
                    self.done = true;
                    return false;
                }
            }
        }

        if size < u64::from(header_size) {
            self.err = Some(ScanError::BadSize {
                size,
                offset: box_start,
            });
            self.done = true;
            return false;
        }

        self.entry = ScanEntry {
            box_type,
            size,
            offset: box_start,
            header_size,
        };

        // Skip past this box's data to position for the next call.
        let data_size = size - u64::from(header_size);
        if data_size > 0 {
            #[allow(clippy::cast_possible_wrap, clippy::as_conversions)]
            if let Err(e) = self.rs.seek(SeekFrom::Current(data_size as i64)) {
                self.err = Some(ScanError::Seek(e));
                self.done = true;
                return false;
            }
        }
        self.pos = box_start + size;

        true
    }

    // Determines the size of a box that runs to end-of-stream, then
    // restores the read position.
    fn resolve_end_size(&mut self, box_start: u64) -> Result<u64, ScanError> {
        let cur = self.rs.stream_position().map_err(ScanError::Seek)?;
        let end = self.rs.seek(SeekFrom::End(0)).map_err(ScanError::Seek)?;
        self.rs.seek(SeekFrom::Start(cur)).map_err(ScanError::Seek)?;
        Ok(end - box_start)
    }

    // The current box entry. Only valid after `next` returned true.
    #[must_use]
    pub fn entry(&self) -> ScanEntry {
        self.entry
    }

    // The first non-EOF error encountered by the scanner.
    #[must_use]
    pub fn err(&self) -> Option<&ScanError> {
        self.err.as_ref()
    }

    // Consumes the scanner, yielding the stored error if any.
    #[must_use]
    pub fn into_err(self) -> Option<ScanError> {
        self.err
    }

    // Reads the current box's data (excluding header) into buf. The
    // buffer must be exactly `data_size()` bytes. The read position is
    // restored afterwards so that subsequent `next` calls continue past
    // the current box.
    pub fn read_body(&mut self, buf: &mut [u8]) -> Result<(), std::io::Error> {
        let data_offset = self.entry.offset + u64::from(self.entry.header_size);
        self.read_range(data_offset, buf)
    }

    // Reads the current box's full bytes (including header) into buf.
    // The buffer must be exactly `size` bytes.
    pub fn read_box(&mut self, buf: &mut [u8]) -> Result<(), std::io::Error> {
        let offset = self.entry.offset;
        self.read_range(offset, buf)
    }

    fn read_range(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), std::io::Error> {
        // The saved position is past the current box.
        let saved = self.pos;

        self.rs.seek(SeekFrom::Start(offset))?;
        self.rs.read_exact(buf)?;
        self.rs.seek(SeekFrom::Start(saved))?;
        Ok(())
    }
}
