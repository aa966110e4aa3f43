//! Region archive: a 32×32 grid of independently compressed chunk records.
//!
//! File layout (all big-endian):
//! - sector 0: 1024 location entries, `offset:u24 | sector_count:u8`, 0 = absent
//! - sector 1: 1024 last-modified timestamps (`u32` seconds)
//! - sector 2..: chunk records, `length:u32, scheme:u8, data[length - 1]`,
//!   zero-padded to a whole number of 4096-byte sectors
//!
//! Slot `(cx, cz)` lives at index `cx + cz * 32` in both tables. New records
//! are always appended after the last used sector; space released by a
//! rewritten slot is never reused.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::coords::REGION_CHUNK_EDGE;

pub const SECTOR_BYTES: usize = 4096;
pub const SLOT_COUNT: usize = (REGION_CHUNK_EDGE * REGION_CHUNK_EDGE) as usize;
pub const SCHEME_ZLIB: u8 = 2;

const HEADER_SECTORS: u32 = 2;
const HEADER_BYTES: usize = HEADER_SECTORS as usize * SECTOR_BYTES;
const RECORD_HEADER_BYTES: usize = 5;
const MAX_SECTOR_COUNT: usize = 0xff;
const MAX_SECTOR_OFFSET: u32 = 0x00ff_ffff;

#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("malformed region header: {reason}")]
    MalformedHeader { reason: String },
    #[error("chunk ({cx}, {cz}) is truncated: {reason}")]
    Truncated { cx: usize, cz: usize, reason: String },
    #[error("chunk ({cx}, {cz}) uses unsupported compression scheme {scheme}")]
    UnsupportedScheme { cx: usize, cz: usize, scheme: u8 },
    #[error("chunk ({cx}, {cz}) failed to decompress: {source}")]
    Decompress {
        cx: usize,
        cz: usize,
        #[source]
        source: io::Error,
    },
    #[error("slot ({cx}, {cz}) is outside the 32x32 grid")]
    SlotOutOfRange { cx: usize, cz: usize },
    #[error("chunk ({cx}, {cz}) needs {sectors} sectors; at most 255 fit in one record")]
    ChunkTooLarge { cx: usize, cz: usize, sectors: usize },
    #[error("archive is full: sector offset {offset} does not fit in 24 bits")]
    ArchiveFull { offset: u64 },
    #[error("archive was opened read-only")]
    ReadOnly,
}

pub type RegionResult<T> = Result<T, RegionError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Location {
    sector_offset: u32,
    sector_count: u32,
}

impl Location {
    fn decode(entry: u32) -> Option<Self> {
        if entry == 0 {
            return None;
        }
        Some(Self {
            sector_offset: entry >> 8,
            sector_count: entry & 0xff,
        })
    }

    fn encode(self) -> u32 {
        (self.sector_offset << 8) | (self.sector_count & 0xff)
    }
}

/// An open region file. The handle is released when the archive is closed or
/// dropped; a dirty archive that is dropped without [`RegionArchive::close`]
/// still flushes its tables.
#[derive(Debug)]
pub struct RegionArchive {
    path: PathBuf,
    file: File,
    locations: Box<[u32; SLOT_COUNT]>,
    timestamps: Box<[u32; SLOT_COUNT]>,
    file_len: u64,
    next_sector: u32,
    writable: bool,
    dirty: bool,
}

impl RegionArchive {
    /// Opens an existing archive for reading. A zero-length file is an empty
    /// archive.
    pub fn open(path: &Path) -> RegionResult<Self> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut locations = Box::new([0u32; SLOT_COUNT]);
        let mut timestamps = Box::new([0u32; SLOT_COUNT]);

        if file_len > 0 {
            if file_len < HEADER_BYTES as u64 {
                return Err(RegionError::MalformedHeader {
                    reason: format!(
                        "{} is {file_len} bytes, shorter than the {HEADER_BYTES} byte header",
                        path.display()
                    ),
                });
            }
            let mut header = vec![0u8; HEADER_BYTES];
            file.read_exact(&mut header)?;
            let (location_bytes, timestamp_bytes) = header.split_at(SECTOR_BYTES);
            read_table(location_bytes, &mut locations);
            read_table(timestamp_bytes, &mut timestamps);
        }

        let used_sectors = file_len.div_ceil(SECTOR_BYTES as u64);
        let next_sector = u32::try_from(used_sectors.max(HEADER_SECTORS as u64))
            .map_err(|_| RegionError::ArchiveFull {
                offset: used_sectors,
            })?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            locations,
            timestamps,
            file_len,
            next_sector,
            writable: false,
            dirty: false,
        })
    }

    /// Creates (or truncates) an archive for writing. The file always ends up
    /// with a full header, even when no chunk is written.
    pub fn create(path: &Path) -> RegionResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            locations: Box::new([0u32; SLOT_COUNT]),
            timestamps: Box::new([0u32; SLOT_COUNT]),
            file_len: 0,
            next_sector: HEADER_SECTORS,
            writable: true,
            dirty: true,
        })
    }

    pub fn has_chunk(&self, cx: usize, cz: usize) -> bool {
        slot_index(cx, cz)
            .map(|index| self.locations[index] != 0)
            .unwrap_or(false)
    }

    pub fn timestamp(&self, cx: usize, cz: usize) -> RegionResult<u32> {
        Ok(self.timestamps[slot_index(cx, cz)?])
    }

    pub fn chunk_count(&self) -> usize {
        self.locations.iter().filter(|entry| **entry != 0).count()
    }

    /// Occupied slots in row-major order (`cz` outer, `cx` inner).
    pub fn occupied_slots(&self) -> Vec<(usize, usize)> {
        let edge = REGION_CHUNK_EDGE as usize;
        (0..SLOT_COUNT)
            .filter(|index| self.locations[*index] != 0)
            .map(|index| (index % edge, index / edge))
            .collect()
    }

    /// Returns the decompressed payload of a slot, or `None` if the slot is
    /// empty.
    pub fn read_chunk(&mut self, cx: usize, cz: usize) -> RegionResult<Option<Vec<u8>>> {
        let index = slot_index(cx, cz)?;
        let Some(location) = Location::decode(self.locations[index]) else {
            return Ok(None);
        };
        if location.sector_offset < HEADER_SECTORS || location.sector_count == 0 {
            return Err(RegionError::MalformedHeader {
                reason: format!(
                    "slot ({cx}, {cz}) points at sector {} with {} sectors",
                    location.sector_offset, location.sector_count
                ),
            });
        }

        let start = location.sector_offset as u64 * SECTOR_BYTES as u64;
        let allocated = location.sector_count as usize * SECTOR_BYTES;
        if start + RECORD_HEADER_BYTES as u64 > self.file_len {
            return Err(RegionError::Truncated {
                cx,
                cz,
                reason: format!(
                    "sector {} starts past end of file ({} bytes)",
                    location.sector_offset, self.file_len
                ),
            });
        }

        self.file.seek(SeekFrom::Start(start))?;
        let mut record_header = [0u8; RECORD_HEADER_BYTES];
        self.file.read_exact(&mut record_header)?;
        let length = u32::from_be_bytes([
            record_header[0],
            record_header[1],
            record_header[2],
            record_header[3],
        ]) as usize;
        let scheme = record_header[4];
        if length == 0 || length + 4 > allocated {
            return Err(RegionError::Truncated {
                cx,
                cz,
                reason: format!(
                    "record length {length} does not fit in {} allocated sectors",
                    location.sector_count
                ),
            });
        }
        // The last record of a file is not always padded out to its sector
        // boundary, so only the record bytes themselves must be present.
        if start + 4 + length as u64 > self.file_len {
            return Err(RegionError::Truncated {
                cx,
                cz,
                reason: format!(
                    "record of {length} bytes extends past end of file ({} bytes)",
                    self.file_len
                ),
            });
        }
        if scheme != SCHEME_ZLIB {
            return Err(RegionError::UnsupportedScheme { cx, cz, scheme });
        }

        let mut compressed = vec![0u8; length - 1];
        self.file.read_exact(&mut compressed)?;

        let mut payload = Vec::new();
        ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut payload)
            .map_err(|source| RegionError::Decompress { cx, cz, source })?;
        Ok(Some(payload))
    }

    pub fn write_chunk(&mut self, cx: usize, cz: usize, payload: &[u8]) -> RegionResult<()> {
        self.write_chunk_with_timestamp(cx, cz, payload, now_unix_secs())
    }

    /// Compresses `payload` and appends it as a new record, pointing the slot
    /// at it. Any record the slot previously referenced stays in the file.
    pub fn write_chunk_with_timestamp(
        &mut self,
        cx: usize,
        cz: usize,
        payload: &[u8],
        timestamp: u32,
    ) -> RegionResult<()> {
        if !self.writable {
            return Err(RegionError::ReadOnly);
        }
        let index = slot_index(cx, cz)?;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload)?;
        let compressed = encoder.finish()?;

        let record_len = RECORD_HEADER_BYTES + compressed.len();
        let sectors = record_len.div_ceil(SECTOR_BYTES);
        if sectors > MAX_SECTOR_COUNT {
            return Err(RegionError::ChunkTooLarge { cx, cz, sectors });
        }
        let sector_offset = self.next_sector;
        let end_sector = sector_offset as u64 + sectors as u64;
        if end_sector > MAX_SECTOR_OFFSET as u64 {
            return Err(RegionError::ArchiveFull { offset: end_sector });
        }

        let mut record = Vec::with_capacity(sectors * SECTOR_BYTES);
        record.extend_from_slice(&((compressed.len() + 1) as u32).to_be_bytes());
        record.push(SCHEME_ZLIB);
        record.extend_from_slice(&compressed);
        record.resize(sectors * SECTOR_BYTES, 0);

        self.file
            .seek(SeekFrom::Start(sector_offset as u64 * SECTOR_BYTES as u64))?;
        self.file.write_all(&record)?;

        self.locations[index] = Location {
            sector_offset,
            sector_count: sectors as u32,
        }
        .encode();
        self.timestamps[index] = timestamp;
        self.next_sector = end_sector as u32;
        self.file_len = self.file_len.max(end_sector * SECTOR_BYTES as u64);
        self.dirty = true;
        Ok(())
    }

    /// Flushes both tables and sizes the file to a whole number of sectors.
    pub fn close(mut self) -> RegionResult<()> {
        if self.dirty {
            self.flush_header()?;
        }
        Ok(())
    }

    fn flush_header(&mut self) -> RegionResult<()> {
        let mut header = Vec::with_capacity(HEADER_BYTES);
        for entry in self.locations.iter() {
            header.extend_from_slice(&entry.to_be_bytes());
        }
        for entry in self.timestamps.iter() {
            header.extend_from_slice(&entry.to_be_bytes());
        }
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header)?;
        let padded_len = self.next_sector as u64 * SECTOR_BYTES as u64;
        self.file.set_len(padded_len)?;
        self.file.flush()?;
        self.file.sync_data()?;
        self.file_len = padded_len;
        self.dirty = false;
        Ok(())
    }
}

impl Drop for RegionArchive {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(error) = self.flush_header() {
                log::warn!(
                    "failed to flush region header for {}: {error}",
                    self.path.display()
                );
            }
        }
    }
}

fn slot_index(cx: usize, cz: usize) -> RegionResult<usize> {
    let edge = REGION_CHUNK_EDGE as usize;
    if cx >= edge || cz >= edge {
        return Err(RegionError::SlotOutOfRange { cx, cz });
    }
    Ok(cx + cz * edge)
}

fn read_table(bytes: &[u8], table: &mut [u32; SLOT_COUNT]) {
    for (entry, word) in table.iter_mut().zip(bytes.chunks_exact(4)) {
        *entry = u32::from_be_bytes([word[0], word[1], word[2], word[3]]);
    }
}

fn now_unix_secs() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs().min(u32::MAX as u64) as u32
}
