/*
    dskfix
    https://github.com/dbalsom/fluxfox

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------
*/

//! A byte-level scanner for decoded MFM tracks.
//!
//! The scanner shifts each track byte into a 32-bit register and compares the register against
//! the IDAM and DAM sync sequences. When a marker is recognized, the sector header or sector
//! data that follows it is checksummed, and the CRC field after it is compared with the
//! calculated value. The scan position then skips over the whole record, so sync-like byte
//! sequences inside a record body are never seen as markers.
//!
//! The length of a sector data record is taken from the size field (n) of the most recent
//! sector header on the same track.

use crate::{crc::ChecksumEngine, types::chs::DiskChsn, CRC_RELOAD_VALUE};

/// IDAM sync sequence `A1 A1 A1 FE`, as it appears in the shift register.
pub const IDAM_MARKER: u32 = 0xA1A1_A1FE;
/// DAM sync sequence `A1 A1 A1 FB`, as it appears in the shift register.
pub const DAM_MARKER: u32 = 0xA1A1_A1FB;

pub const IDAM_MARKER_BYTES: [u8; 4] = IDAM_MARKER.to_be_bytes();
pub const DAM_MARKER_BYTES: [u8; 4] = DAM_MARKER.to_be_bytes();

pub const MARKER_LEN: usize = 4;
/// Length of the sector ID (c, h, s, n) that follows an IDAM.
pub const SECTOR_ID_LEN: usize = 4;
pub const CRC_LEN: usize = 2;

/// What to do with a DAM found before any sector header on the same track, when the data
/// length is unknown.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OrphanDataPolicy {
    /// Do not treat the DAM as a record.
    #[default]
    Skip,
    /// Treat the DAM as a record whose length is given by this sector size field (n).
    AssumeSizeCode(u8),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanOptions {
    /// Overwrite CRC fields that do not match the calculated CRC. If false, bad CRCs are only
    /// counted.
    pub patch: bool,
    pub orphan_data: OrphanDataPolicy,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            patch: true,
            orphan_data: OrphanDataPolicy::default(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RecordKind {
    #[strum(to_string = "IDAM")]
    IdRecord,
    #[strum(to_string = "DAM")]
    DataRecord,
}

/// A single sector header or sector data record found on a track.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackRecord {
    pub kind: RecordKind,
    /// Offset of the first marker byte within the track.
    pub offset: usize,
    /// The sector ID of this header, or for sector data, the sector ID of the preceding header.
    /// None for sector data scanned under [`OrphanDataPolicy::AssumeSizeCode`].
    pub chsn: Option<DiskChsn>,
    /// The CRC stored in the track before the scan.
    pub recorded: u16,
    pub calculated: u16,
    pub patched: bool,
}

impl TrackRecord {
    #[inline]
    pub fn crc_valid(&self) -> bool {
        self.recorded == self.calculated
    }
}

/// The result of scanning a single track.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanResult {
    /// Number of records found.
    pub found: usize,
    /// Number of records with a CRC that did not match the calculated CRC.
    pub mismatched: usize,
    /// Number of CRC fields that were rewritten.
    pub patched: usize,
    pub records: Vec<TrackRecord>,
}

impl ScanResult {
    /// Returns true if every CRC on the track matched before the scan.
    pub fn is_consistent(&self) -> bool {
        self.mismatched == 0
    }

    /// Iterate over the records with bad CRCs.
    pub fn bad_records(&self) -> impl Iterator<Item = &TrackRecord> {
        self.records.iter().filter(|r| !r.crc_valid())
    }

    fn push(&mut self, record: TrackRecord) {
        self.found += 1;
        if !record.crc_valid() {
            self.mismatched += 1;
        }
        if record.patched {
            self.patched += 1;
        }
        self.records.push(record);
    }
}

/// Verifies and repairs the CRCs of the records of a decoded track.
///
/// A scanner borrows its [`ChecksumEngine`] mutably, resetting it at the start of each record,
/// so a single engine can be shared by successive scans.
pub struct TrackScanner<'a> {
    engine:  &'a mut ChecksumEngine,
    options: ScanOptions,
}

impl<'a> TrackScanner<'a> {
    pub fn new(engine: &'a mut ChecksumEngine, options: ScanOptions) -> Self {
        Self { engine, options }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scan `track` for sector headers and sector data, checking the CRC of each.
    ///
    /// Bad CRC fields are overwritten with the calculated CRC if [`ScanOptions::patch`] is set.
    /// No other byte of `track` is modified. Markers too close to the end of the track to hold
    /// their record are ignored.
    pub fn scan(&mut self, track: &mut [u8]) -> ScanResult {
        let mut result = ScanResult::default();
        let mut shift_reg: u32 = 0;
        let mut last_id: Option<DiskChsn> = None;
        let mut p = 0;

        while p < track.len() {
            shift_reg = (shift_reg << 8) | track[p] as u32;
            p += 1;
            let remaining = track.len() - p;

            match shift_reg {
                IDAM_MARKER if remaining >= SECTOR_ID_LEN + CRC_LEN => {
                    let mut id_bytes = [0u8; SECTOR_ID_LEN];
                    id_bytes.copy_from_slice(&track[p..p + SECTOR_ID_LEN]);
                    let chsn = DiskChsn::from(id_bytes);
                    last_id = Some(chsn);

                    self.seed(shift_reg);
                    self.engine.add_bytes(&id_bytes);

                    let record = self.check_crc(track, RecordKind::IdRecord, p - MARKER_LEN, p + SECTOR_ID_LEN, Some(chsn));
                    result.push(record);
                    p += SECTOR_ID_LEN + CRC_LEN;
                }
                DAM_MARKER => {
                    let size_code = match (last_id, self.options.orphan_data) {
                        (Some(chsn), _) => chsn.n(),
                        (None, OrphanDataPolicy::AssumeSizeCode(n)) => n,
                        (None, OrphanDataPolicy::Skip) => {
                            log::debug!("scan(): Skipping DAM at offset {} with no preceding IDAM", p - MARKER_LEN);
                            continue;
                        }
                    };

                    let data_len = match DiskChsn::n_to_bytes(size_code) {
                        Some(len) if len.checked_add(CRC_LEN).is_some_and(|len| remaining >= len) => len,
                        _ => {
                            log::trace!(
                                "scan(): DAM at offset {} with size code {} would overrun track",
                                p - MARKER_LEN,
                                size_code
                            );
                            continue;
                        }
                    };

                    self.seed(shift_reg);
                    self.engine.add_bytes(&track[p..p + data_len]);

                    let record = self.check_crc(track, RecordKind::DataRecord, p - MARKER_LEN, p + data_len, last_id);
                    result.push(record);
                    p += data_len + CRC_LEN;
                }
                _ => {}
            }
        }

        log::trace!(
            "scan(): Found {} records, {} bad CRCs, {} patched",
            result.found,
            result.mismatched,
            result.patched
        );
        result
    }

    /// Reset the engine and add the four marker bytes held in the shift register.
    fn seed(&mut self, marker: u32) {
        self.engine.reset(CRC_RELOAD_VALUE);
        self.engine.add_u32_be(marker);
    }

    fn check_crc(
        &mut self,
        track: &mut [u8],
        kind: RecordKind,
        offset: usize,
        crc_offset: usize,
        chsn: Option<DiskChsn>,
    ) -> TrackRecord {
        let crc_field = &mut track[crc_offset..crc_offset + CRC_LEN];
        let recorded = u16::from_be_bytes([crc_field[0], crc_field[1]]);
        let calculated = self.engine.value();

        let mut patched = false;
        if recorded != calculated {
            log::debug!(
                "scan(): {} at offset {} {}: recorded CRC {:04X} != calculated {:04X}",
                kind,
                offset,
                chsn.map(|c| c.to_string()).unwrap_or_else(|| "[no id]".to_string()),
                recorded,
                calculated
            );
            if self.options.patch {
                crc_field.copy_from_slice(&calculated.to_be_bytes());
                patched = true;
            }
        }

        TrackRecord {
            kind,
            offset,
            chsn,
            recorded,
            calculated,
            patched,
        }
    }
}

/// Scan `track` with a new CRC-16/IBM-3740 engine.
pub fn scan_track(track: &mut [u8], options: ScanOptions) -> ScanResult {
    let mut engine = ChecksumEngine::default();
    TrackScanner::new(&mut engine, options).scan(track)
}
