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

//! Formatting of decoded MFM tracks in the IBM System 34 layout.
//!
//! A formatted track is a valid input for [`crate::track_scanner::TrackScanner`]: every sector
//! header and sector data record carries a correct CRC.

use crate::{
    crc::crc_ibm_3740,
    track_scanner::{RecordKind, DAM_MARKER_BYTES, IDAM_MARKER_BYTES},
    types::chs::DiskChsn,
    DiskImageError,
};

pub const GAP_BYTE: u8 = 0x4E;
pub const SYNC_BYTE: u8 = 0;

pub const IAM_MARKER_BYTES: [u8; 4] = [0xC2, 0xC2, 0xC2, 0xFC];

pub const IBM_GAP4A: usize = 80;
pub const IBM_GAP1: usize = 50;
pub const IBM_GAP2: usize = 22;
pub const IBM_GAP3_DEFAULT: usize = 22;
pub const SYNC_LEN: usize = 12;

pub struct TrackFormatResult {
    pub track_bytes: Vec<u8>,
    /// The kind and offset of each sector header and sector data marker written.
    pub markers: Vec<(RecordKind, usize)>,
}

/// Format a track of `track_len` bytes containing the sectors in `format_buffer`, in order.
///
/// Sector data is filled by repeating `fill_pattern` across sectors. The track is padded with
/// GAP4B to `track_len`; sectors that would run past `track_len` are truncated, leaving their
/// CRCs behind the end of the track.
pub fn format_track_as_bytes(
    track_len: usize,
    format_buffer: &[DiskChsn],
    fill_pattern: &[u8],
    gap3: usize,
) -> Result<TrackFormatResult, DiskImageError> {
    if fill_pattern.is_empty() {
        log::error!("format_track_as_bytes(): Fill pattern cannot be empty.");
        return Err(DiskImageError::ParameterError);
    }

    let mut track_bytes: Vec<u8> = Vec::with_capacity(track_len);
    let mut markers = Vec::new();

    // Write out GAP4A, sync, IAM marker, and GAP1.
    track_bytes.extend_from_slice(&[GAP_BYTE; IBM_GAP4A]);
    track_bytes.extend_from_slice(&[SYNC_BYTE; SYNC_LEN]);
    track_bytes.extend_from_slice(&IAM_MARKER_BYTES);
    track_bytes.extend_from_slice(&[GAP_BYTE; IBM_GAP1]);

    let mut pat_cursor = 0;

    for sector in format_buffer {
        let Some(sector_size) = sector.n_size()
        else {
            log::error!("format_track_as_bytes(): Invalid sector size for {}", sector);
            return Err(DiskImageError::ParameterError);
        };
        if sector_size > track_len {
            log::error!("format_track_as_bytes(): Sector {} does not fit on track", sector);
            return Err(DiskImageError::ParameterError);
        }

        track_bytes.extend_from_slice(&[SYNC_BYTE; SYNC_LEN]);
        markers.push((RecordKind::IdRecord, track_bytes.len()));
        let idam_crc_offset = track_bytes.len();
        track_bytes.extend_from_slice(&IDAM_MARKER_BYTES);
        track_bytes.extend_from_slice(&sector.to_bytes());

        let crc16 = crc_ibm_3740(&track_bytes[idam_crc_offset..], None);
        track_bytes.extend_from_slice(&crc16.to_be_bytes());

        track_bytes.extend_from_slice(&[GAP_BYTE; IBM_GAP2]);
        track_bytes.extend_from_slice(&[SYNC_BYTE; SYNC_LEN]);

        markers.push((RecordKind::DataRecord, track_bytes.len()));
        let dam_crc_offset = track_bytes.len();
        track_bytes.extend_from_slice(&DAM_MARKER_BYTES);

        let mut written = 0;
        while written < sector_size {
            let copy_len = (sector_size - written).min(fill_pattern.len() - pat_cursor);
            track_bytes.extend_from_slice(&fill_pattern[pat_cursor..pat_cursor + copy_len]);
            pat_cursor = (pat_cursor + copy_len) % fill_pattern.len();
            written += copy_len;
        }

        let crc16 = crc_ibm_3740(&track_bytes[dam_crc_offset..], None);
        track_bytes.extend_from_slice(&crc16.to_be_bytes());

        track_bytes.extend_from_slice(&vec![GAP_BYTE; gap3]);
    }

    // Fill rest of track with GAP4B.
    if track_bytes.len() < track_len {
        track_bytes.resize(track_len, GAP_BYTE);
    }

    if track_bytes.len() > track_len {
        log::warn!(
            "format_track_as_bytes(): Format operation passed index. Truncating track to {} bytes",
            track_len
        );
        track_bytes.truncate(track_len);
        markers.retain(|(_, offset)| *offset < track_len);
    }

    log::trace!(
        "format_track_as_bytes(): Wrote {} markers to track of {} bytes",
        markers.len(),
        track_bytes.len()
    );

    Ok(TrackFormatResult { track_bytes, markers })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MFM_DISK_TRACK_LEN;

    #[test]
    fn test_format_layout() {
        let sectors = [DiskChsn::new(0, 0, 1, 1), DiskChsn::new(0, 0, 2, 1)];
        let result = format_track_as_bytes(MFM_DISK_TRACK_LEN, &sectors, &[0xE5], IBM_GAP3_DEFAULT).unwrap();

        assert_eq!(result.track_bytes.len(), MFM_DISK_TRACK_LEN);
        assert_eq!(result.markers.len(), 4);

        let (kind, idam) = result.markers[0];
        assert_eq!(kind, RecordKind::IdRecord);
        assert_eq!(idam, IBM_GAP4A + SYNC_LEN + 4 + IBM_GAP1 + SYNC_LEN);
        assert_eq!(&result.track_bytes[idam..idam + 8], &[0xA1, 0xA1, 0xA1, 0xFE, 0, 0, 1, 1]);

        let (kind, dam) = result.markers[1];
        assert_eq!(kind, RecordKind::DataRecord);
        assert_eq!(dam, idam + 10 + IBM_GAP2 + SYNC_LEN);
        assert_eq!(&result.track_bytes[dam..dam + 5], &[0xA1, 0xA1, 0xA1, 0xFB, 0xE5]);

        let crc = crc_ibm_3740(&result.track_bytes[dam..dam + 4 + 256], None);
        assert_eq!(&result.track_bytes[dam + 260..dam + 262], &crc.to_be_bytes());
    }

    #[test]
    fn test_fill_pattern_spans_sectors() {
        let sectors = [DiskChsn::new(0, 0, 1, 0), DiskChsn::new(0, 0, 2, 0)];
        let pattern = [1, 2, 3];
        let result = format_track_as_bytes(MFM_DISK_TRACK_LEN, &sectors, &pattern, IBM_GAP3_DEFAULT).unwrap();

        let (_, dam1) = result.markers[1];
        let (_, dam2) = result.markers[3];
        assert_eq!(&result.track_bytes[dam1 + 4..dam1 + 7], &[1, 2, 3]);
        // 128 % 3 == 2, so the second sector continues the pattern at its third byte.
        assert_eq!(&result.track_bytes[dam2 + 4..dam2 + 7], &[3, 1, 2]);
    }

    #[test]
    fn test_empty_fill_pattern_rejected() {
        let sectors = [DiskChsn::new(0, 0, 1, 1)];
        assert!(matches!(
            format_track_as_bytes(MFM_DISK_TRACK_LEN, &sectors, &[], IBM_GAP3_DEFAULT),
            Err(DiskImageError::ParameterError)
        ));
    }

    #[test]
    fn test_overfull_track_truncated() {
        let sectors: Vec<DiskChsn> = (1..=10).map(|s| DiskChsn::new(0, 0, s, 3)).collect();
        let result = format_track_as_bytes(MFM_DISK_TRACK_LEN, &sectors, &[0xE5], IBM_GAP3_DEFAULT).unwrap();

        assert_eq!(result.track_bytes.len(), MFM_DISK_TRACK_LEN);
        assert!(result.markers.len() < 20);
        assert!(result.markers.iter().all(|(_, offset)| *offset < MFM_DISK_TRACK_LEN));
    }
}
