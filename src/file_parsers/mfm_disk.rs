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

    src/file_parsers/mfm_disk.rs

    A parser for the Oric MFM_DISK image format.

    MFM_DISK images open with a 256-byte header. The first eight bytes are the
    ASCII signature "MFM_DISK", followed by a 32-bit little-endian head count,
    a 32-bit little-endian track count and a 32-bit little-endian geometry type:
    1 if all the tracks of one side are stored contiguously, then all the
    tracks of the next side; 2 if all the sides of one track are stored
    contiguously, then all the sides of the next track.

    Each track then occupies 6400 bytes, of which the first 6250 are the
    decoded track contents. Clock bits are not stored, and bytes are aligned
    as they would be read by a disk controller.
*/
use crate::{
    crc::ChecksumEngine,
    io::{Read, ReadSeek, ReadWriteSeek, Seek, SeekFrom, Write},
    track_scanner::{OrphanDataPolicy, ScanOptions, ScanResult, TrackRecord, TrackScanner},
    types::chs::DiskCh,
    util::get_length,
    DiskImageError,
    CRC_POLYNOMIAL,
};
use binrw::{binrw, BinRead, BinWrite};

pub const MFM_DISK_SIGNATURE: &[u8; 8] = b"MFM_DISK";
pub const MFM_DISK_HEADER_LEN: usize = 256;
pub const MFM_DISK_TRACK_LEN: usize = 6250;
/// Unused bytes following the contents of each track.
pub const MFM_DISK_TRACK_GAP: usize = 150;
pub const MFM_DISK_TRACK_STRIDE: usize = MFM_DISK_TRACK_LEN + MFM_DISK_TRACK_GAP;

/// Return the offset of the track with the given index from the start of the image.
#[inline]
pub fn track_offset(index: usize) -> u64 {
    (MFM_DISK_HEADER_LEN + index * MFM_DISK_TRACK_STRIDE) as u64
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MfmDiskGeometry {
    #[strum(to_string = "Sides sequential")]
    SidesSequential,
    #[strum(to_string = "Tracks interleaved")]
    TracksInterleaved,
    #[strum(to_string = "Unknown ({0})")]
    Unknown(u32),
}

impl From<u32> for MfmDiskGeometry {
    fn from(value: u32) -> Self {
        match value {
            1 => MfmDiskGeometry::SidesSequential,
            2 => MfmDiskGeometry::TracksInterleaved,
            _ => MfmDiskGeometry::Unknown(value),
        }
    }
}

impl From<MfmDiskGeometry> for u32 {
    fn from(geometry: MfmDiskGeometry) -> Self {
        match geometry {
            MfmDiskGeometry::SidesSequential => 1,
            MfmDiskGeometry::TracksInterleaved => 2,
            MfmDiskGeometry::Unknown(value) => value,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(little)]
pub struct MfmDiskHeader {
    id: [u8; 8],
    head_ct: u32,
    track_ct: u32,
    geometry: u32,
}

impl MfmDiskHeader {
    pub fn new(head_ct: u32, track_ct: u32, geometry: MfmDiskGeometry) -> Self {
        Self {
            id: *MFM_DISK_SIGNATURE,
            head_ct,
            track_ct,
            geometry: geometry.into(),
        }
    }

    /// Read the header from the start of `image`.
    pub fn parse<RS: ReadSeek>(image: &mut RS) -> Result<Self, DiskImageError> {
        image.seek(SeekFrom::Start(0))?;
        let header = MfmDiskHeader::read(image)?;

        if &header.id != MFM_DISK_SIGNATURE {
            log::trace!("parse(): MFM_DISK signature not found.");
            return Err(DiskImageError::UnknownFormat);
        }

        log::trace!(
            "parse(): Heads: {} Tracks: {} Geometry: {}",
            header.head_ct,
            header.track_ct,
            header.geometry()
        );
        Ok(header)
    }

    /// Write the header to the start of `image`, padded to its full length.
    pub fn write_to<WS: Write + Seek>(&self, image: &mut WS) -> Result<(), DiskImageError> {
        image.seek(SeekFrom::Start(0))?;
        self.write(image)?;
        let written = image.stream_position()? as usize;
        image.write_all(&vec![0u8; MFM_DISK_HEADER_LEN.saturating_sub(written)])?;
        Ok(())
    }

    pub fn head_ct(&self) -> u32 {
        self.head_ct
    }

    pub fn track_ct(&self) -> u32 {
        self.track_ct
    }

    pub fn geometry(&self) -> MfmDiskGeometry {
        MfmDiskGeometry::from(self.geometry)
    }

    /// Return the physical track stored at `index`, according to the header's geometry.
    /// Returns None if the geometry is unknown or the header's counts cannot map the index.
    pub fn track_ch(&self, index: usize) -> Option<DiskCh> {
        let (c, h) = match self.geometry() {
            MfmDiskGeometry::SidesSequential if self.track_ct > 0 => {
                (index % self.track_ct as usize, index / self.track_ct as usize)
            }
            MfmDiskGeometry::TracksInterleaved if self.head_ct > 0 => {
                (index / self.head_ct as usize, index % self.head_ct as usize)
            }
            _ => return None,
        };
        Some(DiskCh::new(u16::try_from(c).ok()?, u8::try_from(h).ok()?))
    }
}

/// Options controlling a repair pass over an image.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FixOptions {
    /// Check CRCs only. No track is modified or written.
    pub dry_run: bool,
    pub orphan_data: OrphanDataPolicy,
}

impl FixOptions {
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            patch: !self.dry_run,
            orphan_data: self.orphan_data,
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackFixReport {
    pub index: usize,
    /// The physical track, if the image geometry is known.
    pub ch: Option<DiskCh>,
    pub offset: u64,
    pub result: ScanResult,
    /// Whether the track was written back to the image.
    pub written: bool,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageFixReport {
    pub tracks: Vec<TrackFixReport>,
}

impl ImageFixReport {
    pub fn track_ct(&self) -> usize {
        self.tracks.len()
    }

    /// Total number of CRCs checked.
    pub fn found(&self) -> usize {
        self.tracks.iter().map(|t| t.result.found).sum()
    }

    pub fn mismatched(&self) -> usize {
        self.tracks.iter().map(|t| t.result.mismatched).sum()
    }

    pub fn patched(&self) -> usize {
        self.tracks.iter().map(|t| t.result.patched).sum()
    }

    pub fn tracks_written(&self) -> usize {
        self.tracks.iter().filter(|t| t.written).count()
    }

    /// Iterate over every record with a bad CRC, along with the report of the track holding it.
    pub fn bad_records(&self) -> impl Iterator<Item = (&TrackFixReport, &TrackRecord)> {
        self.tracks
            .iter()
            .flat_map(|t| t.result.bad_records().map(move |record| (t, record)))
    }
}

pub struct MfmDiskFormat;

impl MfmDiskFormat {
    pub fn extensions() -> Vec<&'static str> {
        vec!["dsk", "mfm"]
    }

    /// Returns true if `image` starts with the MFM_DISK signature.
    pub fn detect<RS: ReadSeek>(mut image: RS) -> bool {
        let mut id = [0u8; 8];
        if image.seek(SeekFrom::Start(0)).is_err() {
            return false;
        }
        image.read_exact(&mut id).is_ok() && &id == MFM_DISK_SIGNATURE
    }
}

/// An open MFM_DISK image.
///
/// The head and track counts in the header are informational. Every complete track present
/// in the image is processed, in the order stored.
pub struct MfmDiskImage<RS> {
    io: RS,
    header: MfmDiskHeader,
    track_ct: usize,
}

impl<RS: ReadSeek> MfmDiskImage<RS> {
    pub fn open(mut io: RS) -> Result<Self, DiskImageError> {
        let header = MfmDiskHeader::parse(&mut io)?;
        let length = get_length(&mut io)? as usize;

        let track_ct = match length.checked_sub(MFM_DISK_HEADER_LEN + MFM_DISK_TRACK_LEN) {
            Some(remain) => remain / MFM_DISK_TRACK_STRIDE + 1,
            None => 0,
        };

        let expected_ct = header.head_ct as usize * header.track_ct as usize;
        if expected_ct != track_ct {
            log::warn!(
                "open(): Header specifies {} heads of {} tracks, but image contains {} tracks",
                header.head_ct,
                header.track_ct,
                track_ct
            );
        }

        Ok(Self { io, header, track_ct })
    }

    pub fn header(&self) -> &MfmDiskHeader {
        &self.header
    }

    /// Return the number of complete tracks in the image.
    pub fn track_ct(&self) -> usize {
        self.track_ct
    }

    pub fn into_inner(self) -> RS {
        self.io
    }

    pub fn read_track(&mut self, index: usize) -> Result<Vec<u8>, DiskImageError> {
        let mut track = vec![0u8; MFM_DISK_TRACK_LEN];
        self.read_track_into(index, &mut track)?;
        Ok(track)
    }

    pub fn read_track_into(&mut self, index: usize, track: &mut [u8]) -> Result<(), DiskImageError> {
        if index >= self.track_ct || track.len() != MFM_DISK_TRACK_LEN {
            log::error!("read_track_into(): Invalid track {} or buffer length {}", index, track.len());
            return Err(DiskImageError::ParameterError);
        }
        self.io.seek(SeekFrom::Start(track_offset(index)))?;
        self.io.read_exact(track)?;
        Ok(())
    }

    /// Check the CRCs of every track without modifying the image.
    pub fn check_tracks(&mut self, options: &FixOptions) -> Result<ImageFixReport, DiskImageError> {
        let scan_options = ScanOptions {
            patch: false,
            ..options.scan_options()
        };
        self.process_tracks(scan_options, |_, _, _| Ok(false))
    }

    fn process_tracks<F>(&mut self, scan_options: ScanOptions, mut write_back: F) -> Result<ImageFixReport, DiskImageError>
    where
        F: FnMut(&mut RS, usize, &[u8]) -> Result<bool, DiskImageError>,
    {
        let mut engine = ChecksumEngine::new(CRC_POLYNOMIAL);
        let mut track = vec![0u8; MFM_DISK_TRACK_LEN];
        let mut report = ImageFixReport::default();

        for index in 0..self.track_ct {
            self.read_track_into(index, &mut track)?;

            let result = TrackScanner::new(&mut engine, scan_options).scan(&mut track);
            let ch = self.header.track_ch(index);

            log::debug!(
                "Track {} {}: {} CRCs checked, {} bad, {} patched",
                index,
                ch.map(|ch| ch.to_string()).unwrap_or_default(),
                result.found,
                result.mismatched,
                result.patched
            );

            let written = match result.patched {
                0 => false,
                _ => write_back(&mut self.io, index, &track)?,
            };

            report.tracks.push(TrackFixReport {
                index,
                ch,
                offset: track_offset(index),
                result,
                written,
            });
        }

        Ok(report)
    }
}

impl<RWS: ReadWriteSeek> MfmDiskImage<RWS> {
    /// Repair the CRCs of every track, writing back each track that was patched.
    /// If `options.dry_run` is set, this is equivalent to [`MfmDiskImage::check_tracks`].
    pub fn fix_tracks(&mut self, options: &FixOptions) -> Result<ImageFixReport, DiskImageError> {
        if options.dry_run {
            return self.check_tracks(options);
        }

        let report = self.process_tracks(options.scan_options(), |io, index, track| {
            write_track_at(io, index, track)?;
            Ok(true)
        })?;
        self.io.flush()?;

        Ok(report)
    }

    pub fn write_track(&mut self, index: usize, track: &[u8]) -> Result<(), DiskImageError> {
        if index >= self.track_ct || track.len() != MFM_DISK_TRACK_LEN {
            log::error!("write_track(): Invalid track {} or buffer length {}", index, track.len());
            return Err(DiskImageError::ParameterError);
        }
        write_track_at(&mut self.io, index, track)
    }
}

fn write_track_at<WS: Write + Seek>(io: &mut WS, index: usize, track: &[u8]) -> Result<(), DiskImageError> {
    log::trace!("write_track_at(): Writing track {} at offset {}", index, track_offset(index));
    io.seek(SeekFrom::Start(track_offset(index)))?;
    io.write_all(track)?;
    Ok(())
}

/// Open `image` as an MFM_DISK image and repair the CRCs of all its tracks.
pub fn fix_image<RWS: ReadWriteSeek>(image: RWS, options: &FixOptions) -> Result<ImageFixReport, DiskImageError> {
    let mut disk = MfmDiskImage::open(image)?;
    disk.fix_tracks(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        io::Cursor,
        track_format::{format_track_as_bytes, IBM_GAP3_DEFAULT},
        types::chs::DiskChsn,
    };

    fn build_image(header: &MfmDiskHeader, tracks: &[Vec<u8>], gap_fill: u8) -> Cursor<Vec<u8>> {
        let mut image = Cursor::new(Vec::new());
        header.write_to(&mut image).unwrap();
        for track in tracks {
            image.get_mut().extend_from_slice(track);
            image.get_mut().extend_from_slice(&[gap_fill; MFM_DISK_TRACK_GAP]);
        }
        image
    }

    fn formatted_track(c: u16, h: u8) -> Vec<u8> {
        let sectors: Vec<DiskChsn> = (1..=9).map(|s| DiskChsn::new(c, h, s, 2)).collect();
        format_track_as_bytes(MFM_DISK_TRACK_LEN, &sectors, &[0xE5], IBM_GAP3_DEFAULT)
            .unwrap()
            .track_bytes
    }

    #[test]
    fn test_header_round_trip() {
        let header = MfmDiskHeader::new(2, 42, MfmDiskGeometry::TracksInterleaved);
        let mut image = Cursor::new(Vec::new());
        header.write_to(&mut image).unwrap();

        let bytes = image.get_ref();
        assert_eq!(bytes.len(), MFM_DISK_HEADER_LEN);
        assert_eq!(&bytes[0..8], b"MFM_DISK");
        assert_eq!(&bytes[8..20], &[2, 0, 0, 0, 42, 0, 0, 0, 2, 0, 0, 0]);

        let parsed = MfmDiskHeader::parse(&mut image).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(parsed.geometry(), MfmDiskGeometry::TracksInterleaved);
    }

    #[test]
    fn test_detect() {
        let image = build_image(&MfmDiskHeader::new(1, 1, MfmDiskGeometry::SidesSequential), &[], 0);
        assert!(MfmDiskFormat::detect(image));

        assert!(!MfmDiskFormat::detect(Cursor::new(b"MFM_DIS".to_vec())));
        assert!(!MfmDiskFormat::detect(Cursor::new(vec![0u8; 1024])));
    }

    #[test]
    fn test_open_rejects_other_formats() {
        let mut data = vec![0u8; 1024];
        data[0..6].copy_from_slice(b"HXCMFM");
        assert!(matches!(
            MfmDiskImage::open(Cursor::new(data)),
            Err(DiskImageError::UnknownFormat)
        ));

        assert!(matches!(
            MfmDiskImage::open(Cursor::new(b"MFM_DISK".to_vec())),
            Err(DiskImageError::FormatParseError)
        ));
    }

    #[test]
    fn test_track_ch_mapping() {
        let sequential = MfmDiskHeader::new(2, 80, MfmDiskGeometry::SidesSequential);
        assert_eq!(sequential.track_ch(0), Some(DiskCh::new(0, 0)));
        assert_eq!(sequential.track_ch(79), Some(DiskCh::new(79, 0)));
        assert_eq!(sequential.track_ch(80), Some(DiskCh::new(0, 1)));

        let interleaved = MfmDiskHeader::new(2, 80, MfmDiskGeometry::TracksInterleaved);
        assert_eq!(interleaved.track_ch(1), Some(DiskCh::new(0, 1)));
        assert_eq!(interleaved.track_ch(2), Some(DiskCh::new(1, 0)));

        let unknown = MfmDiskHeader::new(2, 80, MfmDiskGeometry::from(7));
        assert_eq!(unknown.geometry(), MfmDiskGeometry::Unknown(7));
        assert_eq!(unknown.track_ch(0), None);

        let empty = MfmDiskHeader::new(0, 0, MfmDiskGeometry::TracksInterleaved);
        assert_eq!(empty.track_ch(0), None);
    }

    #[test]
    fn test_track_count_ignores_partial_tracks() {
        let header = MfmDiskHeader::new(1, 3, MfmDiskGeometry::SidesSequential);
        let tracks = vec![formatted_track(0, 0), formatted_track(1, 0), formatted_track(2, 0)];
        let mut data = build_image(&header, &tracks, 0).into_inner();

        // Drop the gap after the last track; the track itself is still complete.
        data.truncate(data.len() - MFM_DISK_TRACK_GAP);
        let disk = MfmDiskImage::open(Cursor::new(data.clone())).unwrap();
        assert_eq!(disk.track_ct(), 3);

        // Cut into the last track.
        data.truncate(data.len() - 1);
        let disk = MfmDiskImage::open(Cursor::new(data)).unwrap();
        assert_eq!(disk.track_ct(), 2);

        let header_only = build_image(&header, &[], 0);
        assert_eq!(MfmDiskImage::open(header_only).unwrap().track_ct(), 0);
    }

    #[test]
    fn test_read_write_track_bounds() {
        let header = MfmDiskHeader::new(1, 1, MfmDiskGeometry::SidesSequential);
        let image = build_image(&header, &[formatted_track(0, 0)], 0);
        let mut disk = MfmDiskImage::open(image).unwrap();

        assert_eq!(disk.read_track(0).unwrap(), formatted_track(0, 0));
        assert!(matches!(disk.read_track(1), Err(DiskImageError::ParameterError)));
        assert!(matches!(disk.write_track(0, &[0u8; 10]), Err(DiskImageError::ParameterError)));

        let blank = vec![0x4E; MFM_DISK_TRACK_LEN];
        disk.write_track(0, &blank).unwrap();
        assert_eq!(disk.read_track(0).unwrap(), blank);
    }

    #[test]
    fn test_fix_writes_only_patched_tracks() {
        let header = MfmDiskHeader::new(1, 3, MfmDiskGeometry::SidesSequential);
        let mut tracks = vec![formatted_track(0, 0), formatted_track(1, 0), formatted_track(2, 0)];
        let sectors: Vec<DiskChsn> = (1..=9).map(|s| DiskChsn::new(1, 0, s, 2)).collect();
        let layout = format_track_as_bytes(MFM_DISK_TRACK_LEN, &sectors, &[0xE5], IBM_GAP3_DEFAULT).unwrap();
        let (_, dam) = layout.markers[1];
        tracks[1][dam + 4] = 0x00;

        let image = build_image(&header, &tracks, 0xAA);
        let mut disk = MfmDiskImage::open(image).unwrap();

        let report = disk.fix_tracks(&FixOptions::default()).unwrap();
        assert_eq!(report.track_ct(), 3);
        assert_eq!(report.found(), 54);
        assert_eq!(report.mismatched(), 1);
        assert_eq!(report.patched(), 1);
        assert_eq!(report.tracks_written(), 1);
        assert!(report.tracks[1].written);
        assert_eq!(report.tracks[1].ch, Some(DiskCh::new(1, 0)));

        let (track, record) = report.bad_records().next().unwrap();
        assert_eq!(track.index, 1);
        assert_eq!(record.offset, dam);

        let report = disk.fix_tracks(&FixOptions::default()).unwrap();
        assert_eq!((report.mismatched(), report.tracks_written()), (0, 0));
    }

    #[test]
    fn test_dry_run_leaves_image_unchanged() {
        let header = MfmDiskHeader::new(1, 1, MfmDiskGeometry::SidesSequential);
        let mut track = formatted_track(0, 0);
        let idam = track.iter().position(|&b| b == 0xFE).unwrap();
        track[idam + 5] ^= 0xFF;

        let image = build_image(&header, &[track], 0);
        let original = image.get_ref().clone();

        let options = FixOptions {
            dry_run: true,
            ..Default::default()
        };
        let report = fix_image(&mut image.clone(), &options).unwrap();
        assert_eq!((report.mismatched(), report.patched(), report.tracks_written()), (1, 0, 0));

        let mut disk = MfmDiskImage::open(image).unwrap();
        let report = disk.check_tracks(&FixOptions::default()).unwrap();
        assert_eq!((report.mismatched(), report.patched()), (1, 0));
        assert_eq!(disk.into_inner().into_inner(), original);
    }
}
