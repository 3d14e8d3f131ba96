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

//! # dskfix
//!
//! dskfix repairs the sector header and sector data CRCs of Oric `MFM_DISK` floppy disk
//! images, so that an image stays consistent after its sector contents have been edited.
//!
//! The image stores decoded track bytes without clock bits. Sync words are therefore found by
//! value: the `A1 A1 A1 FE` sequence opens a sector header (IDAM) and `A1 A1 A1 FB` opens
//! sector data (DAM). Any `A1` bytes that fall inside a sector body are treated as data.
//!
//! The library is organized bottom-up:
//! * [`crc::ChecksumEngine`] is a table-driven 16-bit CRC generator for an arbitrary polynomial.
//! * [`track_scanner::TrackScanner`] walks a single decoded track, verifies each record's CRC
//!   and patches bad CRC fields in place.
//! * [`file_parsers::mfm_disk::MfmDiskImage`] locates tracks inside an `MFM_DISK` file and
//!   writes back the tracks that were patched.

pub mod crc;
pub mod file_parsers;
pub mod io;
pub mod track_format;
pub mod track_scanner;
pub mod types;
mod util;

use thiserror::Error;

pub use crate::{
    crc::{crc_ibm_3740, ChecksumEngine},
    file_parsers::mfm_disk::{
        fix_image,
        FixOptions,
        ImageFixReport,
        MfmDiskFormat,
        MfmDiskImage,
        TrackFixReport,
        MFM_DISK_TRACK_LEN,
    },
    track_scanner::{OrphanDataPolicy, RecordKind, ScanOptions, ScanResult, TrackRecord, TrackScanner},
    types::chs::{DiskCh, DiskChsn},
};

/// The polynomial used by the IBM System 34 style CRC stored after sector headers and data.
pub const CRC_POLYNOMIAL: u16 = 0x1021;
/// The value a CRC generator is reloaded with before each sector header or data field.
pub const CRC_RELOAD_VALUE: u16 = 0xFFFF;

#[derive(Clone, Debug, Error)]
pub enum DiskImageError {
    #[error("An IO error occurred reading or writing the disk image: {0}")]
    IoError(String),
    #[error("Unknown disk image format")]
    UnknownFormat,
    #[error("The disk image format parser encountered an error")]
    FormatParseError,
    #[error("Invalid parameters were specified to a library function")]
    ParameterError,
}

impl From<std::io::Error> for DiskImageError {
    fn from(err: std::io::Error) -> Self {
        DiskImageError::IoError(err.to_string())
    }
}

impl From<binrw::Error> for DiskImageError {
    fn from(err: binrw::Error) -> Self {
        match err {
            binrw::Error::Backtrace(backtrace) => DiskImageError::from(*backtrace.error),
            binrw::Error::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => DiskImageError::FormatParseError,
            binrw::Error::Io(e) => DiskImageError::IoError(e.to_string()),
            _ => DiskImageError::FormatParseError,
        }
    }
}

pub mod prelude {
    pub use crate::{
        file_parsers::mfm_disk::{fix_image, FixOptions, ImageFixReport, MfmDiskFormat, MfmDiskImage},
        track_scanner::{OrphanDataPolicy, ScanOptions, ScanResult, TrackScanner},
        types::chs::{DiskCh, DiskChsn},
        ChecksumEngine,
        DiskImageError,
    };
}
