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

    tests/common/mod.rs

    Common support routines for tests
*/
#![allow(dead_code)]

use dskfix::{
    file_parsers::mfm_disk::{MfmDiskGeometry, MfmDiskHeader, MFM_DISK_TRACK_GAP},
    io::Cursor,
    track_format::{format_track_as_bytes, TrackFormatResult},
    DiskChsn,
    MFM_DISK_TRACK_LEN,
};

use hex::encode;
use sha1::{Digest, Sha1};

/// Byte used to fill the unused area after each track, so that stray writes are detectable.
pub const TRACK_GAP_FILL: u8 = 0x5A;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn compute_slice_hash(slice: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(slice);
    let result = hasher.finalize();

    encode(result)
}

/// Format a track in the layout used by Oric Sedoric disks: 17 sectors of 256 bytes.
pub fn format_oric_track(c: u16, h: u8, fill: u8) -> TrackFormatResult {
    let sectors: Vec<DiskChsn> = (1..=17).map(|s| DiskChsn::new(c, h, s, 1)).collect();
    format_track_as_bytes(MFM_DISK_TRACK_LEN, &sectors, &[fill], 40).unwrap()
}

/// Build an MFM_DISK image from a list of tracks, stored in order.
pub fn build_image(heads: u32, cylinders: u32, geometry: MfmDiskGeometry, tracks: &[Vec<u8>]) -> Vec<u8> {
    let header = MfmDiskHeader::new(heads, cylinders, geometry);
    let mut image = Cursor::new(Vec::new());
    header.write_to(&mut image).unwrap();

    let mut data = image.into_inner();
    for track in tracks {
        assert_eq!(track.len(), MFM_DISK_TRACK_LEN);
        data.extend_from_slice(track);
        data.extend_from_slice(&[TRACK_GAP_FILL; MFM_DISK_TRACK_GAP]);
    }
    data
}

/// Build a double-sided image with tracks stored interleaved, returning the image along with
/// the layout of each track.
pub fn build_oric_image(cylinders: u16) -> (Vec<u8>, Vec<TrackFormatResult>) {
    let mut layouts = Vec::new();
    for c in 0..cylinders {
        for h in 0..2 {
            layouts.push(format_oric_track(c, h, 0xE5));
        }
    }
    let tracks: Vec<Vec<u8>> = layouts.iter().map(|l| l.track_bytes.clone()).collect();
    let image = build_image(2, cylinders as u32, MfmDiskGeometry::TracksInterleaved, &tracks);
    (image, layouts)
}
