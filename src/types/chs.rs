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

//! The `chs` module defines structures for working with Cylinder-Head-Sector (CHS)
//! addressing and the sector IDs stored in sector headers.

use std::fmt::Display;

/// A structure representing the four components of a sector header:
///  - Cylinder (c)
///  - Head (h)
///  - Sector ID (s)
///  - Sector Size (n)
///
/// Sector headers read from a track may contain any value in any field, so no component is
/// validated.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiskChsn {
    c: u16,
    h: u8,
    s: u8,
    n: u8,
}

impl From<(u16, u8, u8, u8)> for DiskChsn {
    fn from((c, h, s, n): (u16, u8, u8, u8)) -> Self {
        Self { c, h, s, n }
    }
}

impl From<[u8; 4]> for DiskChsn {
    fn from(bytes: [u8; 4]) -> Self {
        Self {
            c: bytes[0] as u16,
            h: bytes[1],
            s: bytes[2],
            n: bytes[3],
        }
    }
}

impl Display for DiskChsn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[c:{:2} h:{} s:{:3} n:{}]", self.c, self.h, self.s, self.n)
    }
}

impl DiskChsn {
    /// Create a new DiskChsn structure from the four sector ID components.
    pub fn new(c: u16, h: u8, s: u8, n: u8) -> Self {
        Self { c, h, s, n }
    }

    /// Return all four sector ID components.
    /// # Returns:
    /// A tuple containing the cylinder, head, sector ID, and sector size.
    #[inline]
    pub fn get(&self) -> (u16, u8, u8, u8) {
        (self.c, self.h, self.s, self.n)
    }
    /// Return the cylinder (c) field.
    #[inline]
    pub fn c(&self) -> u16 {
        self.c
    }
    /// Return the head (h) field.
    #[inline]
    pub fn h(&self) -> u8 {
        self.h
    }
    /// Return the sector id (s) field.
    #[inline]
    pub fn s(&self) -> u8 {
        self.s
    }
    /// Return the size (n) field.
    #[inline]
    pub fn n(&self) -> u8 {
        self.n
    }
    /// Return a `DiskCh` structure representing the cylinder and head components of a DiskChsn.
    #[inline]
    pub fn ch(&self) -> DiskCh {
        DiskCh::new(self.c, self.h)
    }

    /// Return the size of the 'n' parameter in bytes, or None if it cannot be represented.
    #[inline]
    pub fn n_size(&self) -> Option<usize> {
        DiskChsn::n_to_bytes(self.n)
    }

    /// Convert the value of the sector size field (n) into bytes.
    /// The formula for calculating size from n is (128 * 2^n). Unlike a disk controller, no
    /// maximum sector size is enforced; a size that overflows `usize` returns None.
    #[inline]
    pub fn n_to_bytes(n: u8) -> Option<usize> {
        let shift = n as u32 + 7;
        if shift >= usize::BITS {
            return None;
        }
        Some(1usize << shift)
    }

    /// Convert a size in bytes into a sector size field value (n)
    #[inline]
    pub fn bytes_to_n(size: usize) -> u8 {
        let mut n = 0;
        let mut size = size;
        while size > 128 {
            size >>= 1;
            n += 1;
        }
        n
    }

    /// Return the four bytes of the sector ID as they are stored in a sector header.
    /// The cylinder is truncated to 8 bits.
    pub fn to_bytes(&self) -> [u8; 4] {
        [self.c as u8, self.h, self.s, self.n]
    }
}

/// A structure representing a physical track address:
///  - Cylinder (c)
///  - Head (h)
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiskCh {
    pub(crate) c: u16,
    pub(crate) h: u8,
}

impl From<(u16, u8)> for DiskCh {
    fn from((c, h): (u16, u8)) -> Self {
        Self { c, h }
    }
}

impl From<DiskChsn> for DiskCh {
    fn from(chsn: DiskChsn) -> Self {
        chsn.ch()
    }
}

impl Display for DiskCh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[c:{} h:{}]", self.c, self.h)
    }
}

impl DiskCh {
    /// Create a new DiskCh structure from a Cylinder (c) and Head (h) specifier.
    pub fn new(c: u16, h: u8) -> Self {
        Self { c, h }
    }
    /// Return the cylinder (c) field.
    pub fn c(&self) -> u16 {
        self.c
    }
    /// Return the head (h) field.
    pub fn h(&self) -> u8 {
        self.h
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diskchsn_new_creates_correct_instance() {
        let chsn = DiskChsn::new(1, 2, 3, 4);
        assert_eq!(chsn.c(), 1);
        assert_eq!(chsn.h(), 2);
        assert_eq!(chsn.s(), 3);
        assert_eq!(chsn.n(), 4);
        assert_eq!(chsn.get(), (1, 2, 3, 4));
    }

    #[test]
    fn diskchsn_from_header_bytes() {
        let chsn = DiskChsn::from([39, 1, 17, 1]);
        assert_eq!(chsn, DiskChsn::new(39, 1, 17, 1));
        assert_eq!(chsn.to_bytes(), [39, 1, 17, 1]);
        assert_eq!(chsn.ch(), DiskCh::new(39, 1));
    }

    #[test]
    fn diskchsn_n_size_calculates_correct_size() {
        assert_eq!(DiskChsn::new(0, 0, 0, 0).n_size(), Some(128));
        assert_eq!(DiskChsn::new(0, 0, 0, 1).n_size(), Some(256));
        assert_eq!(DiskChsn::new(0, 0, 0, 3).n_size(), Some(1024));
        assert_eq!(DiskChsn::new(0, 0, 0, 7).n_size(), Some(16384));
    }

    #[test]
    fn diskchsn_n_size_rejects_overflow() {
        assert_eq!(DiskChsn::n_to_bytes((usize::BITS - 8) as u8), Some(1usize << (usize::BITS - 1)));
        assert_eq!(DiskChsn::n_to_bytes((usize::BITS - 7) as u8), None);
        assert_eq!(DiskChsn::n_to_bytes(0xFF), None);
    }

    #[test]
    fn diskchsn_size_to_n_calculates_correct_n() {
        assert_eq!(DiskChsn::bytes_to_n(128), 0);
        assert_eq!(DiskChsn::bytes_to_n(256), 1);
        assert_eq!(DiskChsn::bytes_to_n(1024), 3);
    }

    #[test]
    fn diskch_display() {
        assert_eq!(DiskCh::new(12, 1).to_string(), "[c:12 h:1]");
        assert_eq!(DiskChsn::new(2, 0, 3, 1).to_string(), "[c: 2 h:0 s:  3 n:1]");
    }
}
