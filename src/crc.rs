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

    src/crc.rs

    A table-driven, MSB-first 16-bit CRC generator.
*/

use crate::{CRC_POLYNOMIAL, CRC_RELOAD_VALUE};

/// A 16-bit CRC generator for an arbitrary polynomial.
///
/// The lookup table is built once in [`ChecksumEngine::new`] and never changes afterward. Only
/// the running value is mutable, so a single engine can be reused for any number of independent
/// CRC calculations by calling [`ChecksumEngine::reset`] before each one.
#[derive(Clone)]
pub struct ChecksumEngine {
    polynomial: u16,
    xor_table: [u16; 256],
    value: u16,
}

impl Default for ChecksumEngine {
    /// Create a CRC-16/IBM-3740 engine (polynomial 0x1021).
    fn default() -> Self {
        ChecksumEngine::new(CRC_POLYNOMIAL)
    }
}

impl std::fmt::Debug for ChecksumEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecksumEngine")
            .field("polynomial", &format_args!("{:04X}", self.polynomial))
            .field("value", &format_args!("{:04X}", self.value))
            .finish()
    }
}

impl ChecksumEngine {
    /// Create a new CRC generator for `polynomial`. The generator starts with a value of 0xFFFF.
    pub fn new(polynomial: u16) -> Self {
        let mut xor_table = [0u16; 256];

        for (c, entry) in xor_table.iter_mut().enumerate() {
            let mut shift_value = (c as u16) << 8;
            for _ in 0..8 {
                let exclusive_or = if shift_value & 0x8000 != 0 { polynomial } else { 0 };
                shift_value = (shift_value << 1) ^ exclusive_or;
            }
            *entry = shift_value;
        }

        ChecksumEngine {
            polynomial,
            xor_table,
            value: CRC_RELOAD_VALUE,
        }
    }

    /// Return the polynomial this generator was built for.
    #[inline]
    pub fn polynomial(&self) -> u16 {
        self.polynomial
    }

    /// Set the running CRC to `value`, discarding any accumulated state.
    #[inline]
    pub fn reset(&mut self, value: u16) {
        self.value = value;
    }

    #[inline]
    pub fn add_byte(&mut self, byte: u8) {
        let index = ((self.value >> 8) as u8 ^ byte) as usize;
        self.value = (self.value << 8) ^ self.xor_table[index];
    }

    /// Add each byte of `bytes` in order.
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.add_byte(byte);
        }
    }

    /// Add the four bytes of `word`, most significant byte first.
    #[inline]
    pub fn add_u32_be(&mut self, word: u32) {
        self.add_bytes(&word.to_be_bytes());
    }

    /// Return the current CRC value.
    #[inline]
    pub fn value(&self) -> u16 {
        self.value
    }
}

/// Calculate a CRC-16/IBM-3740 over `data`, starting from `start` or 0xFFFF if `start` is None.
///
/// Passing the result of a previous call as `start` continues that calculation, so a marker and
/// the data that follows it can be checksummed in two steps.
pub fn crc_ibm_3740(data: &[u8], start: Option<u16>) -> u16 {
    let mut engine = ChecksumEngine::new(CRC_POLYNOMIAL);
    engine.reset(start.unwrap_or(CRC_RELOAD_VALUE));
    engine.add_bytes(data);
    engine.value()
}
