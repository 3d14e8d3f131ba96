/*
    dskfix_cli
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
use bpaf::{construct, long, positional, Parser};
use std::path::PathBuf;

use dskfix::OrphanDataPolicy;

#[derive(Clone, Debug)]
pub(crate) struct FixParams {
    pub(crate) assume_size_code: Option<u8>,
    pub(crate) list: bool,
    pub(crate) files: Vec<PathBuf>,
}

impl FixParams {
    /// Data marks seen before any sector header are skipped unless a size code was supplied.
    pub(crate) fn orphan_data(&self) -> OrphanDataPolicy {
        match self.assume_size_code {
            Some(n) => OrphanDataPolicy::AssumeSizeCode(n),
            None => OrphanDataPolicy::Skip,
        }
    }
}

fn assume_size_code_parser() -> impl Parser<u8> {
    long("assume-size-code")
        .argument::<u8>("N")
        .help("Check data fields that precede any sector header as if the size code were N")
        .guard(|&n| n <= 7, "Size code must be between 0 and 7")
}

fn list_parser() -> impl Parser<bool> {
    long("list").help("List every record with a bad CRC").switch()
}

fn files_parser() -> impl Parser<Vec<PathBuf>> {
    positional::<PathBuf>("FILE")
        .help("Path to an Oric MFM_DISK image")
        .some("At least one disk image must be specified")
}

pub(crate) fn fix_parser() -> impl Parser<FixParams> {
    let assume_size_code = assume_size_code_parser().optional();
    let list = list_parser();
    let files = files_parser();

    construct!(FixParams {
        assume_size_code,
        list,
        files
    })
}
