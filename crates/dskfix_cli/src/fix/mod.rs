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
pub mod args;

use std::{
    fs::{File, OpenOptions},
    path::Path,
};

use anyhow::{bail, Error};
use dskfix::{FixOptions, ImageFixReport, MfmDiskFormat, MfmDiskImage};

use crate::{args::GlobalOptions, fix::args::FixParams};

/// Check or fix every file in `params`. A failure on one file does not stop the batch, but the
/// command fails if any file could not be processed.
pub(crate) fn run(global: &GlobalOptions, params: &FixParams, dry_run: bool) -> Result<(), Error> {
    let options = FixOptions {
        dry_run,
        orphan_data: params.orphan_data(),
    };

    let mut failed = 0;
    for path in &params.files {
        match process_file(path, &options) {
            Ok(report) => global.loud(|| print_report(path, &report, dry_run, params.list)),
            Err(e) => {
                log::debug!("{}: {:?}", path.display(), e);
                println!("{}: Error; {}", path.display(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} disk images could not be processed", failed, params.files.len());
    }
    Ok(())
}

fn open_file(path: &Path, dry_run: bool) -> Result<File, Error> {
    match OpenOptions::new().read(true).write(!dry_run).open(path) {
        Ok(file) => Ok(file),
        Err(e) => {
            log::debug!("open failed: {}", e);
            if dry_run {
                bail!("couldn't open for reading")
            }
            else {
                bail!("couldn't open for modification")
            }
        }
    }
}

pub(crate) fn process_file(path: &Path, options: &FixOptions) -> Result<ImageFixReport, Error> {
    let mut file = open_file(path, options.dry_run)?;

    if !MfmDiskFormat::detect(&mut file) {
        bail!("doesn't look like an Oric MFM disk");
    }

    let mut image = MfmDiskImage::open(&mut file)?;
    let report = image.fix_tracks(options)?;
    Ok(report)
}

fn print_report(path: &Path, report: &ImageFixReport, dry_run: bool, list: bool) {
    if list {
        for (track, record) in report.bad_records() {
            let ch = match track.ch {
                Some(ch) => ch.to_string(),
                None => "[unknown]".to_string(),
            };
            let id = match record.chsn {
                Some(chsn) => chsn.to_string(),
                None => "[no sector id]".to_string(),
            };
            println!(
                "{}: track {} {} {} {} at offset {}: recorded {:04X}, calculated {:04X}{}",
                path.display(),
                track.index,
                ch,
                record.kind,
                id,
                track.offset + record.offset as u64,
                record.recorded,
                record.calculated,
                if record.patched { " (fixed)" } else { "" }
            );
        }
    }

    if dry_run {
        println!(
            "{}: Completed; {} tracks found, {} CRCs checked, {} bad",
            path.display(),
            report.track_ct(),
            report.found(),
            report.mismatched()
        );
    }
    else {
        println!(
            "{}: Completed; {} tracks found, {} CRCs checked, {} fixed",
            path.display(),
            report.track_ct(),
            report.found(),
            report.patched()
        );
    }
}
