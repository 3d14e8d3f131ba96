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

use std::{
    fmt::{Display, Formatter},
    io::Write,
};

use crate::fix::args::{fix_parser, FixParams};
use bpaf::*;

#[derive(Clone, Debug)]
pub(crate) enum Command {
    Version,
    Check(FixParams),
    Fix(FixParams),
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Version => write!(f, "version"),
            Command::Check(_) => write!(f, "check"),
            Command::Fix(_) => write!(f, "fix"),
        }
    }
}

#[derive(Debug)]
pub(crate) struct AppParams {
    pub global:  GlobalOptions,
    pub command: Command,
}

#[derive(Debug)]
pub struct GlobalOptions {
    pub silent: bool,
}

impl GlobalOptions {
    pub fn loud<F: FnMut()>(&self, mut f: F) {
        if !self.silent {
            f();
            let _ = std::io::stdout().flush();
        }
    }
}

pub fn global_options_parser() -> impl Parser<GlobalOptions> {
    let silent = long("silent")
        .help("Suppress all output except errors")
        .switch(); // Switch returns a bool, true if the flag is present

    construct!(GlobalOptions { silent })
}

pub(crate) fn command_parser() -> impl Parser<AppParams> {
    let global = global_options_parser();

    let version = pure(Command::Version)
        .to_options()
        .command("version")
        .help("Display version information and exit");

    let check = construct!(Command::Check(fix_parser()))
        .to_options()
        .command("check")
        .help("Report bad sector CRCs without modifying the disk images");

    let fix = construct!(Command::Fix(fix_parser()))
        .to_options()
        .command("fix")
        .help("Repair bad sector CRCs in place");

    let command = construct!([version, check, fix]);

    construct!(AppParams { global, command })
}
