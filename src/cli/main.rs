//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Mimesection.
//
// Mimesection is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Mimesection is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Mimesection. If not, see <http://www.gnu.org/licenses/>.

use std::fs;
use std::io::{self, BufRead};
use std::path::PathBuf;

use log::info;
use structopt::StructOpt;

use crate::mime::fetch::section::{BodySection, Specifier};
use crate::mime::header::HeaderFilter;
use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

/// Extract one IMAP body section from a MIME message.
///
/// The section is written to standard output exactly as an IMAP server would
/// return it for `BODY[section]<partial>`, without any literal framing.
#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
pub(super) struct Command {
    /// Read configuration from this TOML file.
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Descend into this part number. Pass multiple times to go deeper, e.g.
    /// `-p 2 -p 1` selects part 2.1. With none, the whole message is
    /// addressed.
    #[structopt(short, long, number_of_values(1))]
    pub(super) part: Vec<u32>,

    /// Which portion of the part to extract: entire, header, mime, or text.
    #[structopt(short, long, default_value = "entire")]
    pub(super) specifier: Specifier,

    /// Only include this header field. Can be passed multiple times.
    #[structopt(long, number_of_values(1))]
    pub(super) field: Vec<String>,

    /// Exclude the fields given with --field instead of keeping only them.
    #[structopt(long)]
    pub(super) not: bool,

    /// Skip this many bytes of the extracted section.
    #[structopt(long)]
    pub(super) offset: Option<u64>,

    /// Write at most this many bytes of the extracted section.
    #[structopt(long)]
    pub(super) length: Option<u64>,

    /// The message to read. "-" will read from stdin.
    #[structopt(parse(from_os_str), default_value = "-")]
    pub(super) input: PathBuf,
}

impl Command {
    pub(super) fn body_section(&self) -> BodySection {
        let partial = if self.offset.is_some() || self.length.is_some() {
            Some((self.offset.unwrap_or(0), self.length.unwrap_or(u64::MAX)))
        } else {
            None
        };

        BodySection {
            path: self.part.clone(),
            specifier: self.specifier,
            header_filter: HeaderFilter {
                names: self.field.clone(),
                discard_matching: self.not,
            },
            partial,
        }
    }
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let cmd = Command::from_clap(&match Command::clap().get_matches_safe() {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        }
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        }
    });

    let system_config = match cmd.config {
        Some(ref path) => match SystemConfig::load(path) {
            Ok(config) => config,
            Err(e) => die!(EX_CONFIG, "{}", e),
        },
        None => SystemConfig::default(),
    };

    let log_result = match system_config.logging.config_file {
        Some(ref log_config_file) => crate::init_file_log(log_config_file),
        None => crate::init_simple_log(system_config.log_level()),
    };
    if let Err(exit) = log_result {
        exit.exit();
    }

    let section = cmd.body_section();
    let input: Box<dyn BufRead> = if cmd.input.as_os_str() == "-" {
        Box::new(io::BufReader::new(io::stdin()))
    } else {
        match fs::File::open(&cmd.input) {
            Ok(file) => Box::new(io::BufReader::new(file)),
            Err(e) => die!(EX_NOINPUT, "{}: {}", cmd.input.display(), e),
        }
    };

    info!("Extracting {} from {}", section, cmd.input.display());
    let stdout = io::stdout();
    if let Err(exit) = super::extract::extract(
        &system_config.parser,
        &section,
        input,
        stdout.lock(),
    ) {
        exit.exit();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        Command::from_iter_safe(
            std::iter::once("mimesection").chain(args.iter().copied()),
        )
    }

    #[test]
    fn defaults_address_whole_message() {
        let cmd = parse(&[]).unwrap();
        assert_eq!(BodySection::default(), cmd.body_section());
        assert_eq!(PathBuf::from("-"), cmd.input);
        assert_eq!(None, cmd.config);
    }

    #[test]
    fn full_section_description() {
        let cmd = parse(&[
            "-p", "2", "--part", "1", "-s", "header", "--field", "Subject",
            "--field", "From", "--not", "--offset", "3", "--length", "10",
            "message.eml",
        ])
        .unwrap();

        assert_eq!(
            BodySection {
                path: vec![2, 1],
                specifier: Specifier::Header,
                header_filter: HeaderFilter::excluding(vec!["Subject", "From"]),
                partial: Some((3, 10)),
            },
            cmd.body_section()
        );
        assert_eq!(PathBuf::from("message.eml"), cmd.input);
    }

    #[test]
    fn open_ended_partial() {
        let cmd = parse(&["--offset", "5"]).unwrap();
        assert_eq!(Some((5, u64::MAX)), cmd.body_section().partial);
        let cmd = parse(&["--length", "5"]).unwrap();
        assert_eq!(Some((0, 5)), cmd.body_section().partial);
    }

    #[test]
    fn bad_arguments_rejected() {
        assert!(parse(&["-s", "body"]).is_err());
        assert!(parse(&["-p", "one"]).is_err());
        assert!(parse(&["-p", "-1"]).is_err());
    }
}
