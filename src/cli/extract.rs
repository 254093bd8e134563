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

use std::io::{self, BufRead, Write};

use log::{debug, error, info};

use crate::mime::entity::Entity;
use crate::mime::fetch::section::{fetch_body_section, BodySection};
use crate::support::error::Error;
use crate::support::sysexits::*;
use crate::support::system_config::ParserConfig;

pub(super) fn extract(
    parser_config: &ParserConfig,
    section: &BodySection,
    input: impl BufRead + 'static,
    mut output: impl Write,
) -> Result<(), Sysexit> {
    let fetched = match Entity::read(input, parser_config)
        .and_then(|root| fetch_body_section(root, section))
    {
        Ok(fetched) => fetched,
        Err(Error::NoSuchPart) => {
            error!("{}: No such message body part", section);
            eprintln!("{}: No such message body part", section);
            return Err(EX_DATAERR);
        }
        Err(Error::Io(e)) => {
            error!("Error reading message: {}", e);
            eprintln!("Error reading message: {}", e);
            return Err(EX_IOERR);
        }
    };

    if fetched.contains_nul {
        debug!("{} contains NUL bytes", section);
    }
    let len = fetched.buffer.len();

    if let Err(e) = io::copy(&mut fetched.into_reader(), &mut output)
        .and_then(|_| output.flush())
    {
        error!("Error writing output: {}", e);
        eprintln!("Error writing output: {}", e);
        return Err(EX_IOERR);
    }

    info!("Wrote {} bytes for {}", len, section);
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mime::fetch::section::Specifier;
    use crate::test_data::*;

    fn run(
        message: &'static [u8],
        section: BodySection,
    ) -> Result<Vec<u8>, Sysexit> {
        crate::init_test_log();
        let mut output = Vec::new();
        extract(&ParserConfig::default(), &section, message, &mut output)?;
        Ok(output)
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct FailingInput;

    impl io::Read for FailingInput {
        fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk on fire"))
        }
    }

    #[test]
    fn writes_section() {
        assert_eq!(
            MIXED_ATTACHMENT_BODY,
            &run(
                MIXED,
                BodySection {
                    path: vec![2],
                    ..BodySection::default()
                }
            )
            .unwrap()[..]
        );

        assert_eq!(
            b"Hello",
            &run(
                PLAIN,
                BodySection {
                    path: vec![1],
                    specifier: Specifier::Text,
                    partial: Some((0, 5)),
                    ..BodySection::default()
                }
            )
            .unwrap()[..]
        );
    }

    #[test]
    fn missing_part_is_data_error() {
        assert_eq!(
            Err(EX_DATAERR),
            run(
                MIXED,
                BodySection {
                    path: vec![2, 1],
                    ..BodySection::default()
                }
            )
        );
    }

    #[test]
    fn io_errors_are_io_errors() {
        crate::init_test_log();
        assert_eq!(
            Err(EX_IOERR),
            extract(
                &ParserConfig::default(),
                &BodySection::default(),
                PLAIN,
                BrokenPipe
            )
        );
        assert_eq!(
            Err(EX_IOERR),
            extract(
                &ParserConfig::default(),
                &BodySection::default(),
                io::BufReader::new(FailingInput),
                Vec::new()
            )
        );
    }
}
