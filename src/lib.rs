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

//! Resolution and extraction of IMAP `BODY[section]` data from MIME messages.
//!
//! A message is parsed lazily with `mime::entity::Entity::read`. The section
//! to extract is described by a `mime::fetch::section::BodySection`, and
//! `mime::fetch::section::fetch_body_section` locates the addressed part,
//! writes the requested portion of it, and applies any partial range.

use std::path::Path;

use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::support::sysexits::*;

#[cfg(test)]
macro_rules! assert_matches {
    ($expected:pat, $actual:expr) => {
        match $actual {
            $expected => (),
            unexpected => panic!(
                "Expected {} matches {}, got {:?}",
                stringify!($expected),
                stringify!($actual),
                unexpected
            ),
        }
    };
}

pub mod backend;
pub mod cli;
pub mod mime;
pub mod support;

#[cfg(test)]
mod test_data;

/// Log to standard error at `level`.
pub fn init_simple_log(level: log::LevelFilter) -> Result<(), Sysexit> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "{d(%H:%M:%S%.3f)} [{l}][{t}] {m}{n}",
        )))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))
        .map_err(|e| {
            eprintln!("Failed to configure logging: {}", e);
            EX_SOFTWARE
        })?;

    log4rs::init_config(config).map_err(|e| {
        eprintln!("Failed to initialise logging: {}", e);
        EX_SOFTWARE
    })?;
    Ok(())
}

/// Configure logging from a log4rs configuration file.
pub fn init_file_log(path: &Path) -> Result<(), Sysexit> {
    log4rs::init_file(path, log4rs::config::Deserializers::new()).map_err(
        |e| {
            eprintln!(
                "Failed to initialise logging from '{}': {}",
                path.display(),
                e
            );
            EX_CONFIG
        },
    )
}

#[cfg(test)]
static INIT_TEST_LOG: std::sync::Once = std::sync::Once::new();

#[cfg(test)]
fn init_test_log() {
    INIT_TEST_LOG.call_once(|| {
        init_simple_log(log::LevelFilter::Debug).unwrap();
    })
}
