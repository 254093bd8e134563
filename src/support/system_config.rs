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
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The configuration for Mimesection.
///
/// This is stored in a TOML file passed with `--config`. Every section is
/// optional; an absent file is the same as an empty one.
#[derive(Clone, Debug, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct SystemConfig {
    /// Safety limits for the MIME parser.
    #[serde(default)]
    pub parser: ParserConfig,

    /// Where and how verbosely to log.
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ParserConfig {
    /// The longest line the parser will buffer at once.
    ///
    /// Longer lines are processed in pieces. Multipart boundaries are only
    /// recognised at the start of a line, so this never causes content to be
    /// misinterpreted as a boundary. Values below 16 are treated as 16. The
    /// limit is raised as needed to fit the delimiter lines of each multipart.
    pub max_line_length: usize,

    /// The longest a single header field, including its continuation lines,
    /// may grow. Further continuation lines are dropped.
    pub max_header_length: usize,

    /// How deeply multiparts may nest. Anything deeper is treated as an opaque
    /// leaf.
    pub max_depth: u32,

    /// The total number of parts the parser will produce for one message.
    pub max_parts: u32,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            max_line_length: 65536,
            max_header_length: 65536,
            max_depth: 20,
            max_parts: 1000,
        }
    }
}

impl ParserConfig {
    pub(crate) fn line_limit(&self) -> usize {
        self.max_line_length.max(16)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// The level used when logging to standard error.
    ///
    /// One of `off`, `error`, `warn`, `info`, `debug`, or `trace`.
    pub level: String,

    /// If set, a log4rs configuration file to use instead of logging to
    /// standard error.
    ///
    /// Relative paths are resolved against the directory containing the
    /// configuration file.
    pub config_file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_owned(),
            config_file: None,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Error reading '{}': {}", .path.display(), .source)]
    Read { path: PathBuf, source: io::Error },
    #[error("Error in config file at '{}': {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl SystemConfig {
    /// Load the configuration from the file at `path`.
    ///
    /// Relative paths inside the file are made absolute with respect to the
    /// file's own directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;

        let mut config: SystemConfig =
            toml::from_slice(&data).map_err(|source| ConfigError::Parse {
                path: path.to_owned(),
                source,
            })?;

        if let (Some(log_file), Some(parent)) =
            (config.logging.config_file.as_mut(), path.parent())
        {
            if log_file.is_relative() {
                *log_file = parent.join(&*log_file);
            }
        }

        Ok(config)
    }

    /// Parse the log level, falling back to `Info` on garbage.
    pub fn log_level(&self) -> log::LevelFilter {
        self.logging.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}
