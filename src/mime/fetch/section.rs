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

//! ## Regarding message layout
//!
//! IMAP defines a mechanism to access parts of a message based on its
//! multipart hierarchy. Each part of a multipart is assigned a number,
//! starting at 1. Parts can be addressed by multiple subscripts, such that,
//! e.g., `2.3` is the third sub-part of the second part. An empty path
//! addresses the message itself.
//!
//! A message which is not a multipart still has a part 1, which is the
//! message itself. This only applies to a path consisting solely of `1`; a
//! leaf never has children at any deeper level.
//!
//! After the path comes a specifier:
//!
//! - Nothing (`Entire`). At top level, this fetches the whole message. For any
//!   other part, it fetches the part content without its headers.
//!
//! - `HEADER`. Fetches the header block of the addressed part, optionally
//!   filtered by field name.
//!
//! - `MIME`. Fetches the header block of the addressed part.
//!
//! - `TEXT`. Fetches the content of the addressed part.
//!
//! `message/rfc822` parts are not traversed; they are addressed like any
//! other leaf.
//!
//! Finally, a partial range may be applied to the bytes produced by the
//! above. The range is clamped to the data; an offset beyond the end simply
//! produces nothing.

use std::fmt;
use std::io;
use std::str::FromStr;

use log::debug;

use crate::mime::entity::{Entity, MultipartReader};
use crate::mime::header::HeaderFilter;
use crate::support::error::Error;

/// Describes which portion of a part to fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Specifier {
    /// At top level, the header and content. For others, only the content.
    Entire,
    /// The header of the part.
    Header,
    /// The header of the part.
    ///
    /// Unlike `Header`, this is normally only used on sub-parts.
    Mime,
    /// The content of the part.
    Text,
}

impl Default for Specifier {
    fn default() -> Self {
        Specifier::Entire
    }
}

impl Specifier {
    fn include_header(self, addressed_subpart: bool) -> bool {
        match self {
            Self::Entire => !addressed_subpart,
            Self::Header | Self::Mime => true,
            Self::Text => false,
        }
    }

    fn include_body(self) -> bool {
        match self {
            Self::Entire | Self::Text => true,
            Self::Header | Self::Mime => false,
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Unknown section specifier '{0}'")]
pub struct UnknownSpecifier(pub String);

impl FromStr for Specifier {
    type Err = UnknownSpecifier;

    fn from_str(s: &str) -> Result<Self, UnknownSpecifier> {
        if s.eq_ignore_ascii_case("entire") {
            Ok(Specifier::Entire)
        } else if s.eq_ignore_ascii_case("header") {
            Ok(Specifier::Header)
        } else if s.eq_ignore_ascii_case("mime") {
            Ok(Specifier::Mime)
        } else if s.eq_ignore_ascii_case("text") {
            Ok(Specifier::Text)
        } else {
            Err(UnknownSpecifier(s.to_owned()))
        }
    }
}

/// Identifies a particular portion of the body to fetch.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct BodySection {
    /// Which subscripts to traverse to find the part in question.
    pub path: Vec<u32>,
    /// Which subsection of the part to read.
    pub specifier: Specifier,
    /// Which header fields to include whenever the header is written.
    pub header_filter: HeaderFilter,
    /// If set, `(offset, length)` to slice from the data produced by the
    /// above, clamped to its bounds.
    pub partial: Option<(u64, u64)>,
}

impl fmt::Display for BodySection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BODY[")?;
        for (ix, part) in self.path.iter().enumerate() {
            if ix > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", part)?;
        }

        let name = match self.specifier {
            Specifier::Entire => None,
            Specifier::Header => Some("HEADER"),
            Specifier::Mime => Some("MIME"),
            Specifier::Text => Some("TEXT"),
        };
        if let Some(name) = name {
            if !self.path.is_empty() {
                write!(f, ".")?;
            }
            write!(f, "{}", name)?;

            if Specifier::Header == self.specifier
                && !self.header_filter.names.is_empty()
            {
                write!(
                    f,
                    ".FIELDS{} ({})",
                    if self.header_filter.discard_matching {
                        ".NOT"
                    } else {
                        ""
                    },
                    self.header_filter.names.join(" ")
                )?;
            }
        }
        write!(f, "]")?;

        if let Some((offset, length)) = self.partial {
            write!(f, "<{}.{}>", offset, length)?;
        }

        Ok(())
    }
}

/// A section which was successfully fetched.
pub struct FetchedBodySection {
    /// The data from this section.
    pub buffer: Vec<u8>,
    /// Whether this section contains a NUL byte.
    ///
    /// RFC 3516 recommends only using the literal8 syntax when there is at
    /// least one NUL byte.
    pub contains_nul: bool,
}

impl FetchedBodySection {
    pub fn into_reader(self) -> io::Cursor<Vec<u8>> {
        io::Cursor::new(self.buffer)
    }
}

impl fmt::Debug for FetchedBodySection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchedBodySection")
            .field("buffer", &self.buffer.len())
            .field("contains_nul", &self.contains_nul)
            .finish()
    }
}

/// Walk `path` down from `root` and return the entity it addresses.
///
/// Siblings before the addressed part are skipped without being read.
pub fn resolve(root: Entity, path: &[u32]) -> Result<Entity, Error> {
    let mut current = root;
    for (level, &part) in path.iter().enumerate() {
        current = match current.into_multipart() {
            Ok(mut parts) => nth_part(&mut parts, part)?,
            Err(leaf) => {
                if 1 == path.len() && 1 == part {
                    return Ok(leaf);
                }

                debug!(
                    "Part {} requested at level {} of a leaf",
                    part,
                    level + 1
                );
                return Err(Error::NoSuchPart);
            }
        };
    }

    Ok(current)
}

fn nth_part(parts: &mut MultipartReader, n: u32) -> Result<Entity, Error> {
    if 0 == n {
        return Err(Error::NoSuchPart);
    }

    for _ in 1..n {
        if parts.next_part()?.is_none() {
            debug!("Multipart has fewer than {} parts", n);
            return Err(Error::NoSuchPart);
        }
    }

    parts.next_part()?.ok_or_else(|| {
        debug!("Multipart has fewer than {} parts", n);
        Error::NoSuchPart
    })
}

/// Write the portion of `entity` selected by `specifier` into a new buffer.
///
/// `addressed_subpart` indicates whether `entity` was reached by a non-empty
/// path, which suppresses the header for `Specifier::Entire`. `filter` applies
/// whenever the header is written.
pub fn serialize(
    entity: Entity,
    specifier: Specifier,
    addressed_subpart: bool,
    filter: &HeaderFilter,
) -> Result<Vec<u8>, Error> {
    let (header, mut body) = entity.into_parts();
    let mut buffer = Vec::new();

    if specifier.include_header(addressed_subpart) {
        header.write_to(&mut buffer, filter)?;
    }

    if specifier.include_body() {
        io::copy(&mut body, &mut buffer)?;
    }

    Ok(buffer)
}

/// Return the `length` bytes of `buffer` starting at `offset`, clamped to the
/// buffer.
pub fn apply_partial(buffer: &[u8], offset: u64, length: u64) -> &[u8] {
    let len = buffer.len() as u64;
    if offset >= len {
        return &[];
    }

    let end = offset.saturating_add(length).min(len);
    &buffer[offset as usize..end as usize]
}

/// Fetch `section` from the message whose top-level entity is `root`.
pub fn fetch_body_section(
    root: Entity,
    section: &BodySection,
) -> Result<FetchedBodySection, Error> {
    let entity = resolve(root, &section.path)?;
    debug!("Resolved {} to {}", section, entity.content_type());

    let mut buffer = serialize(
        entity,
        section.specifier,
        !section.path.is_empty(),
        &section.header_filter,
    )?;
    debug!("Serialised {} bytes for {}", buffer.len(), section);

    if let Some((offset, length)) = section.partial {
        buffer = apply_partial(&buffer, offset, length).to_vec();
    }

    Ok(FetchedBodySection {
        contains_nul: memchr::memchr(0, &buffer).is_some(),
        buffer,
    })
}
