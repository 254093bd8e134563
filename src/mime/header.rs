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

//! Utilities for working with individual RFC 2822 headers.
//!
//! Header fields are kept in their raw form so that they can be written back
//! out byte-for-byte. Only `Content-Type` is understood structurally, since
//! the parser needs it to find multipart boundaries.

use std::borrow::Cow;
use std::fmt;
use std::io::{self, Write};
use std::str;

use nom::{
    branch::alt,
    bytes::complete::{is_a, is_not, tag},
    combinator::map,
    *,
};

/// A single header field, exactly as it appeared in the message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderField {
    raw: Vec<u8>,
    name: String,
    colon: usize,
}

impl HeaderField {
    /// Split a raw header line (including any continuation lines and the line
    /// ending) into a field.
    ///
    /// Returns `None` if the line has no colon or the name is not valid UTF-8.
    pub fn parse(raw: Vec<u8>) -> Option<Self> {
        let colon = memchr::memchr(b':', &raw)?;
        let name = str::from_utf8(&raw[..colon]).ok()?.trim();
        if name.is_empty() {
            return None;
        }

        Some(HeaderField {
            name: name.to_owned(),
            colon,
            raw,
        })
    }

    /// The field name, without surrounding whitespace.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The raw value, including folding and the final line ending.
    pub fn value(&self) -> &[u8] {
        &self.raw[self.colon + 1..]
    }

    /// The entire field as it appeared in the message.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Whether this field's name is `name`, ignoring ASCII case.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// The header block of a message or body part.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Header {
    fields: Vec<HeaderField>,
    separator: Option<Vec<u8>>,
}

impl Header {
    /// All fields, in the order they occurred.
    pub fn fields(&self) -> &[HeaderField] {
        &self.fields
    }

    /// The first field with the given name, if any.
    pub fn get(&self, name: &str) -> Option<&HeaderField> {
        self.fields.iter().find(|f| f.is_named(name))
    }

    /// The blank line which ended the header block.
    ///
    /// `None` if the input ended (or the enclosing part ended) before a blank
    /// line was found.
    pub fn separator(&self) -> Option<&[u8]> {
        self.separator.as_deref()
    }

    /// The first well-formed `Content-Type`, if there is one.
    pub fn content_type(&self) -> Option<ContentType<'_>> {
        self.fields
            .iter()
            .filter(|f| f.is_named("Content-Type"))
            .find_map(|f| parse_content_type(f.value()))
    }

    pub(crate) fn push(&mut self, field: HeaderField) {
        self.fields.push(field);
    }

    pub(crate) fn set_separator(&mut self, separator: Vec<u8>) {
        self.separator = Some(separator);
    }

    /// Write the header block to `dst`.
    ///
    /// Fields rejected by `filter` are skipped; everything else is copied
    /// verbatim. A field truncated by the end of input gets a line ending
    /// added so that the output stays line-structured. The blank separator
    /// line is only written if the source had one.
    pub fn write_to(
        &self,
        mut dst: impl Write,
        filter: &HeaderFilter,
    ) -> io::Result<()> {
        for field in self.fields.iter().filter(|f| filter.keeps(f.name())) {
            dst.write_all(&field.raw)?;
            // Lines may be truncated at the end of the input
            if !field.raw.ends_with(b"\n") {
                if field.raw.ends_with(b"\r") {
                    dst.write_all(b"\n")?;
                } else {
                    dst.write_all(b"\r\n")?;
                }
            }
        }

        if let Some(ref separator) = self.separator {
            dst.write_all(separator)?;
        }

        Ok(())
    }
}

/// Selects which header fields are written.
///
/// This corresponds to IMAP's `HEADER.FIELDS` and `HEADER.FIELDS.NOT`.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct HeaderFilter {
    /// The field names to match, compared case-insensitively.
    ///
    /// If empty, the filter keeps everything regardless of
    /// `discard_matching`.
    pub names: Vec<String>,
    /// If true, discard fields matching `names`.
    ///
    /// If false, keep only fields matching `names`.
    pub discard_matching: bool,
}

impl HeaderFilter {
    /// A filter which keeps only the named fields.
    pub fn only<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        HeaderFilter {
            names: names.into_iter().map(Into::into).collect(),
            discard_matching: false,
        }
    }

    /// A filter which keeps everything except the named fields.
    pub fn excluding<S: Into<String>>(
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        HeaderFilter {
            names: names.into_iter().map(Into::into).collect(),
            discard_matching: true,
        }
    }

    pub fn keeps(&self, name: &str) -> bool {
        if self.names.is_empty() {
            return true;
        }

        let matches = self.names.iter().any(|n| name.eq_ignore_ascii_case(n));
        matches != self.discard_matching
    }
}

/// A parsed RFC 2045 `Content-Type`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentType<'a> {
    pub typ: Cow<'a, [u8]>,
    pub subtype: Cow<'a, [u8]>,
    pub parms: Vec<(Cow<'a, [u8]>, Cow<'a, [u8]>)>,
}

pub const CT_TEXT_PLAIN: ContentType<'static> = ContentType {
    typ: Cow::Borrowed(b"text"),
    subtype: Cow::Borrowed(b"plain"),
    parms: vec![],
};

impl<'a> ContentType<'a> {
    pub fn is_type(&self, typ: &str) -> bool {
        self.typ.eq_ignore_ascii_case(typ.as_bytes())
    }

    pub fn is_subtype(&self, subtype: &str) -> bool {
        self.subtype.eq_ignore_ascii_case(subtype.as_bytes())
    }

    /// The value of the first parameter called `name`, if any.
    pub fn parm(&self, name: &str) -> Option<&[u8]> {
        self.parms
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name.as_bytes()))
            .map(|(_, v)| &**v)
    }

    pub fn into_owned(self) -> ContentType<'static> {
        ContentType {
            typ: Cow::Owned(self.typ.into_owned()),
            subtype: Cow::Owned(self.subtype.into_owned()),
            parms: self
                .parms
                .into_iter()
                .map(|(k, v)| {
                    (Cow::Owned(k.into_owned()), Cow::Owned(v.into_owned()))
                })
                .collect(),
        }
    }
}

impl fmt::Display for ContentType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            String::from_utf8_lossy(&self.typ),
            String::from_utf8_lossy(&self.subtype)
        )
    }
}

/// Parse the value of a `Content-Type` header.
///
/// Parameters are read until the first one that fails to parse; anything
/// after that is ignored.
pub fn parse_content_type(value: &[u8]) -> Option<ContentType<'_>> {
    content_type(value).ok().map(|(_, ct)| ct)
}

// RFC 2822 3.2.3 "Folding white space".
// Values are kept folded, so the line-ending characters are treated as simple
// whitespace.
fn fws(i: &[u8]) -> IResult<&[u8], ()> {
    map(is_a(" \t\r\n"), |_| ())(i)
}

// RFC 2822 3.2.2 "quoted-pair", including the 8-bit clean "obsolete" syntax
fn quoted_pair(i: &[u8]) -> IResult<&[u8], &[u8]> {
    sequence::preceded(tag("\\"), bytes::complete::take(1usize))(i)
}

// RFC 2822 3.2.3 "Comment text".
fn ctext(i: &[u8]) -> IResult<&[u8], &[u8]> {
    is_not("()\\ \t\r\n")(i)
}

// RFC 2822 3.2.3 "Comment content".
// The original definition includes FWS in the comment syntax instead of here,
// which makes it a lot more complicated.
fn ccontent(i: &[u8]) -> IResult<&[u8], ()> {
    alt((map(ctext, |_| ()), map(quoted_pair, |_| ()), fws, comment))(i)
}

// RFC 2822 3.2.3 "Comment". Note it is recursive.
fn comment(i: &[u8]) -> IResult<&[u8], ()> {
    map(
        sequence::delimited(tag("("), multi::many0_count(ccontent), tag(")")),
        |_| (),
    )(i)
}

// RFC 2822 3.2.3 "Comment or folding white space".
fn cfws(i: &[u8]) -> IResult<&[u8], ()> {
    map(multi::many0_count(alt((fws, comment))), |_| ())(i)
}

// RFC 2045 "token"
fn token(i: &[u8]) -> IResult<&[u8], &[u8]> {
    bytes::complete::take_while1(|b| match b {
        0..=b' ' | 127 => false,
        b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\'
        | b'"' | b'/' | b'[' | b']' | b'?' | b'=' => false,
        _ => true,
    })(i)
}

// RFC 2822 3.2.5 "Quoted [string] content"
// Whitespace inside the quotes is significant for boundaries, so only the
// line breaks of folding are removed.
fn qcontent(i: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((
        is_not("\r\n\\\""),
        quoted_pair,
        map(is_a("\r\n"), |_| &b""[..]),
    ))(i)
}

// RFC 2822 3.2.5 "Quoted string"
fn quoted_string(i: &[u8]) -> IResult<&[u8], Vec<u8>> {
    sequence::delimited(
        sequence::pair(cfws, tag("\"")),
        multi::fold_many0(qcontent, Vec::new(), |mut acc: Vec<u8>, item| {
            acc.extend_from_slice(item);
            acc
        }),
        sequence::pair(tag("\""), cfws),
    )(i)
}

// RFC 2045 "parameter"
fn parameter(i: &[u8]) -> IResult<&[u8], (Cow<[u8]>, Cow<[u8]>)> {
    sequence::separated_pair(
        map(sequence::delimited(cfws, token, cfws), Cow::Borrowed),
        tag("="),
        alt((
            map(quoted_string, Cow::Owned),
            map(sequence::delimited(cfws, token, cfws), Cow::Borrowed),
        )),
    )(i)
}

// RFC 2045 "content"
fn content_type(i: &[u8]) -> IResult<&[u8], ContentType<'_>> {
    let (i, _) = cfws(i)?;
    let (i, typ) = token(i)?;
    let (i, _) = sequence::tuple((cfws, tag("/"), cfws))(i)?;
    let (i, subtype) = token(i)?;
    let (i, _) = cfws(i)?;
    let (i, parms) = multi::many0(sequence::preceded(
        sequence::pair(tag(";"), cfws),
        parameter,
    ))(i)?;

    Ok((
        i,
        ContentType {
            typ: Cow::Borrowed(typ),
            subtype: Cow::Borrowed(subtype),
            parms,
        },
    ))
}
