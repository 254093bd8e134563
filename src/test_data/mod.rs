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

//! Sample messages for tests.
//!
//! All files use DOS line endings.

/// A message whose parts nest four levels deep, with a preamble and an
/// epilogue at the top level.
///
/// Structure:
///
/// ```text
/// multipart/mixed
///   1 text/plain
///   2 text/plain
///   3 multipart/alternative
///     3.1 text/plain
///     3.2 text/html
///   4 multipart/mixed
///     4.1 image/gif
///     4.2 multipart/related
///       4.2.1 text/plain
///       4.2.2 multipart/mixed
///         4.2.2.1 text/plain
///         4.2.2.2 text/plain
/// ```
pub static NESTED: &[u8] = include_bytes!("nested.eml");

/// A typical message with an alternative text/HTML body followed by a text
/// attachment.
pub static MIXED: &[u8] = include_bytes!("mixed.eml");

/// The body of the attachment in `MIXED`.
pub static MIXED_ATTACHMENT_BODY: &[u8] =
    b"Lorem ipsum dolor sit amet, consectetur adipiscing elit.";

/// A minimal single-part message.
pub static PLAIN: &[u8] = b"MIME-Version: 1.0\r\n\
Content-Type: text/plain; charset=\"UTF-8\"\r\n\
\r\n\
Hello, World!";
