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

//! A pull parser which exposes a MIME message as a tree of entities.
//!
//! The message is read strictly forward. Each entity shares a single cursor
//! over the input; a child's extent is bounded by the delimiter lines of every
//! multipart enclosing it, so skipping a child (or the rest of one) only ever
//! means reading lines until one of those delimiters shows up.
//!
//! Parsing is lazy: only the header of an entity is parsed up front. Its body
//! is consumed either as a byte stream (`Entity::into_body`) or as a sequence
//! of child entities (`Entity::into_multipart`), never both.
//!
//! Boundaries are recognised only at the start of a line. Lines longer than
//! the configured limit are processed in pieces, so a line starting with
//! something that looks like a boundary part-way through a long line is never
//! mistaken for one. The limit grows to fit the delimiter lines of every
//! multipart found, however long its boundary. A delimiter line carries nothing
//! but the delimiter, an optional closing `--`, and trailing whitespace. The
//! line ending immediately before a delimiter belongs to the delimiter, not to
//! the content.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::io::{self, BufRead, Read};
use std::mem;
use std::rc::Rc;

use log::{debug, warn};

use super::header::{ContentType, Header, HeaderField, CT_TEXT_PLAIN};
use crate::support::error::Error;
use crate::support::system_config::ParserConfig;

/// One line of input, or one piece of an over-long line.
#[derive(Debug)]
struct Line {
    data: Vec<u8>,
    /// Whether `data` starts at the beginning of a line, as opposed to being
    /// the continuation of an over-long one.
    starts_line: bool,
}

/// The cursor over the raw message shared by every entity in the tree.
struct LineSource {
    reader: Box<dyn BufRead>,
    pushed_back: Option<Line>,
    at_line_start: bool,
    wrapped_cr: bool,
    max_line: usize,
}

impl LineSource {
    fn new(reader: Box<dyn BufRead>, max_line: usize) -> Self {
        LineSource {
            reader,
            pushed_back: None,
            at_line_start: true,
            wrapped_cr: false,
            max_line,
        }
    }

    fn next_line(&mut self) -> io::Result<Option<Line>> {
        if let Some(line) = self.pushed_back.take() {
            return Ok(Some(line));
        }

        let mut data = Vec::new();
        if mem::replace(&mut self.wrapped_cr, false) {
            data.push(b'\r');
        }

        let room = (self.max_line - data.len()) as u64;
        self.reader
            .by_ref()
            .take(room)
            .read_until(b'\n', &mut data)?;

        if data.is_empty() {
            return Ok(None);
        }

        // If the piece was cut off right after a CR, that CR may be the first
        // half of a CRLF. Hold it back so the pair is never split.
        if data.len() == self.max_line && data.ends_with(b"\r") {
            data.pop();
            self.wrapped_cr = true;
        }

        let starts_line = self.at_line_start;
        self.at_line_start = data.ends_with(b"\n");
        Ok(Some(Line { data, starts_line }))
    }

    /// Ensure a line of `len` bytes is read in one piece.
    fn fit_line(&mut self, len: usize) {
        self.max_line = self.max_line.max(len);
    }

    fn push_back(&mut self, line: Line) {
        debug_assert!(self.pushed_back.is_none());
        self.pushed_back = Some(line);
    }
}

/// Why a `Bounded` stopped producing lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum End {
    /// The input itself ended.
    Eof,
    /// A delimiter of an enclosing multipart was found. It has been left in
    /// the source for the multipart to consume.
    Delimiter,
}

/// Records the state of a multipart at the time one of its children was
/// produced.
#[derive(Clone)]
struct Guard {
    generation: Rc<Cell<u64>>,
    expected: u64,
}

/// The lines belonging to one entity.
struct Bounded {
    source: Rc<RefCell<LineSource>>,
    /// The delimiters (with the leading `--`) of all enclosing multiparts.
    delimiters: Rc<Vec<Vec<u8>>>,
    guards: Rc<Vec<Guard>>,
    end: Option<End>,
}

impl Bounded {
    fn root(source: LineSource) -> Self {
        Bounded {
            source: Rc::new(RefCell::new(source)),
            delimiters: Rc::new(Vec::new()),
            guards: Rc::new(Vec::new()),
            end: None,
        }
    }

    fn next_line(&mut self) -> io::Result<Option<Line>> {
        for guard in self.guards.iter() {
            if guard.generation.get() != guard.expected {
                panic!("Body part read after its multipart moved past it");
            }
        }

        if self.end.is_some() {
            return Ok(None);
        }

        let mut source = self.source.borrow_mut();
        let line = match source.next_line()? {
            Some(line) => line,
            None => {
                self.end = Some(End::Eof);
                return Ok(None);
            }
        };

        if line.starts_line
            && self
                .delimiters
                .iter()
                .any(|d| match_delimiter(&line.data, d).is_some())
        {
            source.push_back(line);
            self.end = Some(End::Delimiter);
            return Ok(None);
        }

        Ok(Some(line))
    }
}

/// State shared by every entity of one message.
struct Context {
    config: ParserConfig,
    part_count: Cell<u32>,
}

/// A single MIME entity: either the message itself or one of its body parts.
pub struct Entity {
    header: Header,
    content_type: ContentType<'static>,
    lines: Bounded,
    /// The delimiter (with the leading `--`) if this is a multipart whose
    /// children will be parsed.
    delimiter: Option<Vec<u8>>,
    depth: u32,
    ctx: Rc<Context>,
}

impl Entity {
    /// Start parsing the message in `reader`.
    ///
    /// Only the top-level header is read before this returns.
    pub fn read(
        reader: impl BufRead + 'static,
        config: &ParserConfig,
    ) -> Result<Self, Error> {
        let source = LineSource::new(Box::new(reader), config.line_limit());
        let ctx = Rc::new(Context {
            config: config.clone(),
            part_count: Cell::new(0),
        });
        Ok(Entity::parse(Bounded::root(source), ctx, 0)?)
    }

    fn parse(
        mut lines: Bounded,
        ctx: Rc<Context>,
        depth: u32,
    ) -> io::Result<Self> {
        let header = read_header(&mut lines, ctx.config.max_header_length)?;
        let content_type = header
            .content_type()
            .map(ContentType::into_owned)
            .unwrap_or(CT_TEXT_PLAIN);

        let delimiter = if content_type.is_type("multipart") {
            match content_type.parm("boundary") {
                Some(boundary) if boundary.is_empty() => {
                    debug!("Multipart with empty boundary treated as leaf");
                    None
                }
                Some(_) if depth >= ctx.config.max_depth => {
                    warn!(
                        "Multipart nested more than {} deep treated as leaf",
                        ctx.config.max_depth
                    );
                    None
                }
                Some(boundary) => {
                    let mut delimiter = b"--".to_vec();
                    delimiter.extend_from_slice(boundary);
                    Some(delimiter)
                }
                None => {
                    debug!("Multipart without boundary treated as leaf");
                    None
                }
            }
        } else {
            None
        };

        if let Some(ref delimiter) = delimiter {
            // Room for the closing `--` and the line ending
            lines.source.borrow_mut().fit_line(delimiter.len() + 4);
        }

        Ok(Entity {
            header,
            content_type,
            lines,
            delimiter,
            depth,
            ctx,
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The effective content type; `text/plain` if none was given.
    pub fn content_type(&self) -> &ContentType<'static> {
        &self.content_type
    }

    /// Whether this entity has child entities.
    ///
    /// A multipart without a usable boundary, or one nested too deeply, is
    /// considered a leaf.
    pub fn is_multipart(&self) -> bool {
        self.delimiter.is_some()
    }

    /// Consume the entity, returning a stream over its raw body.
    ///
    /// For a multipart, this is the full multipart body including preamble,
    /// delimiters, and epilogue.
    pub fn into_body(self) -> Body {
        Body::new(self.lines)
    }

    /// Consume the entity, returning both its header and body stream.
    pub fn into_parts(self) -> (Header, Body) {
        (self.header, Body::new(self.lines))
    }

    /// Consume the entity, returning an iterator over its children.
    ///
    /// If this is not a multipart, the entity is handed back unchanged.
    pub fn into_multipart(self) -> Result<MultipartReader, Self> {
        match self.delimiter {
            Some(delimiter) => Ok(MultipartReader {
                header: self.header,
                lines: self.lines,
                delimiter,
                generation: Rc::new(Cell::new(0)),
                finished: false,
                depth: self.depth,
                ctx: self.ctx,
            }),
            None => Err(self),
        }
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("header", &self.header)
            .field("content_type", &self.content_type)
            .field("multipart", &self.delimiter.is_some())
            .field("depth", &self.depth)
            .finish()
    }
}

fn read_header(lines: &mut Bounded, max_len: usize) -> io::Result<Header> {
    fn flush(header: &mut Header, raw: Vec<u8>) {
        match HeaderField::parse(raw) {
            Some(field) => header.push(field),
            None => debug!("Ignoring malformed header line"),
        }
    }

    let mut header = Header::default();
    let mut pending = Vec::<u8>::new();

    while let Some(line) = lines.next_line()? {
        let continuation = !line.starts_line
            || line.data.starts_with(b" ")
            || line.data.starts_with(b"\t");

        if !continuation && !pending.is_empty() {
            flush(&mut header, mem::take(&mut pending));
        }

        if line.starts_line && (line.data == b"\r\n" || line.data == b"\n") {
            header.set_separator(line.data);
            return Ok(header);
        }

        if !continuation {
            pending = line.data;
        } else if pending.is_empty() {
            debug!("Ignoring header continuation with no field");
        } else if pending.len() + line.data.len() > max_len {
            debug!("Truncating header field longer than {} bytes", max_len);
        } else {
            pending.extend_from_slice(&line.data);
        }
    }

    if !pending.is_empty() {
        flush(&mut header, pending);
    }

    Ok(header)
}

/// The raw content of an entity.
///
/// This is a single-use stream. If the entity is a child of a multipart,
/// reading from it after the multipart has moved on to the next child panics.
pub struct Body {
    lines: Bounded,
    /// The line ending of the last line, which is not known to be content
    /// until it is known not to precede a delimiter.
    held_ending: &'static [u8],
    chunk: Vec<u8>,
    pos: usize,
}

impl Body {
    fn new(lines: Bounded) -> Self {
        Body {
            lines,
            held_ending: b"",
            chunk: Vec::new(),
            pos: 0,
        }
    }

    fn fill(&mut self) -> io::Result<bool> {
        self.chunk.clear();
        self.pos = 0;

        match self.lines.next_line()? {
            Some(line) => {
                let (content, ending) = split_line_ending(&line.data);
                self.chunk.extend_from_slice(self.held_ending);
                self.chunk.extend_from_slice(content);
                self.held_ending = ending;
                Ok(true)
            }

            None => {
                let ending = mem::replace(&mut self.held_ending, b"");
                if Some(End::Eof) == self.lines.end && !ending.is_empty() {
                    self.chunk.extend_from_slice(ending);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }
}

impl Read for Body {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.chunk.len() {
            if !self.fill()? {
                return Ok(0);
            }
        }

        let n = dst.len().min(self.chunk.len() - self.pos);
        dst[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Body {{ end: {:?} }}", self.lines.end)
    }
}

fn split_line_ending(line: &[u8]) -> (&[u8], &'static [u8]) {
    if line.ends_with(b"\r\n") {
        (&line[..line.len() - 2], b"\r\n")
    } else if line.ends_with(b"\n") {
        (&line[..line.len() - 1], b"\n")
    } else {
        (line, b"")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Delimiter {
    Open,
    Close,
}

/// Classify `line` as a delimiter line for `delimiter`, if it is one.
///
/// After the delimiter (and the `--` of a closing delimiter) only linear
/// whitespace may follow, so content lines which merely start with the
/// delimiter are not mistaken for one.
fn match_delimiter(line: &[u8], delimiter: &[u8]) -> Option<Delimiter> {
    if !line.starts_with(delimiter) {
        return None;
    }

    let rest = &line[delimiter.len()..];
    let (kind, rest) = if rest.starts_with(b"--") {
        (Delimiter::Close, &rest[2..])
    } else {
        (Delimiter::Open, rest)
    };

    if rest.iter().all(|&b| b" \t\r\n".contains(&b)) {
        Some(kind)
    } else {
        None
    }
}

/// Iterates the children of a multipart entity, strictly in order.
///
/// Producing a child invalidates the body of the previously produced one.
pub struct MultipartReader {
    header: Header,
    lines: Bounded,
    delimiter: Vec<u8>,
    generation: Rc<Cell<u64>>,
    finished: bool,
    depth: u32,
    ctx: Rc<Context>,
}

impl MultipartReader {
    /// The header of the multipart entity itself.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Advance to the next child.
    ///
    /// Returns `Ok(None)` once the closing delimiter has been seen, the
    /// enclosing extent ends, or the per-message part limit is reached; every
    /// call after that also returns `Ok(None)`.
    pub fn next_part(&mut self) -> Result<Option<Entity>, Error> {
        if self.finished {
            return Ok(None);
        }

        self.generation.set(self.generation.get() + 1);

        loop {
            let line = match self.lines.next_line()? {
                Some(line) => line,
                None => {
                    debug!("Multipart ended without closing delimiter");
                    self.finished = true;
                    return Ok(None);
                }
            };

            if !line.starts_line {
                continue;
            }

            match match_delimiter(&line.data, &self.delimiter) {
                None => continue,
                Some(Delimiter::Close) => {
                    self.finished = true;
                    return Ok(None);
                }
                Some(Delimiter::Open) => (),
            }

            let count = self.ctx.part_count.get();
            if count >= self.ctx.config.max_parts {
                warn!(
                    "Message has more than {} parts; ignoring the rest",
                    self.ctx.config.max_parts
                );
                self.finished = true;
                return Ok(None);
            }
            self.ctx.part_count.set(count + 1);

            let child = Entity::parse(
                self.child_lines(),
                Rc::clone(&self.ctx),
                self.depth + 1,
            )?;
            return Ok(Some(child));
        }
    }

    fn child_lines(&self) -> Bounded {
        let mut delimiters = Vec::clone(&self.lines.delimiters);
        delimiters.push(self.delimiter.clone());
        let mut guards = Vec::clone(&self.lines.guards);
        guards.push(Guard {
            generation: Rc::clone(&self.generation),
            expected: self.generation.get(),
        });

        Bounded {
            source: Rc::clone(&self.lines.source),
            delimiters: Rc::new(delimiters),
            guards: Rc::new(guards),
            end: None,
        }
    }
}

impl Iterator for MultipartReader {
    type Item = Result<Entity, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_part().transpose()
    }
}

impl fmt::Debug for MultipartReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartReader")
            .field("header", &self.header)
            .field("finished", &self.finished)
            .field("depth", &self.depth)
            .finish()
    }
}
