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

use std::io;

use thiserror::Error;

/// Errors produced while locating or extracting a body section.
#[derive(Error, Debug)]
pub enum Error {
    /// The section path names a part which does not exist in the message.
    ///
    /// This is not fatal to the session; IMAP servers typically report it as
    /// a nonexistent (or empty) section.
    #[error("No such message body part")]
    NoSuchPart,
    #[error(transparent)]
    Io(#[from] io::Error),
}
