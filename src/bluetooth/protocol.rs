// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Wire protocol spoken to the lock controller.
//!
//! Commands are plain ASCII terminated by CRLF. Nothing is read back.

use std::fmt;

/// Line terminator appended to every command.
pub const LINE_ENDING: &str = "\r\n";

/// Commands understood by the lock controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Release the lock.
    Open,
    /// Engage the lock.
    Close,
}

impl Command {
    /// Parse from user input (case-insensitive, surrounding whitespace ignored).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "OPEN" => Some(Self::Open),
            "CLOSE" => Some(Self::Close),
            _ => None,
        }
    }

    /// Get string code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Close => "CLOSE",
        }
    }

    /// Bytes written to the transport, terminator included.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::Open => b"OPEN\r\n",
            Self::Close => b"CLOSE\r\n",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
