// src/io/record.rs
//
// The decoded joystick packet.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One decoded packet: horizontal, vertical, click flag and auxiliary byte.
///
/// Fields are parsed as unbounded signed integers; no range checks are applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub h: i64,
    pub v: i64,
    pub c: i64,
    pub r: i64,
}

impl Record {
    /// Stick centred, button released, idle.
    pub const SENTINEL: Record = Record {
        h: 512,
        v: 512,
        c: 1,
        r: 0,
    };

    pub const fn new(h: i64, v: i64, c: i64, r: i64) -> Self {
        Record { h, v, c, r }
    }

    pub fn as_tuple(&self) -> (i64, i64, i64, i64) {
        (self.h, self.v, self.c, self.r)
    }
}

impl Default for Record {
    fn default() -> Self {
        Record::SENTINEL
    }
}

/// Renders as the wire form `h,v,c,r`
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.h, self.v, self.c, self.r)
    }
}
