// SPDX-FileCopyrightText: 2026 Palaver Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scheduling blocks embedded in model output.
//!
//! The model asks for an appointment by emitting
//!
//! ```text
//! [SCHEDULE]
//! { "subject": "...", "date": "YYYY-MM-DD HH:mm", "summary": "..." }
//! [/SCHEDULE]
//! ```
//!
//! somewhere in its reply. Only the first block is considered.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

static SCHEDULE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[SCHEDULE\](.*?)\[/SCHEDULE\]").unwrap());

/// Appointment fields requested by the model. The date is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScheduleRequest {
    pub subject: String,
    pub date: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleBlock {
    Absent,
    Parsed(ScheduleRequest),
    /// Delimiters found but the body is not a valid request.
    Malformed(String),
}

/// Outcome of [`extract_schedule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub block: ScheduleBlock,
    /// Text to deliver: the block stripped when parsed, otherwise the
    /// original reply untouched.
    pub text: String,
}

impl Extraction {
    pub fn request(&self) -> Option<&ScheduleRequest> {
        match &self.block {
            ScheduleBlock::Parsed(request) => Some(request),
            _ => None,
        }
    }
}

/// Finds and parses the first scheduling block in `reply`.
pub fn extract_schedule(reply: &str) -> Extraction {
    let Some(captures) = SCHEDULE_BLOCK.captures(reply) else {
        return Extraction {
            block: ScheduleBlock::Absent,
            text: reply.to_string(),
        };
    };
    let (Some(whole), Some(body)) = (captures.get(0), captures.get(1)) else {
        return Extraction {
            block: ScheduleBlock::Absent,
            text: reply.to_string(),
        };
    };

    match serde_json::from_str::<ScheduleRequest>(body.as_str().trim()) {
        Ok(request) => {
            let before = reply[..whole.start()].trim_end();
            let after = reply[whole.end()..].trim_start();
            let text = match (before.is_empty(), after.is_empty()) {
                (true, _) => after.to_string(),
                (false, true) => before.to_string(),
                (false, false) => format!("{before}\n\n{after}"),
            };
            Extraction {
                block: ScheduleBlock::Parsed(request),
                text,
            }
        }
        Err(e) => Extraction {
            block: ScheduleBlock::Malformed(e.to_string()),
            text: reply.to_string(),
        },
    }
}
