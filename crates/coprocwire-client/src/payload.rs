//! Decoders for the structured payloads the chat UI consumes.
//!
//! These sit above the protocol: the frame layer treats every payload as an
//! opaque string. Two shapes are in use:
//!
//! ```text
//! list:       Alice,Bob,Carol
//! count map:  Alice:::3,Bob:::0
//! ```
//!
//! Nothing here is escaped, so a name containing `,` or `:::` cannot be
//! represented.

use coprocwire_frame::FUNCTION_SEPARATOR;
use serde::Serialize;

/// Separator between entries of a list or count-map payload.
pub const LIST_SEPARATOR: char = ',';

/// Separator between a name and its count inside a count-map entry.
pub const COUNT_SEPARATOR: &str = ":::";

/// One entry of a count-map payload that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadCodecError {
    #[error("malformed entry {index}: {entry:?}")]
    MalformedEntry { index: usize, entry: String },
}

/// Decode a comma-delimited list of names.
///
/// Empty input yields no names. A trailing comma yields a trailing empty
/// string; callers filter it if they need to.
pub fn decode_list(payload: &str) -> Vec<String> {
    if payload.is_empty() {
        return Vec::new();
    }
    payload
        .split(LIST_SEPARATOR)
        .map(|name| name.trim().to_string())
        .collect()
}

/// Unread-message count for one chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreadCount {
    pub name: String,
    pub count: u32,
}

impl UnreadCount {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }
}

/// Result of [`decode_count_map`]: the entries that decoded, in payload
/// order, and one error per entry that did not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountMapDecode {
    pub entries: Vec<UnreadCount>,
    pub errors: Vec<PayloadCodecError>,
}

impl CountMapDecode {
    /// Number of entries skipped as malformed.
    pub fn skipped(&self) -> usize {
        self.errors.len()
    }

    /// Count for `name`, if it decoded. The last entry wins on duplicates.
    pub fn get(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.name == name)
            .map(|entry| entry.count)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.errors.is_empty()
    }
}

/// Decode a `name:::count` list.
///
/// Malformed entries are skipped and reported; they never abort the decode.
/// An entry is malformed when it does not split into exactly two fields, the
/// name is blank, or the count is not a non-negative decimal integer.
pub fn decode_count_map(payload: &str) -> CountMapDecode {
    let mut decoded = CountMapDecode::default();
    if payload.is_empty() {
        return decoded;
    }

    for (index, entry) in payload.split(LIST_SEPARATOR).enumerate() {
        match decode_count_entry(entry) {
            Some(count) => decoded.entries.push(count),
            None => decoded.errors.push(PayloadCodecError::MalformedEntry {
                index,
                entry: entry.to_string(),
            }),
        }
    }
    decoded
}

fn decode_count_entry(entry: &str) -> Option<UnreadCount> {
    let mut fields = entry.split(COUNT_SEPARATOR);
    let name = fields.next()?.trim();
    let count = fields.next()?.trim();
    if fields.next().is_some() || name.is_empty() {
        return None;
    }
    if !count.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let count = count.parse::<u32>().ok()?;
    Some(UnreadCount::new(name, count))
}

/// Display label for a chat with `count` unread messages.
pub fn unread_label(name: &str, count: u32) -> String {
    format!("({count} new) {name}")
}

/// Strip a leading `(N new) ` decoration, if present.
pub fn strip_unread_prefix(label: &str) -> &str {
    let Some(rest) = label.strip_prefix('(') else {
        return label;
    };
    let Some((digits, bare)) = rest.split_once(" new) ") else {
        return label;
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return label;
    }
    bare
}

/// Whether an update for `name` applies to the (possibly decorated) `label`.
///
/// This is a prefix match on the stripped label, so an update for "Al" also
/// matches "Alice".
pub fn label_matches(label: &str, name: &str) -> bool {
    !name.is_empty() && strip_unread_prefix(label).starts_with(name)
}

/// Apply one unread-count update to an existing label.
///
/// Returns `None` when the update does not apply to this label. Otherwise the
/// new label is the bare name when the count is zero or the chat is the
/// active one, and `(N new) name` when it is not.
pub fn merge_label(
    label: &str,
    name: &str,
    count: u32,
    active_chat: Option<&str>,
) -> Option<String> {
    if !label_matches(label, name) {
        return None;
    }
    let is_active = active_chat.is_some_and(|active| active == strip_unread_prefix(label));
    if count == 0 || is_active {
        Some(name.to_string())
    } else {
        Some(unread_label(name, count))
    }
}

/// Apply decoded unread counts to a list of chat labels in place.
///
/// Each update rewrites the first label it matches. Returns the number of
/// labels whose text changed.
pub fn apply_unread_updates(
    labels: &mut [String],
    updates: &[UnreadCount],
    active_chat: Option<&str>,
) -> usize {
    let mut changed = 0;
    for update in updates {
        let Some(slot) = labels
            .iter_mut()
            .find(|label| label_matches(label, &update.name))
        else {
            continue;
        };
        if let Some(merged) = merge_label(slot, &update.name, update.count, active_chat) {
            if *slot != merged {
                *slot = merged;
                changed += 1;
            }
        }
    }
    changed
}

/// Pack a function name and its argument string into one operand.
pub fn pack_function_call(name: &str, arguments: &str) -> String {
    let mut operand = String::with_capacity(name.len() + FUNCTION_SEPARATOR.len() + arguments.len());
    operand.push_str(name);
    operand.push_str(FUNCTION_SEPARATOR);
    operand.push_str(arguments);
    operand
}

/// Split an operand produced by [`pack_function_call`] back into
/// `(name, arguments)`.
///
/// The first separator wins, so arguments may contain it. An operand without
/// a separator is a bare name with empty arguments.
pub fn unpack_function_call(operand: &str) -> (&str, &str) {
    operand
        .split_once(FUNCTION_SEPARATOR)
        .unwrap_or((operand, ""))
}
