//! Parser for rsync's `--itemize-changes` output.
//!
//! Each change line is an 11-character code followed by a single space and
//! the path relative to the transfer root. The code is kept verbatim: the
//! classifier only ever compares whole codes, so nothing here interprets or
//! normalizes individual positions beyond what diagnostics need.

use std::fmt;

/// Width of the itemized change code.
pub const FLAGS_WIDTH: usize = 11;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unrecognized line: {0:?}")]
    UnrecognizedLine(String),
}

/// Names of the attribute positions 2..=10 of an itemized code.
const ATTRIBUTE_NAMES: [&str; FLAGS_WIDTH - 2] = [
    "checksum", "size", "time", "perms", "owner", "group", "u-slot", "acl", "xattr",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemizeFlags(String);

impl ItemizeFlags {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Update type, e.g. `>` (received), `c` (created), `.` (unchanged), `*` (message).
    pub fn update_type(&self) -> char {
        self.0.chars().next().unwrap_or(' ')
    }

    /// Attribute names whose position carries a change letter or `+`.
    ///
    /// Message codes such as `*deleting  ` have no attribute positions and
    /// yield nothing.
    pub fn changed_attributes(&self) -> Vec<&'static str> {
        if self.update_type() == '*' {
            return Vec::new();
        }

        self.0
            .chars()
            .skip(2)
            .zip(ATTRIBUTE_NAMES)
            .filter(|(c, _)| !matches!(c, '.' | ' '))
            .map(|(_, name)| name)
            .collect()
    }
}

impl fmt::Display for ItemizeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub flags: ItemizeFlags,
    pub path: String,
}

impl ChangeRecord {
    #[cfg(test)]
    pub fn new(flags: &str, path: &str) -> Self {
        ChangeRecord {
            flags: ItemizeFlags(flags.to_string()),
            path: path.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Change(ChangeRecord),
    /// An empty line, which rsync emits right before its statistics block.
    Blank,
}

/// Parse a single line of itemized output.
///
/// A trailing carriage return is tolerated. Anything else that isn't an empty
/// line or `<11-char code> <path>` is an [`ParseError::UnrecognizedLine`].
pub fn parse_line(line: &str) -> Result<ParsedLine, ParseError> {
    let line = line.strip_suffix('\r').unwrap_or(line);

    if line.is_empty() {
        return Ok(ParsedLine::Blank);
    }

    let unrecognized = || ParseError::UnrecognizedLine(line.to_string());

    if line.starts_with(char::is_whitespace) {
        return Err(unrecognized());
    }

    // Byte offset just past the 11th character; flags are ASCII in practice
    // but a multi-byte character must not split the string.
    let flags_end = line
        .char_indices()
        .nth(FLAGS_WIDTH)
        .map(|(idx, _)| idx)
        .ok_or_else(unrecognized)?;

    let (flags, rest) = line.split_at(flags_end);
    let path = rest.strip_prefix(' ').ok_or_else(unrecognized)?;

    if path.is_empty() {
        return Err(unrecognized());
    }

    Ok(ParsedLine::Change(ChangeRecord {
        flags: ItemizeFlags(flags.to_string()),
        path: path.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(line: &str) -> ChangeRecord {
        match parse_line(line).unwrap() {
            ParsedLine::Change(record) => record,
            ParsedLine::Blank => panic!("Expected change record for {line:?}"),
        }
    }

    #[test]
    fn parses_received_file() {
        let record = change(">fcst...... dir/file.txt");
        assert_eq!(record.flags.as_str(), ">fcst......");
        assert_eq!(record.path, "dir/file.txt");
        assert_eq!(record.flags.update_type(), '>');
    }

    #[test]
    fn parses_root_timestamp_line() {
        let record = change(".d..t...... ./");
        assert_eq!(record.flags.as_str(), ".d..t......");
        assert_eq!(record.path, "./");
    }

    #[test]
    fn path_keeps_spaces_and_trailing_text_verbatim() {
        let record = change("cd+++++++++ my dir/with  two spaces/");
        assert_eq!(record.path, "my dir/with  two spaces/");
    }

    #[test]
    fn deleting_message_keeps_spaces_in_flags() {
        let record = change("*deleting   old/file");
        assert_eq!(record.flags.as_str(), "*deleting  ");
        assert_eq!(record.path, "old/file");
        assert!(record.flags.changed_attributes().is_empty());
    }

    #[test]
    fn unknown_flag_characters_are_preserved() {
        let record = change("?Z!#%&@~^=$ weird");
        assert_eq!(record.flags.as_str(), "?Z!#%&@~^=$");
    }

    #[test]
    fn multibyte_characters_in_flags_do_not_split() {
        let record = change("éééééééééé. x");
        assert_eq!(record.flags.as_str().chars().count(), FLAGS_WIDTH);
        assert_eq!(record.path, "x");
    }

    #[test]
    fn empty_line_is_blank() {
        assert_eq!(parse_line(""), Ok(ParsedLine::Blank));
        assert_eq!(parse_line("\r"), Ok(ParsedLine::Blank));
    }

    #[test]
    fn carriage_return_is_stripped() {
        let record = change(">f+++++++++ new.txt\r");
        assert_eq!(record.path, "new.txt");
    }

    #[test]
    fn whitespace_prefixed_line_is_unrecognized() {
        assert!(parse_line(" Number of files: 3").is_err());
        assert!(parse_line("\t>f+++++++++ x").is_err());
    }

    #[test]
    fn short_line_is_unrecognized() {
        assert_eq!(
            parse_line("sent 12 b"),
            Err(ParseError::UnrecognizedLine("sent 12 b".to_string()))
        );
    }

    #[test]
    fn missing_separator_is_unrecognized() {
        assert!(parse_line(">f+++++++++xnew.txt").is_err());
    }

    #[test]
    fn missing_path_is_unrecognized() {
        assert!(parse_line(">f+++++++++ ").is_err());
        assert!(parse_line(">f+++++++++").is_err());
    }

    #[test]
    fn changed_attributes_names_letters() {
        let record = change(">fcstp...ax f");
        assert_eq!(
            record.flags.changed_attributes(),
            vec!["checksum", "size", "time", "perms", "acl", "xattr"]
        );

        let created = change("cd+++++++++ sub/");
        assert_eq!(created.flags.changed_attributes().len(), 9);
    }
}
