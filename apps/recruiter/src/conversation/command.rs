//! Follow-up command grammar. Anything that is not a command is a new query.

use crate::errors::SelectionProblem;

/// Index-addressed follow-up actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Resume,
    Detail,
    Contact,
}

impl CommandKind {
    /// The canonical word shown in usage hints.
    pub fn keyword(self) -> &'static str {
        match self {
            CommandKind::Resume => "简历",
            CommandKind::Detail => "信息",
            CommandKind::Contact => "联系",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Select { kind: CommandKind, index: usize },
    More,
    End,
    Query(String),
}

const COMMAND_WORDS: &[(&str, CommandKind)] = &[
    ("简历", CommandKind::Resume),
    ("resume", CommandKind::Resume),
    ("信息", CommandKind::Detail),
    ("detail", CommandKind::Detail),
    ("联系", CommandKind::Contact),
    ("联络", CommandKind::Contact),
    ("聯絡", CommandKind::Contact),
    ("contact", CommandKind::Contact),
];

/// Longest argument still read as a mistyped index ("简历 x") rather than as query text.
const MAX_STRAY_ARGUMENT_CHARS: usize = 4;

/// Classifies one inbound message.
///
/// A command word followed by digits, with or without a space, selects by index. A command word
/// alone, or followed by a short non-numeric token, is malformed. Anything else is query text,
/// so "信息技术工程师" stays a query.
pub fn parse(text: &str) -> Result<Command, SelectionProblem> {
    let text = text.trim();

    if text.eq_ignore_ascii_case("a") {
        return Ok(Command::More);
    }
    if text.eq_ignore_ascii_case("b") {
        return Ok(Command::End);
    }

    // ASCII lowercasing keeps byte offsets valid for slicing the original text
    let lowered = text.to_ascii_lowercase();
    for (word, kind) in COMMAND_WORDS {
        if !lowered.starts_with(word) {
            continue;
        }
        let rest = &text[word.len()..];
        let argument = rest.trim();

        if argument.is_empty() {
            return Err(SelectionProblem::Malformed { command: *kind });
        }
        if argument.bytes().all(|b| b.is_ascii_digit()) {
            return match argument.parse::<usize>() {
                Ok(index) => Ok(Command::Select { kind: *kind, index }),
                // too many digits to be an index into any page
                Err(_) => Err(SelectionProblem::Malformed { command: *kind }),
            };
        }
        if is_stray_argument(rest) {
            return Err(SelectionProblem::Malformed { command: *kind });
        }
        break;
    }

    Ok(Command::Query(text.to_string()))
}

fn is_stray_argument(rest: &str) -> bool {
    let separated = rest.starts_with(char::is_whitespace);
    let argument = rest.trim();
    separated
        && !argument.contains(char::is_whitespace)
        && argument.chars().count() <= MAX_STRAY_ARGUMENT_CHARS
        && argument.is_ascii()
}
