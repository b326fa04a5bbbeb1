// NUT network protocol helpers: command quoting, reply tokenizing, VAR line parsing.

use super::NutError;

/// Quote an argument if upsd would otherwise split or misread it.
pub(crate) fn quote(arg: &str) -> String {
    let needs_quotes = arg.is_empty()
        || arg
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\\');
    if !needs_quotes {
        return arg.to_string();
    }
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Build a newline-terminated command line, e.g. `LIST VAR "my ups"\n`.
pub(crate) fn command(verb: &str, args: &[&str]) -> String {
    let mut line = verb.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&quote(arg));
    }
    line.push('\n');
    line
}

/// Split a reply into words, honoring double quotes and backslash escapes.
pub(crate) fn split_words(line: &str) -> Result<Vec<String>, NutError> {
    let mut words = Vec::new();
    let mut chars = line.trim_end_matches(['\r', '\n']).chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(first) = chars.next() else {
            break;
        };
        let mut word = String::new();
        if first == '"' {
            let mut closed = false;
            while let Some(c) = chars.next() {
                match c {
                    '\\' => match chars.next() {
                        Some(escaped) => word.push(escaped),
                        None => break,
                    },
                    '"' => {
                        closed = true;
                        break;
                    }
                    _ => word.push(c),
                }
            }
            if !closed {
                return Err(NutError::Protocol(format!(
                    "unterminated quote in {:?}",
                    line
                )));
            }
        } else {
            let mut c = first;
            loop {
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        word.push(escaped);
                    }
                } else {
                    word.push(c);
                }
                match chars.next_if(|c| !c.is_whitespace()) {
                    Some(next) => c = next,
                    None => break,
                }
            }
        }
        words.push(word);
    }
    Ok(words)
}

/// Map an `ERR <code> ...` reply to an error; anything else passes through.
pub(crate) fn check_err(line: &str) -> Result<(), NutError> {
    let mut parts = line.trim_end().splitn(3, ' ');
    if parts.next() == Some("ERR") {
        let code = parts.next().unwrap_or("UNKNOWN").to_string();
        return Err(NutError::Server { code });
    }
    Ok(())
}

/// Expect a plain `OK` (optionally followed by text) reply.
pub(crate) fn expect_ok(line: &str) -> Result<(), NutError> {
    check_err(line)?;
    if line.trim_end() == "OK" || line.starts_with("OK ") {
        Ok(())
    } else {
        Err(NutError::Protocol(format!(
            "expected OK, got {:?}",
            line.trim_end()
        )))
    }
}

/// One line of a `LIST VAR` body.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ListLine {
    Var { name: String, value: String },
    End,
}

/// Parse a line inside `BEGIN LIST VAR <ups>` / `END LIST VAR <ups>`.
pub(crate) fn parse_list_line(line: &str, ups: &str) -> Result<ListLine, NutError> {
    check_err(line)?;
    let words = split_words(line)?;
    match words.as_slice() {
        [kw, name, var, value] if kw == "VAR" && name == ups => Ok(ListLine::Var {
            name: var.clone(),
            value: value.clone(),
        }),
        [end, list, var, name] if end == "END" && list == "LIST" && var == "VAR" && name == ups => {
            Ok(ListLine::End)
        }
        _ => Err(NutError::Protocol(format!(
            "unexpected line in variable list: {:?}",
            line.trim_end()
        ))),
    }
}

/// Check the header that opens a `LIST VAR` reply.
pub(crate) fn expect_list_begin(line: &str, ups: &str) -> Result<(), NutError> {
    check_err(line)?;
    let words = split_words(line)?;
    match words.as_slice() {
        [begin, list, var, name]
            if begin == "BEGIN" && list == "LIST" && var == "VAR" && name == ups =>
        {
            Ok(())
        }
        _ => Err(NutError::Protocol(format!(
            "expected BEGIN LIST VAR {}, got {:?}",
            ups,
            line.trim_end()
        ))),
    }
}
