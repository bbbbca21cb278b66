//! Case-insensitive header map and the line-by-line header parser.

use std::fmt;
use std::io::Write;

/// Ordered header map with case-insensitive lookup.
///
/// Entries keep the casing they were inserted with and serialize in
/// insertion order. Lookups compare names case-insensitively. Repeated
/// names are allowed; `get` returns the first match.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

fn name_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

impl Headers {
    pub fn new() -> Self {
        Headers::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Value of the first header with this name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| name_eq(n, name))
            .map(|(_, v)| v.as_str())
    }

    /// Get a header value parsed to some other type, ignoring bad values.
    pub fn get_as<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.get(name).and_then(|v| v.trim().parse().ok())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set a header, replacing any previous entries with the same name.
    pub fn set<V: Into<String>>(&mut self, name: &str, value: V) {
        self.entries.retain(|(n, _)| !name_eq(n, name));
        self.entries.push((name.to_string(), value.into()));
    }

    /// Append to a header value, comma-separated.
    ///
    /// Used for list-valued headers such as `Vary`. Inserts the header if
    /// it is not present yet.
    pub fn append(&mut self, name: &str, value: &str) {
        match self.entries.iter_mut().find(|(n, _)| name_eq(n, name)) {
            Some((_, v)) => {
                v.push_str(",");
                v.push_str(value);
            }
            None => self.entries.push((name.to_string(), value.to_string())),
        }
    }

    /// Insert every entry of `other` whose name is not present yet.
    ///
    /// This is the precedence primitive for reply generation: merging maps
    /// in order means earlier maps win on conflict.
    pub fn merge(&mut self, other: &Headers) {
        for (n, v) in &other.entries {
            if !self.contains(n) {
                self.entries.push((n.clone(), v.clone()));
            }
        }
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Serialize as `Name: value\r\n` lines, without the terminating blank
    /// line.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        for (n, v) in &self.entries {
            // writing to a Vec cannot fail.
            write!(out, "{}: {}\r\n", n, v).unwrap();
        }
    }
}

impl<'a> From<&'a [(&'a str, &'a str)]> for Headers {
    fn from(pairs: &'a [(&'a str, &'a str)]) -> Self {
        let mut h = Headers::new();
        for (n, v) in pairs {
            h.entries.push((n.to_string(), v.to_string()));
        }
        h
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (n, v) in &self.entries {
            write!(f, "{}: {}\r\n", n, v)?;
        }
        Ok(())
    }
}

/// Absorbs header lines one at a time until the blank terminator.
#[derive(Debug, Default)]
pub struct HeaderParser {
    /// Everything absorbed so far.
    pub headers: Headers,
    /// Set once the terminating blank line was seen.
    pub complete: bool,
}

impl HeaderParser {
    pub fn new() -> Self {
        HeaderParser::default()
    }

    /// Absorb one header line, without its trailing `\n`.
    ///
    /// A blank line marks the header section complete. A line starting
    /// with whitespace continues the previous value (obsolete line
    /// folding). Anything that is not `Name: value` is dropped.
    ///
    /// Returns whether the line made sense.
    pub fn absorb(&mut self, line: &[u8]) -> bool {
        let line = String::from_utf8_lossy(line);
        let line = line.strip_suffix('\r').unwrap_or(&line);

        if line.is_empty() {
            self.complete = true;
            return true;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            // folded continuation of the previous value.
            match self.headers.entries.last_mut() {
                Some((_, v)) => {
                    v.push(' ');
                    v.push_str(line.trim());
                    return true;
                }
                None => {
                    debug!("Dropping continuation line without a header");
                    return false;
                }
            }
        }

        let (name, value) = match line.split_once(':') {
            Some(s) => s,
            None => {
                debug!("Dropping header line without a colon: {:?}", line);
                return false;
            }
        };

        let name = name.trim();
        if name.is_empty() || name.contains(' ') || name.contains('\t') {
            debug!("Dropping header line with a bad name: {:?}", line);
            return false;
        }

        self.headers
            .entries
            .push((name.to_string(), value.trim().to_string()));

        true
    }

    /// Forget everything absorbed, ready for the next message.
    pub fn reset(&mut self) {
        self.headers = Headers::new();
        self.complete = false;
    }
}
