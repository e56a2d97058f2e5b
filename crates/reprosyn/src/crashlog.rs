/// Delimiter the instrumentation writes between crash occurrences.
pub const CRASH_DELIM: &str = "--------------------------------------\n";

/// Sub-delimiter terminating each argument encoding within an occurrence.
pub const ARG_DELIM: char = ';';

/// Extension of campaign crash logs; the file stem is the implementation
/// identifier.
pub const CRASH_EXT: &str = "_crashes.log";

/// Extension of type-survey logs, which share the occurrence format.
pub const SURVEY_EXT: &str = ".types";

/// One delimiter-bounded slice of a crash log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashOccurrence {
    /// Entry-point-level configuration (`name=value` pairs), not call
    /// arguments.
    pub attributes: Vec<(String, String)>,
    /// Raw argument encodings, ordered as the implementation declares its
    /// parameters.
    pub encodings: Vec<String>,
}

impl CrashOccurrence {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Splits a crash log into its non-empty occurrence slices.
pub fn split_occurrences(log: &str) -> Vec<&str> {
    log.split(CRASH_DELIM)
        .map(str::trim)
        .filter(|occ| !occ.is_empty())
        .collect()
}

/// Parses one occurrence slice into its attribute block and argument
/// encodings.
pub fn parse_occurrence(text: &str) -> CrashOccurrence {
    let text = text.trim();
    let (attr_line, body) = match text.split_once('\n') {
        Some((first, rest)) if is_attribute_line(first) => (Some(first), rest),
        _ if is_attribute_line(text) => (Some(text), ""),
        _ => (None, text),
    };

    let attributes = attr_line.map(parse_attributes).unwrap_or_default();

    let mut encodings: Vec<String> = body
        .split(ARG_DELIM)
        .map(str::trim)
        .filter(|enc| !enc.is_empty())
        .map(str::to_string)
        .collect();
    // A body without any sub-delimiter is not an argument sequence.
    if !body.contains(ARG_DELIM) {
        encodings.clear();
    }
    CrashOccurrence {
        attributes,
        encodings,
    }
}

fn is_attribute_line(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty()
        && line.contains('=')
        && !line.contains(ARG_DELIM)
        && !line.contains("Contents:")
}

/// Splits a comma-separated attribute line, re-joining chunks that belong to
/// a previous value (values themselves may contain `, `).
fn parse_attributes(line: &str) -> Vec<(String, String)> {
    let mut grouped: Vec<String> = Vec::new();
    for chunk in line.trim().split(", ") {
        if chunk.contains('=') {
            grouped.push(chunk.to_string());
        } else if let Some(last) = grouped.last_mut() {
            last.push_str(", ");
            last.push_str(chunk);
        }
    }

    grouped
        .iter()
        .filter_map(|attr| {
            let (name, value) = attr.split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_the_fixed_delimiter() {
        let log = format!("int 1;\n{CRASH_DELIM}int 2;\n{CRASH_DELIM}");
        let occurrences = split_occurrences(&log);
        assert_eq!(occurrences, vec!["int 1;", "int 2;"]);
    }

    #[test]
    fn blank_log_yields_no_occurrences() {
        assert!(split_occurrences("\n\n").is_empty());
        assert!(split_occurrences(CRASH_DELIM).is_empty());
    }

    #[test]
    fn attribute_line_is_separated_from_arguments() {
        let occ = parse_occurrence("T=float, N=2\nint 1;\nbool 0;\n");
        assert_eq!(
            occ.attributes,
            vec![
                ("T".to_string(), "float".to_string()),
                ("N".to_string(), "2".to_string()),
            ]
        );
        assert_eq!(occ.encodings, vec!["int 1", "bool 0"]);
    }

    #[test]
    fn attribute_values_may_contain_commas() {
        let occ = parse_occurrence("shapes=[2, 3], T=float\nint 1;");
        assert_eq!(occ.attribute("shapes"), Some("[2, 3]"));
        assert_eq!(occ.attribute("T"), Some("float"));
    }

    #[test]
    fn occurrence_without_attributes() {
        let occ = parse_occurrence("int 1;double 0.5;");
        assert!(occ.attributes.is_empty());
        assert_eq!(occ.encodings, vec!["int 1", "double 0.5"]);
    }

    #[test]
    fn trailing_chunk_after_last_delimiter_is_dropped() {
        let occ = parse_occurrence("int 1;\n  \n");
        assert_eq!(occ.encodings, vec!["int 1"]);
    }
}
