//! Tabular artifact rendering.
//!
//! Comma-separated fields, one header line of field names, and one line per
//! record. Any field containing the field/row separators or a quote is
//! wrapped in double quotes with internal quotes doubled. No blank line
//! follows the final record.

/// Render a complete artifact from a header and row values.
pub fn write_csv(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut out = String::new();

    push_record(&mut out, header.iter().copied());
    for row in rows {
        push_record(&mut out, row.iter().map(String::as_str));
    }

    out
}

fn push_record<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    let mut first = true;
    for field in fields {
        if !first {
            out.push(',');
        }
        first = false;
        push_field(out, field);
    }
    out.push('\n');
}

fn push_field(out: &mut String, field: &str) {
    if field.contains([',', '"', '\n', '\r']) {
        out.push('"');
        for c in field.chars() {
            if c == '"' {
                out.push('"');
            }
            out.push(c);
        }
        out.push('"');
    } else {
        out.push_str(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(values: &[&[&str]]) -> Vec<Vec<String>> {
        values
            .iter()
            .map(|row| row.iter().map(|v| v.to_string()).collect())
            .collect()
    }

    #[test]
    fn writes_header_and_records() {
        let csv = write_csv(&["name", "title"], &rows(&[&["Ada", "CTO"]]));
        assert_eq!(csv, "name,title\nAda,CTO\n");
    }

    #[test]
    fn quotes_fields_containing_separators() {
        let csv = write_csv(&["name"], &rows(&[&["Acme, Inc."]]));
        assert_eq!(csv, "name\n\"Acme, Inc.\"\n");
    }

    #[test]
    fn doubles_internal_quotes() {
        let csv = write_csv(&["nickname"], &rows(&[&[r#"the "Duke""#]]));
        assert_eq!(csv, "nickname\n\"the \"\"Duke\"\"\"\n");
    }

    #[test]
    fn quotes_embedded_newlines() {
        let csv = write_csv(&["notes"], &rows(&[&["line1\nline2"]]));
        assert_eq!(csv, "notes\n\"line1\nline2\"\n");
    }

    #[test]
    fn no_blank_line_after_final_record() {
        let csv = write_csv(&["a"], &rows(&[&["1"], &["2"]]));
        assert!(!csv.ends_with("\n\n"));
        assert!(csv.ends_with("2\n"));
    }
}
