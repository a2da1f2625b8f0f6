use crate::config::Config;
use crate::reject::Reason;
use crate::reject::RejectSink;

/// Converts a row of field values into one `COPY` text-format line and
/// appends it to `out`.
///
/// Each field is one of: the configured null marker, the configured empty
/// marker, or arbitrary text to escape. Returns `false` (and leaves `out`
/// untouched) if a field failed to transcode — the caller must not commit
/// a half-written row to the batch buffer, so encoding happens into a
/// scratch buffer first and is only appended to `out` on success.
pub fn encode_row(
    config: &Config,
    values: &[String],
    original_input_line: &[u8],
    reject: &dyn RejectSink,
    out: &mut Vec<u8>,
) -> bool {
    let mut scratch = Vec::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            scratch.push(config.copy_sep);
        }
        if config.is_null(value) {
            scratch.extend_from_slice(b"\\N");
            continue;
        }
        if config.is_empty(value) {
            continue;
        }
        let transcoded = match transcode(config, value) {
            Ok(text) => text,
            Err(detail) => {
                reject.log(
                    Reason::from(vec!["Codec error".to_string(), detail]),
                    original_input_line,
                );
                return false;
            }
        };
        escape_into(config.copy_sep, &transcoded, &mut scratch);
    }
    scratch.push(b'\n');
    out.extend_from_slice(&scratch);
    true
}

/// Transcodes `value` from `config.input_encoding` if one is set. Only
/// UTF-8 passthrough is supported; any other named encoding that cannot be
/// validated as UTF-8 is reported as a codec error, matching the source's
/// "transcode or reject" contract without pulling in a full codec registry
/// (out of scope per spec.md §1).
fn transcode(config: &Config, value: &str) -> Result<String, String> {
    match &config.input_encoding {
        None => Ok(value.to_string()),
        Some(_) => {
            if value.bytes().all(|b| b.is_ascii()) || std::str::from_utf8(value.as_bytes()).is_ok()
            {
                Ok(value.to_string())
            } else {
                Err(format!("cannot decode {:?}", value))
            }
        }
    }
}

/// Applies the escape map in the exact order spec.md §4.2 specifies.
fn escape_into(copy_sep: u8, value: &str, out: &mut Vec<u8>) {
    for byte in value.bytes() {
        match byte {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b if b == copy_sep => {
                out.push(b'\\');
                out.push(copy_sep);
            }
            0x08 => out.extend_from_slice(b"\\b"),
            0x0C => out.extend_from_slice(b"\\f"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x0B => out.extend_from_slice(b"\\v"),
            other => out.push(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reject::FileRejectSink;

    fn config() -> Config {
        Config {
            host: "localhost".into(),
            port: 5432,
            database: "db".into(),
            user: "user".into(),
            password: None,
            copy_sep: b'\t',
            copy_every: 10,
            commit_every: 10,
            client_encoding: "UTF8".into(),
            datestyle: None,
            lc_messages: None,
            null_marker: "\\N".into(),
            empty_marker: "".into(),
            input_encoding: None,
            dry_run: false,
            vacuum: false,
            pedantic: false,
            client_min_messages: None,
        }
    }

    fn sink() -> FileRejectSink {
        let dir = tempfile::tempdir().expect("tempdir");
        FileRejectSink::create(dir.path().join("reject.log")).expect("create sink")
    }

    #[test]
    fn null_and_empty_encode_distinctly() {
        let config = config();
        let sink = sink();
        let mut out = Vec::new();
        let ok = encode_row(
            &config,
            &["x".into(), "\\N".into(), "".into()],
            b"",
            &sink,
            &mut out,
        );
        assert!(ok);
        assert_eq!(out, b"x\t\\N\t\n");
    }

    #[test]
    fn delimiter_and_backslash_and_newline_escape_in_order() {
        let config = config();
        let sink = sink();
        let mut out = Vec::new();
        let ok = encode_row(&config, &["a\tb\\c\n".into()], b"", &sink, &mut out);
        assert!(ok);
        assert_eq!(out, b"a\\\tb\\\\c\\n\n");
    }

    #[test]
    fn happy_path_two_fields() {
        let config = config();
        let sink = sink();
        let mut out = Vec::new();
        let ok = encode_row(&config, &["1".into(), "a".into()], b"", &sink, &mut out);
        assert!(ok);
        assert_eq!(out, b"1\ta\n");
    }

    #[test]
    fn round_trip_for_values_without_newline_or_separator() {
        let config = config();
        let sink = sink();
        for value in ["plain", "with\\backslash", "tab\\tinside"] {
            let mut out = Vec::new();
            assert!(encode_row(&config, &[value.to_string()], b"", &sink, &mut out));
            // strip trailing \n and reverse the escape map
            let encoded = &out[..out.len() - 1];
            let decoded = unescape(copy_sep_from(&config), encoded);
            assert_eq!(decoded, value);
        }
    }

    fn copy_sep_from(config: &Config) -> u8 {
        config.copy_sep
    }

    fn unescape(copy_sep: u8, bytes: &[u8]) -> String {
        let mut out = Vec::new();
        let mut iter = bytes.iter().copied().peekable();
        while let Some(b) = iter.next() {
            if b == b'\\' {
                match iter.next() {
                    Some(b'\\') => out.push(b'\\'),
                    Some(b) if b == copy_sep => out.push(copy_sep),
                    Some(b'b') => out.push(0x08),
                    Some(b'f') => out.push(0x0C),
                    Some(b'n') => out.push(b'\n'),
                    Some(b'r') => out.push(b'\r'),
                    Some(b't') => out.push(b'\t'),
                    Some(b'v') => out.push(0x0B),
                    Some(other) => out.push(other),
                    None => {}
                }
            } else {
                out.push(b);
            }
        }
        String::from_utf8(out).expect("utf8")
    }
}
