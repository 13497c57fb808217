/// Compare `a` with the already lowercased `lowercase`, ignoring ascii case in `a`.
pub(crate) fn compare_lowercase_ascii(a: &str, lowercase: &str) -> bool {
    if a.len() != lowercase.len() {
        return false;
    }

    for (a, b) in a.chars().zip(lowercase.chars()) {
        assert!(!b.is_ascii_uppercase());
        let norm = a.to_ascii_lowercase();
        if norm != b {
            return false;
        }
    }

    true
}

/// Trace log raw protocol data, one row per line.
pub(crate) fn log_data(data: &[u8]) {
    if !log_enabled!(log::Level::Trace) {
        return;
    }

    for line in data.split(|c| *c == b'\n') {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        trace!("{}", String::from_utf8_lossy(line));
    }
}
