/// Decodes a percent-encoded string (`%XX`) and converts `+` to space.
/// Invalid UTF-8 after decoding is replaced rather than rejected.
pub fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b'%' if i + 2 < bytes.len() => {
                match (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                    (Some(h), Some(l)) => {
                        out.push((h << 4) | l);
                        i += 3;
                    }
                    _ => {
                        out.push(b'%');
                        i += 1;
                    }
                }
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}

/// Parses `key=value&key2=value2` into a `Vec` of `(key, value)` pairs.
/// Repeated keys (checkbox groups) are kept in order.
pub fn parse_form(body: &str) -> Vec<(String, String)> {
    body.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let mut it = pair.splitn(2, '=');
            let k = it.next().unwrap_or("");
            let v = it.next().unwrap_or("");
            (url_decode(k), url_decode(v))
        })
        .collect()
}

/// Looks up a key in parsed form pairs, returning the first value if found.
pub fn form_get<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

/// Every value submitted under `key`.
pub fn form_get_all<'a>(pairs: &'a [(String, String)], key: &str) -> Vec<&'a str> {
    pairs.iter().filter(|(k, _)| k == key).map(|(_, v)| v.as_str()).collect()
}

/// True when a checkbox named `key` was ticked.
pub fn form_flag(pairs: &[(String, String)], key: &str) -> bool {
    form_get(pairs, key).is_some_and(|v| !v.is_empty() && v != "false")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf8_and_plus() {
        assert_eq!(url_decode("caf%C3%A9+au+lait"), "café au lait");
        assert_eq!(url_decode("100%"), "100%");
    }

    #[test]
    fn repeated_keys_are_collected() {
        let pairs = parse_form("columns=a&columns=b+c&other=1");
        assert_eq!(form_get_all(&pairs, "columns"), ["a", "b c"]);
        assert_eq!(form_get(&pairs, "other"), Some("1"));
        assert!(form_flag(&pairs, "other"));
        assert!(!form_flag(&pairs, "missing"));
    }
}
