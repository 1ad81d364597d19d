/// Returns the index of the first occurrence of `needle` in `haystack`.
pub fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits `haystack` on every occurrence of `needle`, returning the pieces
/// between occurrences (excluding the needle itself).
pub fn split_on<'a>(haystack: &'a [u8], needle: &[u8]) -> Vec<&'a [u8]> {
    let mut result = Vec::new();
    let mut start = 0;
    while start <= haystack.len() {
        if let Some(pos) = find_subsequence(&haystack[start..], needle) {
            result.push(&haystack[start..start + pos]);
            start += pos + needle.len();
        } else {
            result.push(&haystack[start..]);
            break;
        }
    }
    result
}

/// Extracts the boundary token from a Content-Type header value like
/// `multipart/form-data; boundary=----WebKitFormBoundaryXXX`.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .map(|s| s.trim())
        .find(|s| s.starts_with("boundary="))
        .map(|s| s["boundary=".len()..].trim_matches('"').to_owned())
}

/// A file field pulled out of a form upload.
pub struct UploadedFile {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// Finds the file part submitted under `field_name`.
pub fn extract_file(body: &[u8], boundary: &str, field_name: &str) -> Option<UploadedFile> {
    let delimiter = format!("--{}", boundary);
    let sep = b"\r\n\r\n";

    for part in split_on(body, delimiter.as_bytes()) {
        let Some(sep_pos) = find_subsequence(part, sep) else { continue };
        let headers = String::from_utf8_lossy(&part[..sep_pos]);
        if disposition_param(&headers, "name").as_deref() != Some(field_name) {
            continue;
        }
        let Some(file_name) = disposition_param(&headers, "filename") else { continue };
        let raw = &part[sep_pos + sep.len()..];
        let data = raw.strip_suffix(b"\r\n").unwrap_or(raw).to_vec();
        return Some(UploadedFile { file_name, data });
    }
    None
}

/// Reads `key="value"` from a Content-Disposition header block. `name` does
/// not match inside `filename`.
fn disposition_param(headers: &str, key: &str) -> Option<String> {
    let needle = format!("{key}=\"");
    let mut search = 0;
    while let Some(pos) = headers[search..].find(&needle) {
        let abs = search + pos;
        let preceded_ok = abs == 0 || matches!(headers.as_bytes()[abs - 1], b' ' | b';');
        let rest = &headers[abs + needle.len()..];
        if preceded_ok {
            let end = rest.find('"')?;
            return Some(rest[..end].to_owned());
        }
        search = abs + needle.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = b"--B\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n\
--B\r\nContent-Disposition: form-data; name=\"file\"; filename=\"iris.csv\"\r\nContent-Type: text/csv\r\n\r\na,b\n1,2\n\r\n--B--\r\n";

    #[test]
    fn finds_named_file_part() {
        let file = extract_file(BODY, "B", "file").unwrap();
        assert_eq!(file.file_name, "iris.csv");
        assert_eq!(file.data, b"a,b\n1,2\n");
        assert!(extract_file(BODY, "B", "note").is_none());
    }

    #[test]
    fn boundary_from_content_type() {
        assert_eq!(
            extract_boundary("multipart/form-data; boundary=\"abc\"").as_deref(),
            Some("abc")
        );
    }
}
