//! The taxonomy label codec.
//!
//! A facet label is a path of UTF-8 components joined with the `U+001F`
//! separator. Occurrences of the separator or of the `U+001E` escape
//! character inside a component are each preceded by the escape character,
//! which makes [`path_to_string`] and [`string_to_path`] exact inverses.

use memchr::memchr2;

/// The character joining path components inside an encoded label.
pub const DELIMITER: char = '\u{1f}';

/// The character escaping [`DELIMITER`] and itself inside a component.
pub const ESCAPE: char = '\u{1e}';

const DELIMITER_BYTE: u8 = 0x1f;
const ESCAPE_BYTE: u8 = 0x1e;

/// Encodes path components into a single label string.
///
/// An empty component list encodes to the empty string.
pub fn path_to_string<T: AsRef<str>>(components: &[T]) -> String {
    let mut out = String::new();
    for (i, component) in components.iter().enumerate() {
        if i != 0 {
            out.push(DELIMITER);
        }
        for ch in component.as_ref().chars() {
            if ch == DELIMITER || ch == ESCAPE {
                out.push(ESCAPE);
            }
            out.push(ch);
        }
    }
    out
}

/// Decodes a label string back into its path components.
pub fn string_to_path(label: &str) -> Vec<String> {
    if label.is_empty() {
        return Vec::new();
    }

    let bytes = label.as_bytes();
    let mut components = Vec::new();
    let mut component = Vec::new();
    let mut pos = 0;
    while pos < bytes.len() {
        match memchr2(DELIMITER_BYTE, ESCAPE_BYTE, &bytes[pos..]) {
            Some(offset) => {
                let found = pos + offset;
                component.extend_from_slice(&bytes[pos..found]);
                if bytes[found] == ESCAPE_BYTE {
                    // The next byte, whatever it is, belongs to the component.
                    if let Some(&escaped) = bytes.get(found + 1) {
                        component.push(escaped);
                    }
                    pos = found + 2;
                } else {
                    components.push(take_component(&mut component));
                    pos = found + 1;
                }
            }
            None => {
                component.extend_from_slice(&bytes[pos..]);
                pos = bytes.len();
            }
        }
    }
    components.push(take_component(&mut component));
    components
}

fn take_component(bytes: &mut Vec<u8>) -> String {
    // Components come from a valid UTF-8 label and both control bytes are
    // ASCII, splitting cannot break a multi-byte sequence.
    String::from_utf8(std::mem::take(bytes)).expect("label components are valid UTF-8")
}

#[cfg(test)]
mod tests {
    use big_s::S;

    use super::*;

    #[test]
    fn roundtrip_simple_paths() {
        for components in [vec![], vec![S("a")], vec![S("dim"), S("value")], vec![S("a"), S("b"), S("c")]] {
            let encoded = path_to_string(&components);
            assert_eq!(string_to_path(&encoded), components);
        }
    }

    #[test]
    fn roundtrip_components_containing_control_characters() {
        let components = vec![S("a\u{1f}b"), S("c\u{1e}d"), S("\u{1f}\u{1e}")];
        let encoded = path_to_string(&components);
        assert_eq!(string_to_path(&encoded), components);
    }

    #[test]
    fn encoded_labels_sort_by_component_prefix() {
        let parent = path_to_string(&["a"]);
        let child = path_to_string(&["a", "b"]);
        let next_dim = path_to_string(&["b"]);
        assert!(parent < child);
        assert!(child < next_dim);
    }

    #[test]
    fn empty_components_survive() {
        let components = vec![S(""), S("x"), S("")];
        let encoded = path_to_string(&components);
        assert_eq!(string_to_path(&encoded), components);
    }
}
