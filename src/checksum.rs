//! Deterministic short checksums used to build stable test identities.
//!
//! The checksum is a standard CRC-32 (reflected, polynomial `0xEDB88320`,
//! all-ones initial value and final XOR) over the UTF-8 bytes of a string,
//! rendered as eight uppercase hexadecimal digits. It is short enough to be
//! embedded in directory names and stable across platforms and runs.

/// Separator used when several parameter values are combined into one identity.
pub const JOIN_SEPARATOR: &str = "|";

/// Computes the 8-hex-digit CRC-32 checksum of `text`.
///
/// # Example
///
/// ```
/// use testfarm_logger::checksum::checksum;
///
/// assert_eq!(checksum(""), "00000000");
/// assert_eq!(checksum("123456789"), "CBF43926");
/// ```
pub fn checksum(text: &str) -> String {
    format!("{:08X}", crc32fast::hash(text.as_bytes()))
}

/// Joins `parts` with `|` and checksums the result.
///
/// Used when several independent parameter values must collapse into a
/// single identity.
pub fn checksum_of_joined<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = parts
        .into_iter()
        .map(|p| p.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(JOIN_SEPARATOR);
    checksum(&joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_upper_hex(s: &str) -> bool {
        s.chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(checksum(""), "00000000");
    }

    #[test]
    fn test_known_vectors() {
        // Standard CRC-32 check value.
        assert_eq!(checksum("123456789"), "CBF43926");
        assert_eq!(checksum("a"), "E8B7BE43");
        assert_eq!(
            checksum("The quick brown fox jumps over the lazy dog"),
            "414FA339"
        );
    }

    #[test]
    fn test_shape_and_determinism() {
        for input in ["1, 2, 3", "\"hello\"", "ünïcødé", "x", "   "] {
            let first = checksum(input);
            assert_eq!(first.len(), 8, "input {input:?}");
            assert!(is_upper_hex(&first), "input {input:?} gave {first}");
            assert_eq!(first, checksum(input));
        }
    }

    #[test]
    fn test_distinct_inputs() {
        let inputs = ["1, 2, 3", "1, 2, 4", "3, 2, 1", "", "null", "\"a\", \"b\""];
        let mut seen = std::collections::HashSet::new();
        for input in inputs {
            assert!(seen.insert(checksum(input)), "collision for {input:?}");
        }
    }

    #[test]
    fn test_checksum_of_joined() {
        assert_eq!(checksum_of_joined(["1", "2", "3"]), checksum("1|2|3"));
        assert_eq!(checksum_of_joined(Vec::<String>::new()), "00000000");
        assert_ne!(checksum_of_joined(["1", "2"]), checksum_of_joined(["12"]));
    }
}
