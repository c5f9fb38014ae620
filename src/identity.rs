//! Canonical test identities.
//!
//! Hosts report tests by their fully qualified name, which for data-driven
//! tests includes the argument list, e.g. `Ns.Class.Method(1, "two")`. Those
//! names are awkward as directory names and unstable as remote keys, so every
//! name is normalized before it is used anywhere else:
//!
//! | Raw name | Canonical name |
//! |----------|----------------|
//! | `Ns.Class.Method` | `Ns.Class.Method` |
//! | `Ns::Class::Method` | `Ns.Class.Method` |
//! | `Ns.Class.Method(1, 2, 3)` | `Ns.Class.Method.<crc32 of "1, 2, 3">` |
//! | `Ns.Class.Method()` | `Ns.Class.Method.00000000` |
//!
//! The canonical name is the join key between local execution events and
//! the remote tracking record.

use crate::checksum::{checksum, checksum_of_joined};

/// Scope separator rewritten to `.` before any other processing.
const SCOPE_SEPARATOR: &str = "::";

/// Converts a host-supplied fully qualified test name into its canonical form.
///
/// Total over all inputs: names without a well-formed argument list are
/// returned with only the scope separators rewritten.
///
/// # Example
///
/// ```
/// use testfarm_logger::identity::canonical_name;
///
/// assert_eq!(canonical_name("Ns::C::M"), "Ns.C.M");
/// assert_eq!(canonical_name("Ns.C.M()"), "Ns.C.M.00000000");
/// ```
pub fn canonical_name(raw: &str) -> String {
    let normalized = raw.replace(SCOPE_SEPARATOR, ".");

    let Some(open) = normalized.find('(') else {
        return normalized;
    };
    let close = match normalized.rfind(')') {
        Some(close) if close > open => close,
        _ => return normalized,
    };

    let params = &normalized[open + 1..close];
    format!("{}.{}", &normalized[..open], checksum(params))
}

/// Builds the identity of one parameter set of a data-driven test.
///
/// Unlike [`canonical_name`], which checksums the verbatim argument text,
/// this combines separately supplied values (joined with `|`).
pub fn parameter_set_name<S: AsRef<str>>(base: &str, params: &[S]) -> String {
    format!("{}.{}", canonical_name(base), checksum_of_joined(params))
}
