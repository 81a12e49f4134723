//! Table-driven checks for version ordering and relative-path normalisation.
//!
//! Each `#[case]` is isolated: no shared state.

use rstest::rstest;
use updraft_core::{BaseVersion, PathError, RelPath, Version};

fn v(s: &str) -> Version {
    s.parse().expect("version")
}

#[rstest]
#[case("1.0.0", "1.1.0")]
#[case("1.9.0", "1.10.0")]
#[case("0.9.99", "1.0.0")]
#[case("1.0", "1.0.1")]
#[case("2", "10")]
fn versions_order_numerically(#[case] lower: &str, #[case] higher: &str) {
    assert!(v(lower) < v(higher), "{lower} should sort before {higher}");
}

#[rstest]
#[case("1.0.0", "1.0.0")]
#[case("1.0", "1.0.0")]
#[case("3", "3.0.0.0")]
#[case(" 1.2.3\n", "1.2.3")]
fn versions_compare_equal(#[case] a: &str, #[case] b: &str) {
    assert_eq!(v(a), v(b));
}

#[rstest]
#[case("any")]
#[case("ANY")]
#[case("*")]
fn wildcard_base_versions(#[case] raw: &str) {
    assert_eq!(raw.parse::<BaseVersion>().unwrap(), BaseVersion::Any);
}

#[rstest]
#[case("a.txt", "a.txt")]
#[case("./a.txt", "a.txt")]
#[case("sub//deep/./f.py", "sub/deep/f.py")]
#[case("sub/", "sub")]
fn relpaths_normalise(#[case] raw: &str, #[case] expected: &str) {
    assert_eq!(RelPath::new(raw).unwrap().as_str(), expected);
}

#[rstest]
#[case("../etc/passwd")]
#[case("a/../../b")]
#[case("/abs")]
#[case("D:/x")]
#[case("a\\b")]
#[case("")]
#[case(".")]
fn relpaths_reject_unsafe_input(#[case] raw: &str) {
    let err: PathError = RelPath::new(raw).unwrap_err();
    assert!(!err.to_string().is_empty());
}
