//! Transition feed lines and the chains they produce.

use rstest::rstest;

use updraft_apply::{resolve, TransitionMap};
use updraft_core::{BaseVersion, Version};

fn v(s: &str) -> Version {
    s.parse().expect("version")
}

#[rstest]
#[case("1.0.0 -> 1.1.0, a.zip", BaseVersion::Exact(v("1.0.0")), "1.1.0", "a.zip")]
#[case("  1.0 ->1.0.1 ,  dir/b.zip  ", BaseVersion::Exact(v("1.0")), "1.0.1", "dir/b.zip")]
#[case("any -> 2.0.0, https://example.invalid/full.zip", BaseVersion::Any, "2.0.0", "https://example.invalid/full.zip")]
#[case("* -> 2.0.0, c.zip", BaseVersion::Any, "2.0.0", "c.zip")]
#[case("1.0.0 -> 1.1.0, name,with,commas.zip", BaseVersion::Exact(v("1.0.0")), "1.1.0", "name,with,commas.zip")]
fn well_formed_lines(
    #[case] line: &str,
    #[case] from: BaseVersion,
    #[case] to: &str,
    #[case] location: &str,
) {
    let (map, errors) = TransitionMap::parse(line);
    assert!(errors.is_empty(), "{errors:?}");
    let t = &map.transitions()[0];
    assert_eq!(t.from, from);
    assert_eq!(t.to, v(to));
    assert_eq!(t.location, location);
}

#[rstest]
#[case("1.0.0 1.1.0 a.zip")]
#[case("1.0.0 -> 1.1.0")]
#[case("1.0.0 -> 1.1.0,   ")]
#[case("v1 -> 1.1.0, a.zip")]
#[case("1.0.0 -> any, a.zip")]
#[case("1.1.0 -> 1.1.0, same.zip")]
fn malformed_lines(#[case] line: &str) {
    let (map, errors) = TransitionMap::parse(line);
    assert!(map.is_empty());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].line, 1);
}

#[rstest]
#[case("1.0.0", &["1.0.0 -> 1.5.0"])]
#[case("1.1.0", &["1.1.0 -> 2.0.0"])]
#[case("1.5.0", &[])]
#[case("2.0.0", &[])]
fn greedy_resolution_from(#[case] current: &str, #[case] expected: &[&str]) {
    let feed = "1.0.0 -> 1.1.0, a\n1.1.0 -> 2.0.0, b\n1.0.0 -> 1.5.0, c\n";
    let (map, _) = TransitionMap::parse(feed);
    let chain: Vec<String> = resolve(&v(current), &map)
        .iter()
        .map(|t| t.to_string())
        .collect();
    assert_eq!(chain, expected);
}
