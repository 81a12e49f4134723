//! Version chains.
//!
//! A feed publishes transitions, one per line:
//!
//! ```text
//! # from -> to, location
//! 1.0.0 -> 1.1.0, https://example.invalid/update_1.1.0.zip
//! any   -> 2.0.0, packages/update_2.0.0_full.zip
//! ```
//!
//! [`resolve`] walks forward from the installed version, always taking the
//! eligible transition with the greatest target. The first hop may start at
//! any published version at or below the installed one; later hops must
//! start exactly where the previous hop ended (or at `any`).

use std::cmp::Ordering;

use updraft_core::{BaseVersion, Version};

use crate::error::ChainResolutionError;

/// One published upgrade path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: BaseVersion,
    pub to: Version,
    /// Local path or `http(s)://` URL of the package.
    pub location: String,
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionMap {
    transitions: Vec<Transition>,
}

impl TransitionMap {
    pub fn new(transitions: Vec<Transition>) -> Self {
        Self { transitions }
    }

    /// Parse a feed. Malformed lines are logged, returned and otherwise
    /// ignored.
    pub fn parse(text: &str) -> (Self, Vec<ChainResolutionError>) {
        let mut transitions = Vec::new();
        let mut errors = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_line(line) {
                Ok(t) => transitions.push(t),
                Err(reason) => {
                    let err = ChainResolutionError {
                        line: index + 1,
                        text: line.to_string(),
                        reason,
                    };
                    tracing::warn!(error = %err, "skipping feed entry");
                    errors.push(err);
                }
            }
        }
        (Self { transitions }, errors)
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    /// Greatest published target version.
    pub fn latest(&self) -> Option<&Version> {
        self.transitions.iter().map(|t| &t.to).max()
    }
}

fn parse_line(line: &str) -> Result<Transition, String> {
    let (from, rest) = line
        .split_once("->")
        .ok_or_else(|| "expected `<from> -> <to>, <location>`".to_string())?;
    let (to, location) = rest
        .split_once(',')
        .ok_or_else(|| "missing `, <location>`".to_string())?;

    let from: BaseVersion = from
        .trim()
        .parse()
        .map_err(|e| format!("bad source version: {e}"))?;
    let to: Version = to
        .trim()
        .parse()
        .map_err(|e| format!("bad target version: {e}"))?;
    let location = location.trim();
    if location.is_empty() {
        return Err("empty location".to_string());
    }
    if let BaseVersion::Exact(f) = &from {
        if f >= &to {
            return Err(format!("{f} -> {to} does not advance"));
        }
    }

    Ok(Transition {
        from,
        to,
        location: location.to_string(),
    })
}

/// The packages to apply, in order, to move `current` as far forward as
/// the map allows. Empty if nothing applies.
pub fn resolve(current: &Version, map: &TransitionMap) -> Vec<Transition> {
    let mut chain: Vec<Transition> = Vec::new();
    let mut reached = current.clone();

    loop {
        let first_hop = chain.is_empty();
        let next = map
            .transitions
            .iter()
            .filter(|t| t.to > reached)
            .filter(|t| match &t.from {
                BaseVersion::Any => true,
                BaseVersion::Exact(from) if first_hop => from <= &reached,
                BaseVersion::Exact(from) => from == &reached,
            })
            .max_by(|a, b| preference(a, b));

        match next {
            Some(t) => {
                tracing::debug!(transition = %t, "chain step");
                reached = t.to.clone();
                chain.push(t.clone());
            }
            None => break,
        }
    }
    chain
}

/// Greater target wins; among equal targets an exact base beats `any`, and
/// a later base beats an earlier one.
fn preference(a: &Transition, b: &Transition) -> Ordering {
    a.to.cmp(&b.to).then_with(|| match (&a.from, &b.from) {
        (BaseVersion::Any, BaseVersion::Any) => Ordering::Equal,
        (BaseVersion::Any, BaseVersion::Exact(_)) => Ordering::Less,
        (BaseVersion::Exact(_), BaseVersion::Any) => Ordering::Greater,
        (BaseVersion::Exact(x), BaseVersion::Exact(y)) => x.cmp(y),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn map(lines: &str) -> TransitionMap {
        let (map, errors) = TransitionMap::parse(lines);
        assert!(errors.is_empty(), "{errors:?}");
        map
    }

    fn hops(chain: &[Transition]) -> Vec<String> {
        chain.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn greedy_largest_target_dead_ends() {
        let m = map("1.0.0 -> 1.1.0, a.zip\n1.1.0 -> 2.0.0, b.zip\n1.0.0 -> 1.5.0, c.zip\n");
        let chain = resolve(&v("1.0.0"), &m);
        assert_eq!(hops(&chain), vec!["1.0.0 -> 1.5.0"]);
        assert!(resolve(&v("1.5.0"), &m).is_empty());
    }

    #[test]
    fn follows_consecutive_hops() {
        let m = map("1.0.0 -> 1.1.0, a\n1.1.0 -> 1.2.0, b\n1.2.0 -> 1.10.0, c\n");
        let chain = resolve(&v("1.0.0"), &m);
        assert_eq!(
            hops(&chain),
            vec!["1.0.0 -> 1.1.0", "1.1.0 -> 1.2.0", "1.2.0 -> 1.10.0"]
        );
    }

    #[test]
    fn first_hop_tolerates_unpublished_current() {
        let m = map("1.0.0 -> 1.1.0, a\n");
        assert_eq!(hops(&resolve(&v("1.0.5"), &m)), vec!["1.0.0 -> 1.1.0"]);
    }

    #[test]
    fn wildcard_base_always_eligible() {
        let m = map("any -> 3.0.0, full.zip\n1.0.0 -> 1.1.0, a\n");
        assert_eq!(hops(&resolve(&v("0.0.0"), &m)), vec!["any -> 3.0.0"]);
        assert!(resolve(&v("3.0.0"), &m).is_empty());
    }

    #[test]
    fn exact_base_preferred_on_equal_target() {
        let m = map("any -> 2.0.0, full\n1.0.0 -> 2.0.0, delta\n");
        let chain = resolve(&v("1.0.0"), &m);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].location, "delta");
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let feed = "\
# comment
1.0.0 -> 1.1.0, ok.zip
nonsense
1.0 -> banana, x
2.0.0 -> 1.0.0, backwards
1.1.0 -> 1.2.0,
";
        let (m, errors) = TransitionMap::parse(feed);
        assert_eq!(m.len(), 1);
        let lines: Vec<usize> = errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5, 6]);
        assert_eq!(m.latest(), Some(&v("1.1.0")));
    }

    #[test]
    fn empty_map_resolves_to_nothing() {
        assert!(resolve(&v("1.0.0"), &TransitionMap::default()).is_empty());
        assert_eq!(TransitionMap::default().latest(), None);
    }
}
