use crate::domain::bond::Bond;

const PREFIX_CHARS: usize = 2;

/// Whether a saved watchlist fragment refers to the bond with `title`.
///
/// Matches on the fragment's first two characters so tranche variants ("东财A", "东财B")
/// of the same underlying all hit. Fragments shorter than two characters match on what
/// they have; an empty fragment matches nothing.
pub fn fragment_matches(fragment: &str, title: &str) -> bool {
    let prefix: String = fragment.chars().take(PREFIX_CHARS).collect();
    !prefix.is_empty() && title.contains(&prefix)
}

/// Every (bond, fragment) hit, relabeled with the fragment. Duplicates are kept.
pub fn match_watchlist(fragments: &[String], bonds: &[Bond]) -> Vec<Bond> {
    let mut out = Vec::new();
    for bond in bonds {
        for fragment in fragments {
            if fragment_matches(fragment, &bond.title) {
                out.push(Bond {
                    title: fragment.clone(),
                    ..bond.clone()
                });
            }
        }
    }
    out
}
