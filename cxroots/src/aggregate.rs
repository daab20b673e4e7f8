use std::fmt;

use num::complex::Complex64;

use crate::config::Config;
use crate::refine::Root;
use crate::scheduler::{Leaf, Outcome, UnresolvedRegion};

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Diagnostics {
    /// Roots found, counted with multiplicity.
    pub total: usize,
    /// Trustworthy count of the whole region.
    pub expected: Option<usize>,
    pub unresolved: Vec<UnresolvedRegion>,
    pub integrations: usize,
    /// The roots found do not add up to `expected`.
    pub count_mismatch: bool,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RootSet {
    pub roots: Vec<Root>,
    pub diagnostics: Diagnostics,
}

impl RootSet {
    pub fn positions(&self) -> Vec<Complex64> {
        self.roots.iter().map(|root| root.root).collect()
    }

    pub fn multiplicities(&self) -> Vec<usize> {
        self.roots.iter().map(|root| root.multiplicity).collect()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// All roots found and nothing left unresolved.
    pub fn is_complete(&self) -> bool {
        self.diagnostics.unresolved.is_empty() && !self.diagnostics.count_mismatch
    }
}

impl fmt::Display for RootSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>26} {:>26} {:>12}", "Re", "Im", "multiplicity")?;
        for root in &self.roots {
            writeln!(
                f,
                "{:>26.16e} {:>26.16e} {:>12}",
                root.root.re, root.root.im, root.multiplicity
            )?;
        }
        for region in &self.diagnostics.unresolved {
            writeln!(f, "unresolved: {region}")?;
        }
        Ok(())
    }
}

fn order(a: &Root, b: &Root) -> std::cmp::Ordering {
    a.root
        .re
        .total_cmp(&b.root.re)
        .then(a.root.im.total_cmp(&b.root.im))
}

/// Merges roots of one leaf that are closer than the duplicate tolerance,
/// keeping the better converged one.
fn merge_leaf(leaf: &Leaf, tolerance: f64) -> Vec<Root> {
    let mut roots: Vec<Root> = vec![];
    for root in &leaf.roots {
        match roots
            .iter_mut()
            .find(|other| (other.root - root.root).norm() < tolerance)
        {
            Some(other) if root.error < other.error => *other = root.clone(),
            Some(_) => {}
            None => roots.push(root.clone()),
        }
    }
    roots
}

/// Collects the roots of all leaves into a deterministic root set and checks
/// them against the count of the whole region.
pub fn aggregate(outcome: Outcome, config: &Config) -> RootSet {
    let mut candidates = outcome
        .leaves
        .iter()
        .flat_map(|leaf| {
            merge_leaf(leaf, config.duplicate_tolerance)
                .into_iter()
                .map(move |root| (leaf.node, root))
        })
        .collect::<Vec<_>>();
    candidates.sort_by(|(_, a), (_, b)| order(a, b));

    let mut merged: Vec<(usize, Root)> = vec![];
    for (node, root) in candidates {
        let duplicate = merged.iter_mut().find(|(other_node, other)| {
            *other_node != node && (other.root - root.root).norm() < config.duplicate_tolerance
        });
        match duplicate {
            Some((_, other)) => {
                log::debug!(
                    "{} found in two regions, merging with {}",
                    root.root,
                    other.root
                );
                let multiplicity = other.multiplicity + root.multiplicity;
                if root.error < other.error {
                    *other = root;
                }
                other.multiplicity = if config.refine_multiplicity {
                    multiplicity
                } else {
                    1
                };
            }
            None => merged.push((node, root)),
        }
    }

    let mut roots = merged.into_iter().map(|(_, root)| root).collect::<Vec<_>>();
    roots.sort_by(order);

    let total = roots.iter().map(|root| root.multiplicity).sum::<usize>();
    let count_mismatch = match outcome.expected {
        Some(expected) if outcome.unresolved.is_empty() => {
            if config.refine_multiplicity {
                total != expected
            } else {
                total > expected
            }
        }
        _ => false,
    };
    if count_mismatch {
        log::warn!(
            "Found {total} roots but the region holds {}",
            outcome.expected.unwrap_or_default()
        );
    }

    RootSet {
        roots,
        diagnostics: Diagnostics {
            total,
            expected: outcome.expected,
            unresolved: outcome.unresolved,
            integrations: outcome.integrations,
            count_mismatch,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(re: f64, im: f64, multiplicity: usize, error: f64) -> Root {
        Root {
            root: Complex64::new(re, im),
            multiplicity,
            error,
            residual: 0.0,
        }
    }

    fn outcome(leaves: Vec<Vec<Root>>, expected: Option<usize>) -> Outcome {
        Outcome {
            expected,
            leaves: leaves
                .into_iter()
                .enumerate()
                .map(|(node, roots)| Leaf { node, roots })
                .collect(),
            unresolved: vec![],
            integrations: 7,
        }
    }

    #[test]
    fn roots_are_sorted() {
        let config = Config::default();
        let set = aggregate(
            outcome(
                vec![vec![root(1.0, 0.0, 1, 0.0)], vec![root(-1.0, 1.0, 1, 0.0), root(-1.0, -1.0, 1, 0.0)]],
                Some(3),
            ),
            &config,
        );
        assert_eq!(
            set.positions(),
            vec![
                Complex64::new(-1.0, -1.0),
                Complex64::new(-1.0, 1.0),
                Complex64::new(1.0, 0.0)
            ]
        );
        assert_eq!(set.diagnostics.total, 3);
        assert_eq!(set.diagnostics.integrations, 7);
        assert!(set.is_complete());
    }

    #[test]
    fn duplicates_within_a_leaf_keep_one_multiplicity() {
        let config = Config::default();
        let set = aggregate(
            outcome(
                vec![vec![root(1.0, 0.0, 2, 1e-9), root(1.0 + 1e-10, 0.0, 2, 1e-12)]],
                Some(2),
            ),
            &config,
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.roots[0].multiplicity, 2);
        assert_eq!(set.roots[0].error, 1e-12);
    }

    #[test]
    fn duplicates_across_leaves_add_up() {
        let config = Config::default();
        let set = aggregate(
            outcome(
                vec![vec![root(1.0, 0.0, 1, 1e-9)], vec![root(1.0 + 1e-10, 0.0, 1, 1e-12)]],
                Some(2),
            ),
            &config,
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.roots[0].multiplicity, 2);
        assert_eq!(set.roots[0].root, Complex64::new(1.0 + 1e-10, 0.0));
        assert!(!set.diagnostics.count_mismatch);
    }

    #[test]
    fn mismatch_is_flagged() {
        let config = Config::default();
        let set = aggregate(outcome(vec![vec![root(1.0, 0.0, 1, 0.0)]], Some(2)), &config);
        assert!(set.diagnostics.count_mismatch);
        assert!(!set.is_complete());

        let set = aggregate(outcome(vec![vec![root(1.0, 0.0, 1, 0.0)]], None), &config);
        assert!(!set.diagnostics.count_mismatch);
    }

    #[test]
    fn simple_roots_may_undercount() {
        let config = Config {
            refine_multiplicity: false,
            ..Default::default()
        };
        let set = aggregate(outcome(vec![vec![root(1.0, 0.0, 1, 0.0)]], Some(2)), &config);
        assert!(!set.diagnostics.count_mismatch);
    }

    #[test]
    fn root_set_serializes_to_json() {
        let config = Config::default();
        let set = aggregate(outcome(vec![vec![root(0.5, -0.5, 1, 1e-13)]], Some(1)), &config);
        let json = serde_json::to_string(&set).unwrap();
        let back: RootSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
