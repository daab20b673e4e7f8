//! Adaptive subdivision of the search region.
//!
//! Regions live in an arena and are processed from a FIFO work-list one
//! generation at a time. The work on the nodes of a generation only reads
//! the arena, so it may run on rayon workers; its results are applied in
//! index order, which keeps the outcome independent of scheduling.

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use rayon::prelude::*;

use crate::config::Config;
use crate::contour::{Contour, SPLIT_RATIOS};
use crate::count::{count_roots, RootCount};
use crate::error::{Error, Result, UnresolvedReason};
use crate::function::AnalyticFunction;
use crate::refine::{refine, Refinement, Root};

/// A part of the region that could not be resolved.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UnresolvedRegion {
    pub contour: Contour,
    pub depth: usize,
    pub reason: UnresolvedReason,
}

impl fmt::Display for UnresolvedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at depth {}: {}", self.contour, self.depth, self.reason)
    }
}

// Contours hold closures, so regions compare by their printed boundary.
impl PartialEq for UnresolvedRegion {
    fn eq(&self, other: &Self) -> bool {
        self.depth == other.depth
            && self.reason == other.reason
            && self.contour.to_string() == other.contour.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Pending,
    Counting,
    Trustworthy,
    Untrustworthy,
    Discarded,
    ReadyForRefinement,
    Refined,
    Subdivided,
    Unresolved,
}

#[derive(Debug)]
struct Node {
    contour: Contour,
    parent: Option<usize>,
    depth: usize,
    /// Count taken when the parent was split.
    count: Option<RootCount>,
    retry: bool,
    state: NodeState,
}

/// Roots refined inside one leaf region.
#[derive(Debug, Clone)]
pub struct Leaf {
    pub node: usize,
    pub roots: Vec<Root>,
}

#[derive(Debug, Clone)]
pub struct Outcome {
    /// Trustworthy count of the whole region, if there is one.
    pub expected: Option<usize>,
    pub leaves: Vec<Leaf>,
    pub unresolved: Vec<UnresolvedRegion>,
    pub integrations: usize,
}

enum Step {
    Discard,
    Refined(Vec<Root>),
    Split {
        children: Vec<(Contour, RootCount)>,
        retry: bool,
    },
    Unresolved(UnresolvedReason),
}

struct Work {
    /// State reached before `step` is applied.
    state: NodeState,
    step: Step,
    integrations: usize,
}

pub struct Scheduler<'a> {
    function: &'a AnalyticFunction,
    config: &'a Config,
    nodes: Vec<Node>,
    queue: VecDeque<usize>,
    integrations: usize,
    started: Instant,
}

impl<'a> Scheduler<'a> {
    pub fn new(function: &'a AnalyticFunction, config: &'a Config) -> Self {
        Self {
            function,
            config,
            nodes: vec![],
            queue: VecDeque::new(),
            integrations: 0,
            started: Instant::now(),
        }
    }

    /// Runs the subdivision on `region` until every part of it is discarded,
    /// refined or reported as unresolved.
    pub fn run(mut self, region: &Contour) -> Result<Outcome> {
        let top = count_roots(region, self.function, self.config);
        self.integrations += 1;
        if let Some(failure) = top.failure.filter(|_| top.is_singular()) {
            return Err(Error::InvalidBoundary(format!(
                "the integrand is singular on the boundary of {region}: {failure}"
            )));
        }

        let expected = top.trusted();
        match expected {
            Some(count) => log::info!("{count} roots in {region}"),
            None => log::info!(
                "Could not count the roots in {region} (integral {:.4})",
                top.integral
            ),
        }

        self.push(region.clone(), None, Some(top), false);

        let mut leaves = vec![];
        let mut unresolved = vec![];
        let mut generation = 0;

        while !self.queue.is_empty() {
            if let Some(reason) = self.budget_exhausted() {
                log::warn!(
                    "Budget exhausted ({reason}), {} regions left",
                    self.queue.len()
                );
                for index in self.queue.drain(..) {
                    let node = &mut self.nodes[index];
                    node.state = NodeState::Unresolved;
                    unresolved.push(UnresolvedRegion {
                        contour: node.contour.clone(),
                        depth: node.depth,
                        reason: UnresolvedReason::BudgetExhausted,
                    });
                }
                break;
            }

            let indices = self.queue.drain(..).collect::<Vec<_>>();
            log::debug!("Generation {generation}: {} regions", indices.len());
            for &index in &indices {
                self.nodes[index].state = NodeState::Counting;
            }

            let work = if self.config.parallel {
                indices
                    .par_iter()
                    .map(|&index| self.process(index))
                    .collect::<Vec<_>>()
            } else {
                indices
                    .iter()
                    .map(|&index| self.process(index))
                    .collect::<Vec<_>>()
            };

            for (index, work) in indices.into_iter().zip(work) {
                self.integrations += work.integrations;
                self.nodes[index].state = work.state;

                match work.step {
                    Step::Discard => {
                        self.nodes[index].state = NodeState::Discarded;
                    }
                    Step::Refined(roots) => {
                        self.nodes[index].state = NodeState::Refined;
                        leaves.push(Leaf { node: index, roots });
                    }
                    Step::Split { children, retry } => {
                        self.nodes[index].state = NodeState::Subdivided;
                        let retry = retry || self.nodes[index].retry;
                        for (contour, count) in children {
                            self.push(contour, Some(index), Some(count), retry);
                        }
                    }
                    Step::Unresolved(reason) => {
                        let node = &mut self.nodes[index];
                        node.state = NodeState::Unresolved;
                        let region = UnresolvedRegion {
                            contour: node.contour.clone(),
                            depth: node.depth,
                            reason,
                        };
                        log::warn!("Unresolved region {region}");
                        unresolved.push(region);
                    }
                }
            }
            generation += 1;
        }

        let discarded = self
            .nodes
            .iter()
            .filter(|node| node.state == NodeState::Discarded)
            .count();
        log::info!(
            "{} leaves refined, {} empty, {} unresolved, {} integrations in {} generations",
            leaves.len(),
            discarded,
            unresolved.len(),
            self.integrations,
            generation
        );

        Ok(Outcome {
            expected,
            leaves,
            unresolved,
            integrations: self.integrations,
        })
    }

    fn push(&mut self, contour: Contour, parent: Option<usize>, count: Option<RootCount>, retry: bool) {
        let depth = parent.map_or(0, |parent| self.nodes[parent].depth + 1);
        self.queue.push_back(self.nodes.len());
        self.nodes.push(Node {
            contour,
            parent,
            depth,
            count,
            retry,
            state: NodeState::Pending,
        });
    }

    fn budget_exhausted(&self) -> Option<&'static str> {
        if matches!(self.config.max_integrations, Some(max) if self.integrations >= max) {
            return Some("integrations");
        }
        if matches!(self.config.time_limit, Some(limit) if self.started.elapsed() >= limit) {
            return Some("time");
        }
        None
    }

    fn process(&self, index: usize) -> Work {
        let node = &self.nodes[index];
        let mut integrations = 0;
        log::debug!(
            "Region {index} at depth {} (parent {:?}, retry {})",
            node.depth,
            node.parent,
            node.retry
        );

        let count = match &node.count {
            Some(count) => count.clone(),
            None => {
                integrations += 1;
                count_roots(&node.contour, self.function, self.config)
            }
        };

        let Some(n) = count.trusted() else {
            log::debug!("Region {index} ({}) has no trustworthy count", node.contour);
            if node.depth >= self.config.max_subdivision_depth {
                let reason = count
                    .failure
                    .map_or(UnresolvedReason::DepthExceeded, UnresolvedReason::IntegrationFailure);
                return Work {
                    state: NodeState::Untrustworthy,
                    step: Step::Unresolved(reason),
                    integrations,
                };
            }
            let (step, split_integrations) = self.split(node, None, false);
            return Work {
                state: NodeState::Untrustworthy,
                step,
                integrations: integrations + split_integrations,
            };
        };

        if n == 0 {
            log::debug!("Region {index} ({}) is empty", node.contour);
            return Work {
                state: NodeState::Trustworthy,
                step: Step::Discard,
                integrations,
            };
        }

        if n > self.config.max_roots_per_leaf {
            log::debug!("Region {index} ({}) holds {n} roots", node.contour);
            let (step, split_integrations) = self.split(node, Some(n), false);
            return Work {
                state: NodeState::Trustworthy,
                step,
                integrations: integrations + split_integrations,
            };
        }

        log::debug!("Refining {n} roots in region {index} ({})", node.contour);
        integrations += 1;
        let (step, split_integrations) = match refine(&node.contour, n, self.function, self.config) {
            Ok(Refinement::Roots(roots)) => (Step::Refined(roots), 0),
            Ok(Refinement::Subdivide) => self.split(node, Some(n), false),
            Err(failure) if node.retry => {
                (Step::Unresolved(UnresolvedReason::RefinementFailure(failure)), 0)
            }
            Err(failure) => {
                log::debug!("Refinement in region {index} failed ({failure}), splitting once more");
                match self.split(node, Some(n), true) {
                    (Step::Unresolved(UnresolvedReason::DepthExceeded), k) => (
                        Step::Unresolved(UnresolvedReason::RefinementFailure(failure)),
                        k,
                    ),
                    other => other,
                }
            }
        };

        Work {
            state: NodeState::ReadyForRefinement,
            step,
            integrations: integrations + split_integrations,
        }
    }

    /// Tries the split ratios in turn and keeps the first partition whose
    /// children all have trustworthy counts adding up to `count`. Falls back
    /// to the first partition.
    fn split(&self, node: &Node, count: Option<usize>, retry: bool) -> (Step, usize) {
        if node.depth >= self.config.max_subdivision_depth {
            return (Step::Unresolved(UnresolvedReason::DepthExceeded), 0);
        }

        let mut integrations = 0;
        let mut first = None;
        for ratio in SPLIT_RATIOS {
            let Some(children) = node.contour.subdivide(ratio) else {
                return (Step::Unresolved(UnresolvedReason::CannotSubdivide), integrations);
            };
            let counted = children
                .into_iter()
                .map(|child| {
                    let count = count_roots(&child, self.function, self.config);
                    (child, count)
                })
                .collect::<Vec<_>>();
            integrations += counted.len();

            let trusted = counted
                .iter()
                .map(|(_, count)| count.trusted())
                .collect::<Option<Vec<_>>>();
            let consistent = match (trusted, count) {
                (Some(counts), Some(total)) => counts.iter().sum::<usize>() == total,
                (Some(_), None) => true,
                (None, _) => false,
            };

            if consistent {
                return (
                    Step::Split {
                        children: counted,
                        retry,
                    },
                    integrations,
                );
            }
            log::debug!("Split of {} at {ratio} is inconsistent", node.contour);
            first.get_or_insert(counted);
        }

        match first {
            Some(children) => (Step::Split { children, retry }, integrations),
            None => (Step::Unresolved(UnresolvedReason::CannotSubdivide), integrations),
        }
    }
}
