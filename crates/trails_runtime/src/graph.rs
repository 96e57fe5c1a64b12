//! Dependency graph construction and ordering.
//!
//! Nodes are registered services (indexed in registration order); an edge
//! points from a service to every service satisfying one of its references.
//! The construction order is a depth-first post-order over services in
//! registration order, following references in declaration order, so the
//! result is deterministic for a given registry.

use hashbrown::HashMap;

use crate::error::ContainerError;
use crate::manifest::ReferenceSpec;
use crate::registry::{LookupMiss, Provider, ServiceDescriptor, select_provider};
use crate::service::ServiceId;

/// A reference resolved to registration indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ResolvedReference {
    Single(usize),
    All(Vec<usize>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Resolved dependency graph of a registry.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: Vec<ServiceId>,
    edges: Vec<Vec<usize>>,
    resolved: Vec<Vec<(String, ResolvedReference)>>,
}

impl DependencyGraph {
    /// Resolves every reference of every descriptor against `providers`.
    ///
    /// `all` references never fail; single and qualified references fail
    /// when nothing matches, and single references also fail when several
    /// implementations exist without an unqualified default.
    pub(crate) fn resolve(
        descriptors: &[ServiceDescriptor],
        providers: &HashMap<String, Vec<Provider>>,
    ) -> Result<Self, ContainerError> {
        let mut edges = Vec::with_capacity(descriptors.len());
        let mut resolved = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            let mut node_edges: Vec<usize> = Vec::new();
            let mut node_refs = Vec::with_capacity(descriptor.references().len());

            for (name, spec) in descriptor.references() {
                let candidates = providers
                    .get(spec.interface())
                    .map(Vec::as_slice)
                    .unwrap_or_default();

                let reference = match spec {
                    ReferenceSpec::All { .. } => {
                        let mut targets: Vec<usize> = Vec::with_capacity(candidates.len());
                        for provider in candidates {
                            if !targets.contains(&provider.service) {
                                targets.push(provider.service);
                            }
                        }
                        ResolvedReference::All(targets)
                    }
                    ReferenceSpec::Single { .. } | ReferenceSpec::Qualified { .. } => {
                        match select_provider(candidates, spec.qualifier()) {
                            Ok(target) => ResolvedReference::Single(target),
                            Err(LookupMiss::NotFound) => {
                                return Err(ContainerError::UnresolvedReference {
                                    service: descriptor.id().clone(),
                                    reference: name.clone(),
                                    interface: spec.interface().to_owned(),
                                    qualifier: spec.qualifier().map(str::to_owned),
                                });
                            }
                            Err(LookupMiss::Ambiguous(services)) => {
                                return Err(ContainerError::AmbiguousInterface {
                                    interface: spec.interface().to_owned(),
                                    candidates: services
                                        .into_iter()
                                        .map(|idx| descriptors[idx].id().clone())
                                        .collect(),
                                });
                            }
                        }
                    }
                };

                match &reference {
                    ResolvedReference::Single(target) => push_unique(&mut node_edges, *target),
                    ResolvedReference::All(targets) => {
                        for target in targets {
                            push_unique(&mut node_edges, *target);
                        }
                    }
                }
                node_refs.push((name.clone(), reference));
            }

            edges.push(node_edges);
            resolved.push(node_refs);
        }

        Ok(Self {
            nodes: descriptors.iter().map(|d| d.id().clone()).collect(),
            edges,
            resolved,
        })
    }

    /// Returns the number of services in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no services.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the services `id` depends on, or `None` if `id` is unknown.
    #[must_use]
    pub fn dependencies(&self, id: &ServiceId) -> Option<Vec<&ServiceId>> {
        let node = self.nodes.iter().position(|n| n == id)?;
        Some(self.edges[node].iter().map(|&dep| &self.nodes[dep]).collect())
    }

    /// Returns the construction order as service identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::CyclicDependency`] if the graph has a cycle.
    pub fn construction_order(&self) -> Result<Vec<ServiceId>, ContainerError> {
        Ok(self
            .topological_order()?
            .into_iter()
            .map(|node| self.nodes[node].clone())
            .collect())
    }

    pub(crate) fn references_of(&self, node: usize) -> &[(String, ResolvedReference)] {
        &self.resolved[node]
    }

    /// Computes the construction order as registration indices.
    pub(crate) fn topological_order(&self) -> Result<Vec<usize>, ContainerError> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut order = Vec::with_capacity(self.nodes.len());

        for node in 0..self.nodes.len() {
            self.visit(node, &mut marks, &mut order)?;
        }
        Ok(order)
    }

    /// Depth-first post-order from `root`, with an explicit stack so chain
    /// length is not bounded by the thread's stack.
    fn visit(
        &self,
        root: usize,
        marks: &mut [Mark],
        order: &mut Vec<usize>,
    ) -> Result<(), ContainerError> {
        if marks[root] != Mark::Unvisited {
            return Ok(());
        }

        // The current path: each node with the index of its next edge.
        let mut stack = vec![(root, 0)];
        marks[root] = Mark::InProgress;

        while let Some(frame) = stack.last_mut() {
            let (node, next) = *frame;
            let Some(&dep) = self.edges[node].get(next) else {
                stack.pop();
                marks[node] = Mark::Done;
                order.push(node);
                continue;
            };
            frame.1 += 1;

            match marks[dep] {
                Mark::Done => {}
                Mark::InProgress => {
                    // `dep` is on the current path; the cycle runs from there back to it.
                    let start = stack.iter().position(|&(n, _)| n == dep).unwrap_or(0);
                    let mut cycle: Vec<ServiceId> = stack[start..]
                        .iter()
                        .map(|&(n, _)| self.nodes[n].clone())
                        .collect();
                    cycle.push(self.nodes[dep].clone());
                    return Err(ContainerError::CyclicDependency { cycle });
                }
                Mark::Unvisited => {
                    marks[dep] = Mark::InProgress;
                    stack.push((dep, 0));
                }
            }
        }
        Ok(())
    }
}

fn push_unique(edges: &mut Vec<usize>, target: usize) {
    if !edges.contains(&target) {
        edges.push(target);
    }
}
