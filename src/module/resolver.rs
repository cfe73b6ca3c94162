//! Module dependency resolution
//!
//! Turns a set of module containers into a total load order in which every
//! module appears after all of its resolvable dependencies. Containers are
//! sorted by id before graph construction so resolution is deterministic
//! regardless of discovery order.

use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::module::metadata::ModuleContainer;

/// Per-module resolution failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A required dependency id is absent from the candidate set; the
    /// dependent module is dropped (recoverable).
    #[error("Module {module} requires missing dependency {dependency}")]
    MissingDependency { module: String, dependency: String },

    /// A dependency cycle; fatal for the whole run. The path is the full
    /// cycle closed back on its first member, e.g. `a -> b -> a`.
    #[error("Circular module dependency detected: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },
}

impl ResolveError {
    /// Cycles abort the run; missing dependencies only exclude one module.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ResolveError::CircularDependency { .. })
    }
}

/// Dependency resolution result
#[derive(Debug)]
pub struct Resolution {
    /// Modules in load order (dependencies first)
    pub load_order: Vec<ModuleContainer>,
    /// Everything that kept a module out of the load order
    pub errors: Vec<ResolveError>,
}

impl Resolution {
    /// First fatal error, if resolution found a cycle
    pub fn fatal_error(&self) -> Option<&ResolveError> {
        self.errors.iter().find(|e| e.is_fatal())
    }

    /// Ids in load order
    pub fn loaded_ids(&self) -> Vec<&str> {
        self.load_order.iter().map(|c| c.id.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
    /// On a path that hit a cycle; excluded from the order, never revisited
    Failed,
}

/// Dependency resolver
pub struct DependencyResolver;

impl DependencyResolver {
    /// Resolve module load order
    ///
    /// Pure with respect to the input containers; logs one error or warning
    /// per unresolved edge and one fatal error per cycle.
    pub fn resolve(mut containers: Vec<ModuleContainer>) -> Resolution {
        containers.sort_by(|a, b| a.id.cmp(&b.id));

        let index: HashMap<String, usize> = containers
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();

        let mut errors = Vec::new();
        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); containers.len()];
        let mut dropped = vec![false; containers.len()];

        for (i, container) in containers.iter().enumerate() {
            for dep in &container.descriptor.dependencies {
                match index.get(dep) {
                    Some(&j) => edges[i].push(j),
                    None => {
                        error!(
                            "Module {} requires {} which is not present; module will not load",
                            container.id, dep
                        );
                        errors.push(ResolveError::MissingDependency {
                            module: container.id.clone(),
                            dependency: dep.clone(),
                        });
                        dropped[i] = true;
                    }
                }
            }
            for dep in &container.descriptor.optional_dependencies {
                match index.get(dep) {
                    Some(&j) => edges[i].push(j),
                    None => {
                        warn!(
                            "Module {} optionally depends on {} which is not present",
                            container.id, dep
                        );
                    }
                }
            }
        }

        let mut marks = vec![Mark::Unvisited; containers.len()];
        let mut order: Vec<usize> = Vec::with_capacity(containers.len());

        for root in 0..containers.len() {
            if dropped[root] || marks[root] != Mark::Unvisited {
                continue;
            }
            let mut path: Vec<usize> = Vec::new();
            if let Err(cycle_ids) = Self::visit(
                root, &containers, &edges, &dropped, &mut marks, &mut path, &mut order,
            ) {
                error!(
                    "Circular module dependency: {}",
                    cycle_ids.join(" -> ")
                );
                errors.push(ResolveError::CircularDependency { cycle: cycle_ids });
                // Nothing on the aborted path gets a (partial) order.
                for mark in marks.iter_mut() {
                    if *mark == Mark::InProgress {
                        *mark = Mark::Failed;
                    }
                }
            }
        }

        debug!(
            "Dependency resolution complete: {:?}",
            order
                .iter()
                .map(|&i| containers[i].id.as_str())
                .collect::<Vec<_>>()
        );

        let mut slots: Vec<Option<ModuleContainer>> = containers.into_iter().map(Some).collect();
        let load_order = order
            .into_iter()
            .filter_map(|i| slots[i].take())
            .collect();

        Resolution { load_order, errors }
    }

    /// Post-order depth-first visit; `Err` carries the closed cycle path
    fn visit(
        idx: usize,
        containers: &[ModuleContainer],
        edges: &[Vec<usize>],
        dropped: &[bool],
        marks: &mut [Mark],
        path: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<(), Vec<String>> {
        marks[idx] = Mark::InProgress;
        path.push(idx);

        for &dep in &edges[idx] {
            if dropped[dep] || marks[dep] == Mark::Failed {
                warn!(
                    "Module {} depends on {} which failed to resolve; edge skipped",
                    containers[idx].id, containers[dep].id
                );
                continue;
            }
            match marks[dep] {
                Mark::Done => {}
                Mark::InProgress => {
                    // Cycle: capture the current path from the revisited
                    // node, closed back on itself.
                    let pos = path
                        .iter()
                        .position(|&p| p == dep)
                        .unwrap_or(0);
                    let mut cycle: Vec<String> = path[pos..]
                        .iter()
                        .map(|&p| containers[p].id.clone())
                        .collect();
                    cycle.push(containers[dep].id.clone());
                    return Err(cycle);
                }
                _ => {
                    Self::visit(dep, containers, edges, dropped, marks, path, order)?;
                }
            }
        }

        path.pop();
        marks[idx] = Mark::Done;
        order.push(idx);
        Ok(())
    }
}
