//! Batched execution of units with failure aggregation.
//!
//! Units are grouped into dependency batches, each batch runs through the
//! bounded pool, and batch N+1 only starts once every unit of batch N has
//! settled. Failures never stop later batches; they are collected and raised
//! together once everything has run.

pub mod pool;

use crate::{Error, Result};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::future::Future;
use toolrig_workspaces::{WorkspacePackage, resolve_batches, short_name};

/// A schedulable piece of work, keyed by the package (or driver) it runs for.
pub struct ExecutionUnit<T> {
    /// Key used to place the unit in a dependency batch.
    pub key: String,
    action: BoxFuture<'static, Result<T>>,
}

impl<T> ExecutionUnit<T> {
    /// Wrap `action` under `key`.
    pub fn new<F>(key: impl Into<String>, action: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            key: key.into(),
            action: Box::pin(action),
        }
    }
}

impl<T> std::fmt::Debug for ExecutionUnit<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionUnit")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// What a successful run returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome<T> {
    /// The one result of a single-target run.
    Single(T),
    /// Every result of a workspace run, in no particular order.
    Workspace(Vec<T>),
}

impl<T> RunOutcome<T> {
    /// All results as a list.
    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Single(result) => vec![result],
            Self::Workspace(results) => results,
        }
    }
}

/// Group `units` into dependency batches.
///
/// Each unit goes into the batch of the package whose name, or local name for
/// scoped packages, equals its key. Units matching no package form a trailing
/// batch. With `graph` disabled every unit lands in one batch.
///
/// # Errors
///
/// Returns an error if the package set has duplicate names.
pub fn batch_units<T>(
    units: Vec<ExecutionUnit<T>>,
    packages: &[WorkspacePackage],
    graph: bool,
) -> Result<Vec<Vec<ExecutionUnit<T>>>> {
    if units.is_empty() {
        return Ok(Vec::new());
    }
    if !graph || packages.is_empty() {
        return Ok(vec![units]);
    }

    let package_batches = resolve_batches(packages, true)?;

    // (batch index, position inside the batch) per full and local name
    let mut slot_of: HashMap<&str, (usize, usize)> = HashMap::new();
    for (index, batch) in package_batches.iter().enumerate() {
        for (position, package) in batch.iter().enumerate() {
            slot_of.insert(package.name.as_str(), (index, position));
        }
    }
    for (index, batch) in package_batches.iter().enumerate() {
        for (position, package) in batch.iter().enumerate() {
            slot_of.entry(package.short_name()).or_insert((index, position));
        }
    }

    let mut placed: Vec<Vec<(usize, ExecutionUnit<T>)>> =
        package_batches.iter().map(|_| Vec::new()).collect();
    let mut ungraphed = Vec::new();

    for unit in units {
        let slot = slot_of
            .get(unit.key.as_str())
            .or_else(|| slot_of.get(short_name(&unit.key)))
            .copied();
        match slot {
            Some((index, position)) => placed[index].push((position, unit)),
            None => {
                tracing::debug!(unit = %unit.key, "No workspace package matches unit, running it last");
                ungraphed.push(unit);
            }
        }
    }

    let mut batches: Vec<Vec<ExecutionUnit<T>>> = placed
        .into_iter()
        .map(|mut batch| {
            batch.sort_by_key(|(position, _)| *position);
            batch.into_iter().map(|(_, unit)| unit).collect()
        })
        .collect();

    batches.retain(|batch| !batch.is_empty());
    if !ungraphed.is_empty() {
        batches.push(ungraphed);
    }
    Ok(batches)
}

/// Run `batches` in order, each through a pool of `concurrency`.
///
/// # Errors
///
/// Returns [`Error::Aggregate`] holding every failure if any unit failed.
/// Successful results are discarded in that case.
pub async fn run_batches<T>(batches: Vec<Vec<ExecutionUnit<T>>>, concurrency: usize) -> Result<Vec<T>>
where
    T: Send + 'static,
{
    let mut successes = Vec::new();
    let mut failures = Vec::new();

    for (index, batch) in batches.into_iter().enumerate() {
        crate::emit_batch_started!(index, batch.len());
        for (key, result) in pool::run_bounded(batch, concurrency).await {
            match result {
                Ok(value) => successes.push(value),
                Err(error) => {
                    tracing::debug!(unit = %key, batch = index, "Execution unit failed");
                    failures.push(error);
                }
            }
        }
    }

    if failures.is_empty() {
        Ok(successes)
    } else {
        Err(Error::aggregate(&failures))
    }
}

/// Batch and run `units`.
///
/// # Errors
///
/// Returns a batching error, or [`Error::Aggregate`] if any unit failed.
pub async fn run_pipeline<T>(
    units: Vec<ExecutionUnit<T>>,
    packages: &[WorkspacePackage],
    graph: bool,
    concurrency: usize,
) -> Result<Vec<T>>
where
    T: Send + 'static,
{
    let batches = batch_units(units, packages, graph)?;
    run_batches(batches, concurrency).await
}
