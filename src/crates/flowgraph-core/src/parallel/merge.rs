//! Branch results and metadata merge policies

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{GraphError, Result};

/// Outcome of one parallel branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum BranchOutcome {
    Success {
        data: Value,
        #[serde(default)]
        metadata: HashMap<String, Value>,
    },
    Failed {
        error: String,
    },
}

impl BranchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, BranchOutcome::Success { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            BranchOutcome::Success { data, .. } => Some(data),
            BranchOutcome::Failed { .. } => None,
        }
    }
}

/// Branch outcomes in branch declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BranchResults {
    entries: Vec<(String, BranchOutcome)>,
}

impl BranchResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, branch: impl Into<String>, outcome: BranchOutcome) {
        self.entries.push((branch.into(), outcome));
    }

    pub fn get(&self, branch: &str) -> Option<&BranchOutcome> {
        self.entries
            .iter()
            .find(|(name, _)| name == branch)
            .map(|(_, outcome)| outcome)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BranchOutcome)> {
        self.entries.iter().map(|(name, outcome)| (name.as_str(), outcome))
    }

    /// Successful branches as `(name, data, metadata)`
    pub fn successes(&self) -> impl Iterator<Item = (&str, &Value, &HashMap<String, Value>)> {
        self.entries.iter().filter_map(|(name, outcome)| match outcome {
            BranchOutcome::Success { data, metadata } => Some((name.as_str(), data, metadata)),
            BranchOutcome::Failed { .. } => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// JSON object keyed by branch name, in declaration order
    pub fn to_value(&self) -> Result<Value> {
        let mut map = Map::new();
        for (name, outcome) in &self.entries {
            map.insert(name.clone(), serde_json::to_value(outcome)?);
        }
        Ok(Value::Object(map))
    }

    /// Parse the object produced by [`to_value`](Self::to_value)
    pub fn from_value(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| GraphError::state(format!("branch results must be an object, got {}", value)))?;

        let mut results = Self::new();
        for (name, outcome) in map {
            let outcome = serde_json::from_value(outcome.clone())
                .map_err(|e| GraphError::state(format!("branch '{}': {}", name, e)))?;
            results.push(name.clone(), outcome);
        }
        Ok(results)
    }
}

/// How numeric or categorical values of one metadata key are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Arithmetic mean of numeric values
    Average,
    /// Most frequent value; ties go to the first seen
    Vote,
    Sum,
    Min,
    Max,
    /// Array of all values in branch order
    Collect,
}

/// How branch metadata is merged into the parallel node's metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MergePolicy {
    /// Keys become `<parallel node id>.<branch>.<key>`
    #[default]
    Namespace,
    /// Later branches (declaration order) overwrite earlier ones
    LastWrite,
    /// Per-key aggregation; undeclared keys fall back to last-write
    Custom(HashMap<String, Aggregation>),
}

impl MergePolicy {
    /// Custom policy from `(key, aggregation)` pairs
    pub fn custom<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = (S, Aggregation)>,
        S: Into<String>,
    {
        MergePolicy::Custom(rules.into_iter().map(|(k, a)| (k.into(), a)).collect())
    }

    /// Merge the metadata of the successful branches
    pub fn merge(&self, parallel_node_id: &str, results: &BranchResults) -> HashMap<String, Value> {
        match self {
            MergePolicy::Namespace => results
                .successes()
                .flat_map(|(branch, _, metadata)| {
                    metadata.iter().map(move |(key, value)| {
                        (format!("{}.{}.{}", parallel_node_id, branch, key), value.clone())
                    })
                })
                .collect(),
            MergePolicy::LastWrite => last_write(results),
            MergePolicy::Custom(rules) => {
                let mut merged = last_write(results);
                for (key, aggregation) in rules {
                    let values: Vec<&Value> = results
                        .successes()
                        .filter_map(|(_, _, metadata)| metadata.get(key))
                        .collect();
                    match aggregate(*aggregation, &values) {
                        Some(value) => {
                            merged.insert(key.clone(), value);
                        }
                        None => {
                            merged.remove(key);
                        }
                    }
                }
                merged
            }
        }
    }
}

fn last_write(results: &BranchResults) -> HashMap<String, Value> {
    let mut merged = HashMap::new();
    for (_, _, metadata) in results.successes() {
        merged.extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    merged
}

/// Combine values with `aggregation`; `None` when nothing usable was given
pub fn aggregate(aggregation: Aggregation, values: &[&Value]) -> Option<Value> {
    let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();

    match aggregation {
        Aggregation::Average => (!numbers.is_empty())
            .then(|| Value::from(numbers.iter().sum::<f64>() / numbers.len() as f64)),
        Aggregation::Sum => (!numbers.is_empty()).then(|| Value::from(numbers.iter().sum::<f64>())),
        Aggregation::Min => values
            .iter()
            .filter(|v| v.is_number())
            .min_by(|a, b| compare_numbers(a, b))
            .map(|v| (*v).clone()),
        Aggregation::Max => values
            .iter()
            .filter(|v| v.is_number())
            .max_by(|a, b| compare_numbers(a, b))
            .map(|v| (*v).clone()),
        Aggregation::Vote => vote(values.iter().copied()),
        Aggregation::Collect => {
            (!values.is_empty()).then(|| Value::Array(values.iter().map(|v| (*v).clone()).collect()))
        }
    }
}

fn compare_numbers(a: &Value, b: &Value) -> std::cmp::Ordering {
    let a = a.as_f64().unwrap_or(f64::NAN);
    let b = b.as_f64().unwrap_or(f64::NAN);
    a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
}

/// Most frequent value; ties go to the value seen first
pub(crate) fn vote<'v>(values: impl Iterator<Item = &'v Value>) -> Option<Value> {
    let mut tallies: Vec<(&Value, usize)> = Vec::new();
    for value in values {
        match tallies.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => tallies.push((value, 1)),
        }
    }

    let mut best: Option<(&Value, usize)> = None;
    for (value, count) in tallies {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.clone())
}
