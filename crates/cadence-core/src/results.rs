//! Timestamped result aggregation.
//!
//! Every Analyzer and Grapher owns exactly one [`ResultContainer`]. During a
//! run the container is append-only and its timestamps are non-decreasing;
//! at finalize it is sealed. When the run ends the containers of all
//! processors (complete, cancelled, and failed alike) are merged into one
//! [`ResultSet`] keyed by processor id.
//!
//! Iteration order is stable: processor id, then timestamp. Serializing the
//! same set twice produces identical bytes.

use std::collections::BTreeMap;
use std::collections::btree_map;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ResultError;
use crate::processor::{ProcessorId, Role};

/// A single result value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ResultValue {
    /// One number.
    Scalar(f64),
    /// A fixed-meaning tuple of numbers (e.g. `[rms, peak]`).
    Vector(Vec<f64>),
    /// A labeled span starting at the record's offset.
    Segment {
        /// Span length in sample frames.
        duration: u64,
        /// Segment label.
        label: String,
    },
}

/// A value stamped with the stream offset it describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Offset in sample frames of the processor's input timeline.
    pub offset: u64,
    /// The value.
    #[serde(flatten)]
    pub value: ResultValue,
}

/// Final state of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ContainerStatus {
    /// The processor saw the whole stream and finalized normally.
    Complete,
    /// The processor finalized early; records cover a prefix of the stream.
    Incomplete {
        /// Why the stream was cut short.
        reason: String,
    },
    /// The processor failed; records emitted before the failure are kept.
    Failed {
        /// Failure description.
        error: String,
        /// Offset of the frame being processed when it failed, if any.
        offset: Option<u64>,
    },
}

impl ContainerStatus {
    /// Returns true for [`ContainerStatus::Complete`].
    pub fn is_complete(&self) -> bool {
        matches!(self, ContainerStatus::Complete)
    }

    /// Returns true for [`ContainerStatus::Failed`].
    pub fn is_failed(&self) -> bool {
        matches!(self, ContainerStatus::Failed { .. })
    }
}

fn sealed_by_default() -> bool {
    true
}

/// One processor's timestamped output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultContainer {
    processor: ProcessorId,
    kind: String,
    role: Role,
    fingerprint: String,
    metadata: BTreeMap<String, String>,
    records: Vec<ResultRecord>,
    status: ContainerStatus,
    #[serde(skip, default = "sealed_by_default")]
    sealed: bool,
}

impl ResultContainer {
    /// Creates an open container.
    ///
    /// `params` is the processor's parameter echo; it is stored in the
    /// metadata under `param.<name>` and hashed into the fingerprint.
    pub fn new(
        processor: ProcessorId,
        kind: impl Into<String>,
        role: Role,
        params: &BTreeMap<String, String>,
    ) -> Self {
        let kind = kind.into();
        let fingerprint = fingerprint(&kind, params);
        let metadata = params
            .iter()
            .map(|(k, v)| (format!("param.{k}"), v.clone()))
            .collect();
        Self {
            processor,
            kind,
            role,
            fingerprint,
            metadata,
            records: Vec::new(),
            status: ContainerStatus::Complete,
            sealed: false,
        }
    }

    /// Producing processor.
    pub fn processor(&self) -> &ProcessorId {
        &self.processor
    }

    /// Processor kind tag (registry id).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Role of the producing processor.
    pub fn role(&self) -> Role {
        self.role
    }

    /// SHA-256 over kind and sorted parameters, hex encoded.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Free-form metadata (units, parameter echo).
    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    /// Records in timestamp order.
    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no record was emitted.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Final status.
    pub fn status(&self) -> &ContainerStatus {
        &self.status
    }

    /// Returns true once finalize has sealed the container.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Appends a record.
    ///
    /// # Errors
    ///
    /// - [`ResultError::Sealed`] after [`seal`](Self::seal)
    /// - [`ResultError::NonMonotonic`] if `offset` precedes the last record
    pub fn push(&mut self, offset: u64, value: ResultValue) -> Result<(), ResultError> {
        if self.sealed {
            return Err(ResultError::Sealed(self.processor.clone()));
        }
        if let Some(last) = self.records.last()
            && offset < last.offset
        {
            return Err(ResultError::NonMonotonic {
                offset,
                previous: last.offset,
            });
        }
        self.records.push(ResultRecord { offset, value });
        Ok(())
    }

    /// Appends a batch of records, all or nothing.
    ///
    /// The whole batch is checked before anything is stored, so a rejected
    /// batch leaves the container exactly as it was.
    ///
    /// # Errors
    ///
    /// Same as [`push`](Self::push), for the first offending record.
    pub fn extend(&mut self, records: Vec<ResultRecord>) -> Result<(), ResultError> {
        if self.sealed {
            return Err(ResultError::Sealed(self.processor.clone()));
        }
        let mut previous = self.records.last().map(|r| r.offset);
        for record in &records {
            if let Some(previous) = previous
                && record.offset < previous
            {
                return Err(ResultError::NonMonotonic {
                    offset: record.offset,
                    previous,
                });
            }
            previous = Some(record.offset);
        }
        self.records.extend(records);
        Ok(())
    }

    /// Sets a metadata entry.
    pub fn set_metadata(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), ResultError> {
        if self.sealed {
            return Err(ResultError::Sealed(self.processor.clone()));
        }
        self.metadata.insert(key.into(), value.into());
        Ok(())
    }

    /// Records the final status and makes the container immutable.
    pub fn seal(&mut self, status: ContainerStatus) {
        if !self.sealed {
            self.status = status;
            self.sealed = true;
        }
    }
}

/// Hex-encoded SHA-256 of `kind` and its sorted parameters.
pub fn fingerprint(kind: &str, params: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    for (key, value) in params {
        hasher.update([0u8]);
        hasher.update(key.as_bytes());
        hasher.update([b'=']);
        hasher.update(value.as_bytes());
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// All containers of one run, keyed by processor id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    containers: BTreeMap<ProcessorId, ResultContainer>,
}

impl ResultSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from containers, rejecting duplicate ids.
    pub fn from_containers(
        containers: impl IntoIterator<Item = ResultContainer>,
    ) -> Result<Self, ResultError> {
        let mut set = Self::new();
        for container in containers {
            set.insert(container)?;
        }
        Ok(set)
    }

    /// Adds a container.
    pub fn insert(&mut self, container: ResultContainer) -> Result<(), ResultError> {
        match self.containers.entry(container.processor.clone()) {
            btree_map::Entry::Occupied(entry) => {
                Err(ResultError::DuplicateContainer(entry.key().clone()))
            }
            btree_map::Entry::Vacant(entry) => {
                entry.insert(container);
                Ok(())
            }
        }
    }

    /// Structural union of two sets. No values are combined.
    pub fn merge(mut self, other: ResultSet) -> Result<ResultSet, ResultError> {
        for container in other.containers.into_values() {
            self.insert(container)?;
        }
        Ok(self)
    }

    /// Looks up a container.
    pub fn get(&self, id: &str) -> Option<&ResultContainer> {
        self.containers.get(id)
    }

    /// Iterates containers in processor-id order.
    pub fn iter(&self) -> impl Iterator<Item = &ResultContainer> {
        self.containers.values()
    }

    /// Iterates `(processor, record)` pairs in processor-id, then timestamp order.
    pub fn records(&self) -> impl Iterator<Item = (&ProcessorId, &ResultRecord)> {
        self.containers
            .iter()
            .flat_map(|(id, c)| c.records.iter().map(move |r| (id, r)))
    }

    /// Processor ids, sorted.
    pub fn ids(&self) -> impl Iterator<Item = &ProcessorId> {
        self.containers.keys()
    }

    /// Number of containers.
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// Returns true if the set has no containers.
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Ids of containers whose processor failed.
    pub fn failed(&self) -> Vec<&ProcessorId> {
        self.containers
            .iter()
            .filter(|(_, c)| c.status.is_failed())
            .map(|(id, _)| id)
            .collect()
    }

    /// Returns true if every container is complete.
    pub fn is_complete(&self) -> bool {
        self.containers.values().all(|c| c.status.is_complete())
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ResultContainer;
    type IntoIter = btree_map::Values<'a, ProcessorId, ResultContainer>;

    fn into_iter(self) -> Self::IntoIter {
        self.containers.values()
    }
}
