//! Offer and bid value types.

use serde::{Deserialize, Serialize};

use crate::{JobId, MachineId};

/// A job as far as the auction is concerned: its name and an opaque payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: JobId,
    /// Opaque to the registry; carried through storage untouched.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl Job {
    pub fn new(name: impl Into<JobId>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// A unit of work awaiting assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOffer {
    pub job: Job,
}

impl JobOffer {
    pub fn new(job: Job) -> Self {
        Self { job }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job.name
    }
}

/// One machine's willingness to run a job. Identified by the (job, machine) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobBid {
    pub job_id: JobId,
    pub machine_id: MachineId,
}

impl JobBid {
    pub fn new(job_id: impl Into<JobId>, machine_id: impl Into<MachineId>) -> Self {
        Self {
            job_id: job_id.into(),
            machine_id: machine_id.into(),
        }
    }
}
