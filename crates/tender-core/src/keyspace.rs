//! Key-path schema for the offer namespace.
//!
//! Layout under the configured root:
//! - `<root>/offer/<job>/object` - encoded offer
//! - `<root>/offer/<job>/bids/<machine>` - bid marker, empty value
//! - `<root>/lease/<name>` - lease record holding the holder's identity
//!
//! Writers build keys with [`Keyspace::key`]; the event deriver recognises them
//! with [`OfferKey::parse_object`] and [`OfferKey::parse_bid`]. Recognition is
//! anchored at the tail of the path, so it does not depend on the root.

use thiserror::Error;

use crate::{InvalidIdentity, JobBid, JobId, MachineId};

pub const OFFER_PREFIX: &str = "offer";
pub const OBJECT_KEY: &str = "object";
pub const BIDS_KEY: &str = "bids";
pub const LEASE_PREFIX: &str = "lease";

/// A typed key in the offer namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferKey {
    Object(JobId),
    Bid(JobBid),
}

/// Why a path is not a given [`OfferKey`] shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathMismatch {
    #[error("path has {found} segments, shape needs {needed}")]
    TooShort { needed: usize, found: usize },

    #[error("expected segment '{expected}', found '{found}'")]
    Segment { expected: &'static str, found: String },

    #[error("empty identity segment")]
    EmptySegment,
}

impl OfferKey {
    /// Recognise `.../offer/<job>/object`.
    pub fn parse_object(path: &str) -> Result<JobId, PathMismatch> {
        let [namespace, job, leaf] = tail::<3>(path)?;

        expect_segment(leaf, OBJECT_KEY)?;
        expect_segment(namespace, OFFER_PREFIX)?;

        Ok(JobId::from(non_empty(job)?))
    }

    /// Recognise `.../offer/<job>/bids/<machine>`. Both identities come from the path.
    pub fn parse_bid(path: &str) -> Result<JobBid, PathMismatch> {
        let [namespace, job, bids, machine] = tail::<4>(path)?;

        expect_segment(bids, BIDS_KEY)?;
        expect_segment(namespace, OFFER_PREFIX)?;

        Ok(JobBid::new(
            JobId::from(non_empty(job)?),
            MachineId::from(non_empty(machine)?),
        ))
    }
}

fn tail<const N: usize>(path: &str) -> Result<[&str; N], PathMismatch> {
    let segments: Vec<&str> = path.strip_prefix('/').unwrap_or(path).split('/').collect();
    if segments.len() < N {
        return Err(PathMismatch::TooShort {
            needed: N,
            found: segments.len(),
        });
    }

    let mut out = [""; N];
    out.copy_from_slice(&segments[segments.len() - N..]);
    Ok(out)
}

fn expect_segment(found: &str, expected: &'static str) -> Result<(), PathMismatch> {
    if found == expected {
        Ok(())
    } else {
        Err(PathMismatch::Segment {
            expected,
            found: found.to_string(),
        })
    }
}

fn non_empty(segment: &str) -> Result<&str, PathMismatch> {
    if segment.is_empty() {
        Err(PathMismatch::EmptySegment)
    } else {
        Ok(segment)
    }
}

/// Absolute key builder rooted at the configured prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyspace {
    root: String,
}

impl Keyspace {
    /// `root` is normalised to a leading slash and no trailing slash.
    pub fn new(root: impl AsRef<str>) -> Self {
        let trimmed = root.as_ref().trim_matches('/');
        let root = if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        };
        Self { root }
    }

    /// The root, or `/` when mounted at the top of the store.
    pub fn root(&self) -> &str {
        if self.root.is_empty() { "/" } else { &self.root }
    }

    /// Directory holding every offer.
    pub fn offers(&self) -> String {
        format!("{}/{OFFER_PREFIX}", self.root)
    }

    /// Directory holding one offer's object and bids.
    ///
    /// Fails for ids that are not a single path segment; such an id would
    /// address the namespace itself or another offer's subtree.
    pub fn offer(&self, job_id: &JobId) -> Result<String, InvalidIdentity> {
        job_id.validate()?;
        Ok(format!("{}/{OFFER_PREFIX}/{job_id}", self.root))
    }

    /// Directory holding one offer's bid markers.
    pub fn bids(&self, job_id: &JobId) -> Result<String, InvalidIdentity> {
        Ok(format!("{}/{BIDS_KEY}", self.offer(job_id)?))
    }

    pub fn key(&self, key: &OfferKey) -> Result<String, InvalidIdentity> {
        match key {
            OfferKey::Object(job_id) => Ok(format!("{}/{OBJECT_KEY}", self.offer(job_id)?)),
            OfferKey::Bid(bid) => {
                bid.machine_id.validate()?;
                Ok(format!("{}/{}", self.bids(&bid.job_id)?, bid.machine_id))
            }
        }
    }

    pub fn lease(&self, name: &str) -> String {
        format!("{}/{LEASE_PREFIX}/{name}", self.root)
    }

    /// Lease name guarding the claim on a job's offer.
    pub fn offer_lease_name(job_id: &JobId) -> String {
        format!("{OFFER_PREFIX}-{job_id}")
    }
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new("/tender")
    }
}
