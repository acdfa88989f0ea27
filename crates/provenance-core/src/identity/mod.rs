//! Agent identities, registry records, and caller credentials.
//!
//! Agents are identified by an opaque address string (typically a chain-style
//! `0x...` address, but nothing here parses it). Every mutation of the
//! provenance or reputation ledgers takes an explicit [`Caller`] credential;
//! there is no ambient "current user".

use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque agent address.
///
/// Equality and hashing are plain string equality; the ledger attaches no
/// meaning to the address beyond uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Creates an agent id from any string-like address.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for AgentId {
    fn from(address: String) -> Self {
        Self(address)
    }
}

/// Descriptive metadata attachable to a registered agent.
///
/// The `pubkey` and `stake_address` fields are opaque blobs carried for
/// consumers; nothing in this crate verifies them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMetadata {
    /// Human-readable agent name.
    pub name: String,

    /// Organization operating the agent.
    pub owner_org: String,

    /// Opaque public key blob.
    pub pubkey: String,

    /// Address staked behind the agent's behavior.
    pub stake_address: String,
}

/// One row of the agent registry.
///
/// A record is created the first time an agent appears (by explicit
/// registration or by its first appended action) and is never removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    /// The agent's unique address.
    pub address: AgentId,

    /// Optional descriptive metadata; `None` for agents only ever seen via
    /// appended actions.
    pub metadata: Option<AgentMetadata>,
}

/// The credential a caller presents when mutating a ledger.
///
/// An agent credential may only write records attributed to that agent. The
/// operator credential acts on behalf of any agent: orchestrating services
/// commonly log and evaluate actions for agents they audit rather than for
/// themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// A caller acting as a specific agent.
    Agent(AgentId),

    /// The operator/administrator identity.
    Operator,
}

impl Caller {
    /// Convenience constructor for an agent credential.
    pub fn agent(address: impl Into<AgentId>) -> Self {
        Self::Agent(address.into())
    }

    /// Returns true if this caller may write records attributed to `agent`.
    #[must_use]
    pub fn may_act_for(&self, agent: &AgentId) -> bool {
        match self {
            Self::Operator => true,
            Self::Agent(own) => own == agent,
        }
    }

    /// Returns true if this is the operator credential.
    #[must_use]
    pub const fn is_operator(&self) -> bool {
        matches!(self, Self::Operator)
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Agent(id) => write!(f, "agent:{id}"),
            Self::Operator => f.write_str("operator"),
        }
    }
}
