//! Actor identity as supplied by the authentication layer

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role flag carried by an authenticated actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    /// Producer who owns lots, submits sales reports and ships deliveries
    Farmer,
    /// Cooperative or government officer approving reports
    Reviewer,
    /// Buyer company receiving deliveries
    Buyer,
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorRole::Farmer => write!(f, "farmer"),
            ActorRole::Reviewer => write!(f, "reviewer"),
            ActorRole::Buyer => write!(f, "buyer"),
        }
    }
}

/// The caller of a ledger operation. Trusted as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: Uuid, role: ActorRole) -> Self {
        Self { id, role }
    }

    pub fn farmer(id: Uuid) -> Self {
        Self::new(id, ActorRole::Farmer)
    }

    pub fn reviewer(id: Uuid) -> Self {
        Self::new(id, ActorRole::Reviewer)
    }

    pub fn buyer(id: Uuid) -> Self {
        Self::new(id, ActorRole::Buyer)
    }

    pub fn is_farmer(&self) -> bool {
        self.role == ActorRole::Farmer
    }

    pub fn is_reviewer(&self) -> bool {
        self.role == ActorRole::Reviewer
    }

    pub fn is_buyer(&self) -> bool {
        self.role == ActorRole::Buyer
    }
}
