//! # Friendship edges
//!
//! A directed edge between two users. The stored record keeps the direction
//! (who asked whom) while uniqueness is defined over the unordered pair.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendshipStatus {
    Pending,
    Accepted,
    Declined,
    /// Terminal. Only removable through an explicit unblock.
    Blocked,
}

impl FriendshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendshipStatus::Pending => "pending",
            FriendshipStatus::Accepted => "accepted",
            FriendshipStatus::Declined => "declined",
            FriendshipStatus::Blocked => "blocked",
        }
    }
}

impl fmt::Display for FriendshipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown friendship status {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for FriendshipStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(FriendshipStatus::Pending),
            "accepted" => Ok(FriendshipStatus::Accepted),
            "declined" => Ok(FriendshipStatus::Declined),
            "blocked" => Ok(FriendshipStatus::Blocked),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Rejected status change.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot move friendship from {from} to {to}")]
pub struct InvalidTransition {
    pub from: FriendshipStatus,
    pub to: FriendshipStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Friendship {
    pub requester_id: Uuid,
    pub addressee_id: Uuid,
    pub status: FriendshipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Normalized key for the unordered pair {a, b}.
pub fn pair_key(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Friendship {
    /// A fresh request from `requester` to `addressee`.
    pub fn request(requester_id: Uuid, addressee_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            requester_id,
            addressee_id,
            status: FriendshipStatus::Pending,
            created_at: now,
            updated_at: None,
        }
    }

    /// A block placed by `user_id` on `blocked_id`.
    pub fn block(user_id: Uuid, blocked_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            requester_id: user_id,
            addressee_id: blocked_id,
            status: FriendshipStatus::Blocked,
            created_at: now,
            updated_at: None,
        }
    }

    pub fn pair_key(&self) -> (Uuid, Uuid) {
        pair_key(self.requester_id, self.addressee_id)
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.requester_id == user_id || self.addressee_id == user_id
    }

    /// The side of the edge that is not `user_id`, or `None` when `user_id`
    /// is not on this edge at all.
    pub fn other_party(&self, user_id: Uuid) -> Option<Uuid> {
        if self.requester_id == user_id {
            Some(self.addressee_id)
        } else if self.addressee_id == user_id {
            Some(self.requester_id)
        } else {
            None
        }
    }

    pub fn accept(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.resolve(FriendshipStatus::Accepted, now)
    }

    pub fn decline(&mut self, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.resolve(FriendshipStatus::Declined, now)
    }

    // Accepted and Declined are only reachable from Pending.
    fn resolve(&mut self, to: FriendshipStatus, now: DateTime<Utc>) -> Result<(), InvalidTransition> {
        if self.status != FriendshipStatus::Pending {
            return Err(InvalidTransition { from: self.status, to });
        }
        self.status = to;
        self.updated_at = Some(now);
        Ok(())
    }
}

/// Outward representation of an edge with both usernames resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendshipView {
    pub requester_id: Uuid,
    pub requester_name: String,
    pub addressee_id: Uuid,
    pub addressee_name: String,
    pub status: FriendshipStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge() -> Friendship {
        Friendship::request(Uuid::now_v7(), Uuid::now_v7(), Utc::now())
    }

    #[test]
    fn pending_edge_accepts_once() {
        let mut f = edge();
        let later = f.created_at + chrono::Duration::seconds(5);
        f.accept(later).unwrap();
        assert_eq!(f.status, FriendshipStatus::Accepted);
        assert_eq!(f.updated_at, Some(later));

        let err = f.decline(Utc::now()).unwrap_err();
        assert_eq!(err.from, FriendshipStatus::Accepted);
        assert_eq!(err.to, FriendshipStatus::Declined);
    }

    #[test]
    fn blocked_edge_is_terminal() {
        let mut f = Friendship::block(Uuid::now_v7(), Uuid::now_v7(), Utc::now());
        assert!(f.accept(Utc::now()).is_err());
        assert!(f.decline(Utc::now()).is_err());
        assert_eq!(f.status, FriendshipStatus::Blocked);
    }

    #[test]
    fn other_party_picks_the_opposite_side() {
        let f = edge();
        assert_eq!(f.other_party(f.requester_id), Some(f.addressee_id));
        assert_eq!(f.other_party(f.addressee_id), Some(f.requester_id));
        assert_eq!(f.other_party(Uuid::now_v7()), None);
    }

    #[test]
    fn pair_key_ignores_direction() {
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        assert_eq!(pair_key(a, b), pair_key(b, a));
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Blocked".parse::<FriendshipStatus>(), Ok(FriendshipStatus::Blocked));
        assert!("friends".parse::<FriendshipStatus>().is_err());
    }
}
