//! Process-wide registry of each connected user's last-reported location.
//!
//! One entry per identity, overwritten on every ping. Reads take a snapshot
//! under a shared lock so scans never hold up writers for longer than the
//! copy. Entries are never evicted; they live for the life of the process.

use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::geo::{self, GeoPoint};

/// A user identity with a currently-known last-reported position.
#[derive(Debug, Clone, Copy)]
pub struct TrackedUser {
    pub location: GeoPoint,
    pub updated_at: NaiveDateTime,
}

#[derive(Default)]
pub struct LocationRegistry {
    active_users: RwLock<HashMap<String, TrackedUser>>,
}

impl LocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `identity`'s latest position, replacing any previous entry.
    pub fn update(&self, identity: &str, location: GeoPoint) {
        let entry = TrackedUser {
            location,
            updated_at: chrono::Utc::now().naive_utc(),
        };
        self.active_users
            .write()
            .expect("location registry lock poisoned")
            .insert(identity.to_string(), entry);
    }

    /// Every tracked identity within `radius_km` of `center`.
    pub fn nearby(&self, center: GeoPoint, radius_km: f64) -> HashSet<String> {
        let snapshot = self
            .active_users
            .read()
            .expect("location registry lock poisoned");
        geo::find_nearby(
            snapshot.iter().map(|(id, user)| (id.as_str(), user.location)),
            center,
            radius_km,
        )
    }

    pub fn tracked_count(&self) -> usize {
        self.active_users
            .read()
            .expect("location registry lock poisoned")
            .len()
    }

    pub fn last_location(&self, identity: &str) -> Option<GeoPoint> {
        self.active_users
            .read()
            .expect("location registry lock poisoned")
            .get(identity)
            .map(|user| user.location)
    }
}
