//! The set of currently tracked bodies and their joint trees.
//!
//! The registry exclusively owns all body and joint state. Connection
//! handlers mutate it, the broadcasters read it through [`BodyRegistry::snapshot`],
//! and a coarse `RwLock` keeps the two from observing a torn update.
//! Successful create/remove operations additionally queue a
//! [`PopulationEvent`] on the injected channel so viewers learn about
//! population changes without waiting for the next list tick.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::{RwLock, mpsc};

use posecast_proto::{JointSample, WireF64};

use crate::skeleton::SkeletonVariant;

/// Externally supplied tracking identifier for a body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub String);

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for BodyId {
    fn from(s: &str) -> Self {
        BodyId(s.to_string())
    }
}

/// One joint's current pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joint {
    /// Position (x, y, z).
    pub position: [f64; 3],
    /// Rotation quaternion (x, y, z, w).
    pub rotation: [f64; 4],
    /// True when the last update was interpolated rather than observed.
    pub inferred: bool,
}

impl Default for Joint {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            // Identity quaternion until the first update arrives.
            rotation: [0.0, 0.0, 0.0, 1.0],
            inferred: false,
        }
    }
}

/// A tracked body: a fixed joint set chosen by its skeleton variant.
#[derive(Debug, Clone)]
struct Body {
    variant: SkeletonVariant,
    joints: HashMap<&'static str, Joint>,
}

impl Body {
    fn new(variant: SkeletonVariant) -> Self {
        let joints = variant
            .joint_names()
            .iter()
            .map(|name| (*name, Joint::default()))
            .collect();
        Self { variant, joints }
    }
}

/// Immutable copy of one body, taken under the registry's read lock.
#[derive(Debug, Clone, PartialEq)]
pub struct BodySnapshot {
    /// The body's tracking id.
    pub id: BodyId,
    /// Every joint in template order.
    pub joints: Vec<JointSample>,
}

/// Control-plane notification emitted on successful create/remove.
#[derive(Debug, Clone, PartialEq)]
pub enum PopulationEvent {
    /// A body became trackable.
    Appeared(BodyId),
    /// A body is no longer trackable.
    Removed(BodyId),
}

/// Errors from registry mutations.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RegistryError {
    /// A create named an id that is already live. Callers treat this as a
    /// no-op; the error exists so they can log it.
    #[error("body {id} already exists")]
    AlreadyExists {
        /// The duplicate id.
        id: BodyId,
    },

    /// The named body is not tracked.
    #[error("body {id} not found")]
    NotFound {
        /// The missing id.
        id: BodyId,
    },

    /// An update named a joint outside the body's template.
    #[error("body {id} has no joint `{joint}`")]
    UnknownJoint {
        /// The body being updated.
        id: BodyId,
        /// The unrecognized joint name.
        joint: String,
    },

    /// The configured body cap was reached.
    #[error("body registry at capacity ({max} bodies)")]
    AtCapacity {
        /// The configured maximum.
        max: usize,
    },
}

/// Thread-safe registry of tracked bodies.
pub struct BodyRegistry {
    inner: RwLock<HashMap<BodyId, Body>>,
    max_bodies: usize,
    events: mpsc::UnboundedSender<PopulationEvent>,
}

impl BodyRegistry {
    /// Create an empty registry that emits population events on `events`.
    pub fn new(max_bodies: usize, events: mpsc::UnboundedSender<PopulationEvent>) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            max_bodies,
            events,
        }
    }

    /// Start tracking a body with the given joint template.
    ///
    /// Queues [`PopulationEvent::Appeared`] on success.
    pub async fn create_body(
        &self,
        id: BodyId,
        variant: SkeletonVariant,
    ) -> Result<(), RegistryError> {
        let mut bodies = self.inner.write().await;
        if bodies.contains_key(&id) {
            return Err(RegistryError::AlreadyExists { id });
        }
        if bodies.len() >= self.max_bodies {
            return Err(RegistryError::AtCapacity {
                max: self.max_bodies,
            });
        }
        bodies.insert(id.clone(), Body::new(variant));
        drop(bodies);

        tracing::info!("Tracking body {id} ({variant:?} skeleton)");
        let _ = self.events.send(PopulationEvent::Appeared(id));
        Ok(())
    }

    /// Stop tracking a body.
    ///
    /// Queues [`PopulationEvent::Removed`] on success.
    pub async fn remove_body(&self, id: &BodyId) -> Result<(), RegistryError> {
        let mut bodies = self.inner.write().await;
        if bodies.remove(id).is_none() {
            return Err(RegistryError::NotFound { id: id.clone() });
        }
        drop(bodies);

        tracing::info!("Body {id} left tracking");
        let _ = self.events.send(PopulationEvent::Removed(id.clone()));
        Ok(())
    }

    /// Overwrite one joint's pose in place.
    ///
    /// Joint names outside the body's template are an explicit
    /// [`RegistryError::UnknownJoint`]; the registry is left unchanged.
    pub async fn update_joint(
        &self,
        id: &BodyId,
        joint: &str,
        pos: [f64; 3],
        rot: [f64; 4],
        inferred: bool,
    ) -> Result<(), RegistryError> {
        let mut bodies = self.inner.write().await;
        let body = bodies
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound { id: id.clone() })?;
        let entry = body
            .joints
            .get_mut(joint)
            .ok_or_else(|| RegistryError::UnknownJoint {
                id: id.clone(),
                joint: joint.to_string(),
            })?;
        *entry = Joint {
            position: pos,
            rotation: rot,
            inferred,
        };
        Ok(())
    }

    /// Deep-copy every body, sorted by id with joints in template order.
    ///
    /// The copy is taken under the read lock; serialization happens after
    /// release, so a slow client write never blocks the handlers.
    pub async fn snapshot(&self) -> Vec<BodySnapshot> {
        let bodies = self.inner.read().await;
        let mut snaps: Vec<BodySnapshot> = bodies
            .iter()
            .map(|(id, body)| BodySnapshot {
                id: id.clone(),
                joints: body
                    .variant
                    .joint_names()
                    .iter()
                    .map(|name| {
                        let joint = &body.joints[name];
                        JointSample {
                            joint: name.to_string(),
                            pos: joint.position.map(WireF64::from),
                            rot: joint.rotation.map(WireF64::from),
                            inferred: joint.inferred,
                        }
                    })
                    .collect(),
            })
            .collect();
        drop(bodies);

        snaps.sort_by(|a, b| a.id.cmp(&b.id));
        snaps
    }

    /// Sorted ids of every live body.
    pub async fn population(&self) -> Vec<BodyId> {
        let bodies = self.inner.read().await;
        let mut ids: Vec<BodyId> = bodies.keys().cloned().collect();
        drop(bodies);
        ids.sort();
        ids
    }

    /// Number of live bodies.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether no bodies are tracked.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(max: usize) -> (BodyRegistry, mpsc::UnboundedReceiver<PopulationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (BodyRegistry::new(max, tx), rx)
    }

    #[tokio::test]
    async fn test_create_then_remove_lifecycle() {
        let (reg, mut events) = registry(16);
        let id = BodyId::from("42");

        reg.create_body(id.clone(), SkeletonVariant::Full)
            .await
            .unwrap();
        assert_eq!(reg.len().await, 1);
        assert_eq!(events.recv().await, Some(PopulationEvent::Appeared(id.clone())));

        reg.remove_body(&id).await.unwrap();
        assert!(reg.is_empty().await);
        assert!(reg.snapshot().await.is_empty());
        assert_eq!(events.recv().await, Some(PopulationEvent::Removed(id)));
    }

    #[tokio::test]
    async fn test_duplicate_create_is_single_body() {
        let (reg, _events) = registry(16);
        let id = BodyId::from("42");

        reg.create_body(id.clone(), SkeletonVariant::Full)
            .await
            .unwrap();
        let err = reg
            .create_body(id.clone(), SkeletonVariant::Full)
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::AlreadyExists { id });
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn test_joint_set_matches_template() {
        let (reg, _events) = registry(16);
        reg.create_body(BodyId::from("42"), SkeletonVariant::Full)
            .await
            .unwrap();
        reg.create_body(BodyId::from("3"), SkeletonVariant::Legacy)
            .await
            .unwrap();

        let snaps = reg.snapshot().await;
        assert_eq!(snaps.len(), 2);
        // Sorted by id: "3" before "42".
        assert_eq!(snaps[0].id, BodyId::from("3"));
        assert_eq!(snaps[0].joints.len(), 20);
        assert_eq!(snaps[1].joints.len(), 25);
        assert_eq!(snaps[1].joints[3].joint, "Head");
    }

    #[tokio::test]
    async fn test_update_joint_stores_exact_fields() {
        let (reg, _events) = registry(16);
        let id = BodyId::from("42");
        reg.create_body(id.clone(), SkeletonVariant::Full)
            .await
            .unwrap();

        reg.update_joint(&id, "Head", [1.0, 2.0, 3.0], [0.0, 0.0, 0.0, 1.0], false)
            .await
            .unwrap();

        let snaps = reg.snapshot().await;
        let head = snaps[0]
            .joints
            .iter()
            .find(|j| j.joint == "Head")
            .unwrap();
        assert_eq!(head.pos, [1.0, 2.0, 3.0]);
        assert_eq!(head.rot, [0.0, 0.0, 0.0, 1.0]);
        assert!(!head.inferred);
    }

    #[tokio::test]
    async fn test_unknown_joint_is_explicit_error_and_leaves_state() {
        let (reg, _events) = registry(16);
        let id = BodyId::from("42");
        reg.create_body(id.clone(), SkeletonVariant::Full)
            .await
            .unwrap();
        let before = reg.snapshot().await;

        let err = reg
            .update_joint(&id, "Tail", [1.0; 3], [0.0, 0.0, 0.0, 1.0], true)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownJoint { .. }));
        assert_eq!(reg.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_update_unknown_body_is_not_found() {
        let (reg, _events) = registry(16);
        let err = reg
            .update_joint(
                &BodyId::from("9"),
                "0",
                [0.0; 3],
                [0.0, 0.0, 0.0, 1.0],
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_legacy_joint_keys_update() {
        let (reg, _events) = registry(16);
        let id = BodyId::from("3");
        reg.create_body(id.clone(), SkeletonVariant::Legacy)
            .await
            .unwrap();
        reg.update_joint(&id, "19", [0.5; 3], [0.0, 0.0, 0.0, 1.0], true)
            .await
            .unwrap();
        // "20" is outside the legacy template.
        let err = reg
            .update_joint(&id, "20", [0.5; 3], [0.0, 0.0, 0.0, 1.0], true)
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownJoint { .. }));
    }

    #[tokio::test]
    async fn test_body_cap_enforced() {
        let (reg, _events) = registry(1);
        reg.create_body(BodyId::from("42"), SkeletonVariant::Full)
            .await
            .unwrap();
        let err = reg
            .create_body(BodyId::from("43"), SkeletonVariant::Full)
            .await
            .unwrap_err();
        assert_eq!(err, RegistryError::AtCapacity { max: 1 });
    }

    #[tokio::test]
    async fn test_population_is_sorted() {
        let (reg, _events) = registry(16);
        for id in ["beta", "alpha", "gamma"] {
            reg.create_body(BodyId::from(id), SkeletonVariant::Full)
                .await
                .unwrap();
        }
        let pop = reg.population().await;
        let ids: Vec<&str> = pop.iter().map(|id| id.0.as_str()).collect();
        assert_eq!(ids, ["alpha", "beta", "gamma"]);
    }

    #[tokio::test]
    async fn test_remove_missing_body_is_not_found() {
        let (reg, _events) = registry(16);
        let err = reg.remove_body(&BodyId::from("42")).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }
}
