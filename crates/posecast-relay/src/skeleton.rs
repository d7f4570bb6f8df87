//! Joint templates for the two supported skeleton shapes.
//!
//! A body's joint set is fixed at creation: 25 anatomically named joints
//! for modern depth sensors, or 20 numerically indexed joints for legacy
//! hardware. Update frames naming a joint outside the template are
//! rejected by the registry, never stored.

/// Joint names of the 25-joint full skeleton, in broadcast order.
pub const FULL_JOINTS: [&str; 25] = [
    "SpineBase",
    "SpineMid",
    "Neck",
    "Head",
    "ShoulderLeft",
    "ElbowLeft",
    "WristLeft",
    "HandLeft",
    "ShoulderRight",
    "ElbowRight",
    "WristRight",
    "HandRight",
    "HipLeft",
    "KneeLeft",
    "AnkleLeft",
    "FootLeft",
    "HipRight",
    "KneeRight",
    "AnkleRight",
    "FootRight",
    "SpineShoulder",
    "HandTipLeft",
    "ThumbLeft",
    "HandTipRight",
    "ThumbRight",
];

/// Joint keys of the 20-joint legacy skeleton, in broadcast order.
pub const LEGACY_JOINTS: [&str; 20] = [
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12", "13", "14", "15", "16",
    "17", "18", "19",
];

/// Which joint template a body was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkeletonVariant {
    /// 25 named joints (modern depth sensor).
    Full,
    /// 20 numerically indexed joints (legacy hardware).
    Legacy,
}

impl SkeletonVariant {
    /// The template's joint names, in broadcast order.
    pub fn joint_names(self) -> &'static [&'static str] {
        match self {
            SkeletonVariant::Full => &FULL_JOINTS,
            SkeletonVariant::Legacy => &LEGACY_JOINTS,
        }
    }

    /// Number of joints in the template.
    pub fn joint_count(self) -> usize {
        self.joint_names().len()
    }

    /// Wire-compat heuristic: legacy sensor hosts send a single-digit body
    /// index, modern ones a 64-bit tracking id. This is the only place the
    /// id's shape is inspected; the registry itself takes the variant
    /// explicitly.
    pub fn for_tracking_id(id: &str) -> Self {
        if id.len() > 1 {
            SkeletonVariant::Full
        } else {
            SkeletonVariant::Legacy
        }
    }
}
