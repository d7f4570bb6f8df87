//! Wire protocol for the posecast body-pose relay.
//!
//! The transport is a plain TCP byte stream carrying a `*`-delimited text
//! protocol: every logical message is wrapped in a leading and trailing `*`,
//! and fields within a message are comma-separated with the command tag
//! first. The format is shared with the motion-capture front-ends and
//! viewer clients, so it is preserved byte-for-byte here; internally every
//! message is decoded into a typed [`Frame`] at this boundary and the rest
//! of the relay never touches raw field strings.
//!
//! Module overview:
//! - `frame.rs`: the [`Frame`] enum, per-tag field layouts, [`encode`] and
//!   [`parse_unit`].
//! - `codec.rs`: [`Decoder`], the stateful re-framer that turns arbitrary
//!   read chunks into a sequence of parse results.

pub mod codec;
pub mod frame;

pub use codec::{Decoder, MAX_PENDING_BYTES};
pub use frame::{DecodeError, Frame, JointSample, WireF64, encode, parse_unit};
