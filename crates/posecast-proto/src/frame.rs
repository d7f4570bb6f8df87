//! Typed message frames and their text encoding.
//!
//! Tag set, matching the field layouts the sensor hosts and viewers speak:
//!
//! | tag     | direction      | fields                                   |
//! |---------|----------------|------------------------------------------|
//! | `login` | client→server  | display name                             |
//! | `cbody` | sensor→server  | body id                                  |
//! | `dbody` | sensor→server  | body id                                  |
//! | `ubody` | sensor→server  | body id, joint, pos×3, rot×4, inferred   |
//! | `1`     | server→client  | body id (appeared)                       |
//! | `0`     | server→client  | body id (disappeared)                    |
//! | `2`     | server→client  | body id, then 9-field joint groups       |
//! | `6`     | server→client  | live body ids                            |
//!
//! Booleans travel as `1`/`0`. Float fields decode to [`WireF64`], which
//! keeps the original field text next to the parsed value, so
//! `encode(parse_unit(s)?)` reproduces `*s*` byte for byte for every
//! well-formed unit regardless of how the sender spelled its numbers.

use std::fmt::{self, Write as _};

/// Errors produced while decoding a single delimited unit.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DecodeError {
    /// The unit contained no fields at all.
    #[error("empty unit")]
    EmptyUnit,

    /// The command tag is not part of the protocol.
    #[error("unknown tag `{tag}`")]
    UnknownTag {
        /// The tag as received.
        tag: String,
    },

    /// The field count does not match the tag's layout.
    #[error("tag `{tag}` expects {expected} fields, got {got}")]
    WrongArity {
        /// The command tag.
        tag: &'static str,
        /// Human-readable expected field count (e.g. `"10"` or `"1 + 9n"`).
        expected: &'static str,
        /// Fields actually present after the tag.
        got: usize,
    },

    /// A field that must be a float did not parse.
    #[error("bad number `{value}`")]
    BadNumber {
        /// The offending field text.
        value: String,
    },

    /// The inferred flag was something other than `1` or `0`.
    #[error("bad inferred flag `{value}`")]
    BadFlag {
        /// The offending field text.
        value: String,
    },

    /// The decoder's pending buffer exceeded its cap; buffered bytes were
    /// discarded to bound allocation.
    #[error("pending buffer overflow, {dropped} bytes discarded")]
    Overflow {
        /// Number of buffered bytes that were dropped.
        dropped: usize,
    },
}

/// A float field as it appeared on the wire.
///
/// Decoding stores the original field text next to the parsed value;
/// encoding emits that text unchanged, so `1.0` stays `1.0` and `1e3`
/// stays `1e3`. Values the relay computes itself (via [`From<f64>`])
/// format with Rust's shortest round-trip `Display`.
#[derive(Debug, Clone)]
pub struct WireF64 {
    value: f64,
    text: Box<str>,
}

impl WireF64 {
    /// The parsed numeric value.
    pub fn value(&self) -> f64 {
        self.value
    }

    fn parse(field: &str) -> Result<Self, DecodeError> {
        let value = field.parse().map_err(|_| DecodeError::BadNumber {
            value: field.to_string(),
        })?;
        Ok(Self {
            value,
            text: field.into(),
        })
    }
}

impl From<f64> for WireF64 {
    fn from(value: f64) -> Self {
        Self {
            value,
            text: value.to_string().into(),
        }
    }
}

impl fmt::Display for WireF64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Equality is numeric: two spellings of the same value compare equal.
impl PartialEq for WireF64 {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl PartialEq<f64> for WireF64 {
    fn eq(&self, other: &f64) -> bool {
        self.value == *other
    }
}

/// One joint's pose within a [`Frame::Pose`] broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct JointSample {
    /// Joint name: anatomical for full skeletons, `"0"`..`"19"` for legacy.
    pub joint: String,
    /// Position (x, y, z).
    pub pos: [WireF64; 3],
    /// Rotation quaternion (x, y, z, w).
    pub rot: [WireF64; 4],
    /// True when the sensor interpolated this joint rather than observing it.
    pub inferred: bool,
}

/// A decoded protocol message. The enum discriminant is the wire tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `login` — a viewer registers under a display name.
    Login {
        /// Display name supplied by the viewer.
        name: String,
    },
    /// `cbody` — a new body became trackable.
    CreateBody {
        /// Externally supplied tracking id.
        body_id: String,
    },
    /// `dbody` — a body is no longer trackable.
    RemoveBody {
        /// Tracking id of the departed body.
        body_id: String,
    },
    /// `ubody` — one joint's pose update.
    UpdateJoint {
        /// Tracking id of the body being updated.
        body_id: String,
        /// Joint name within the body's template.
        joint: String,
        /// Position (x, y, z).
        pos: [WireF64; 3],
        /// Rotation quaternion (x, y, z, w).
        rot: [WireF64; 4],
        /// True when the joint pose was interpolated.
        inferred: bool,
    },
    /// `1` — population change: a body appeared.
    BodyAppeared {
        /// Tracking id of the new body.
        body_id: String,
    },
    /// `0` — population change: a body disappeared.
    BodyRemoved {
        /// Tracking id of the departed body.
        body_id: String,
    },
    /// `2` — per-tick full pose of one body.
    Pose {
        /// Tracking id of the body.
        body_id: String,
        /// Every joint of the body, in template order.
        joints: Vec<JointSample>,
    },
    /// `6` — full population list (periodic reconciliation).
    Population {
        /// Sorted tracking ids of every live body.
        body_ids: Vec<String>,
    },
}

fn push_flag(out: &mut String, inferred: bool) {
    out.push(if inferred { '1' } else { '0' });
}

fn push_pose_fields(out: &mut String, pos: &[WireF64; 3], rot: &[WireF64; 4], inferred: bool) {
    for v in pos {
        let _ = write!(out, ",{v}");
    }
    for v in rot {
        let _ = write!(out, ",{v}");
    }
    out.push(',');
    push_flag(out, inferred);
}

/// Encode a frame as a complete `*`-wrapped wire unit.
pub fn encode(frame: &Frame) -> String {
    let mut out = String::from("*");
    match frame {
        Frame::Login { name } => {
            let _ = write!(out, "login,{name}");
        }
        Frame::CreateBody { body_id } => {
            let _ = write!(out, "cbody,{body_id}");
        }
        Frame::RemoveBody { body_id } => {
            let _ = write!(out, "dbody,{body_id}");
        }
        Frame::UpdateJoint {
            body_id,
            joint,
            pos,
            rot,
            inferred,
        } => {
            let _ = write!(out, "ubody,{body_id},{joint}");
            push_pose_fields(&mut out, pos, rot, *inferred);
        }
        Frame::BodyAppeared { body_id } => {
            let _ = write!(out, "1,{body_id}");
        }
        Frame::BodyRemoved { body_id } => {
            let _ = write!(out, "0,{body_id}");
        }
        Frame::Pose { body_id, joints } => {
            let _ = write!(out, "2,{body_id}");
            for j in joints {
                let _ = write!(out, ",{}", j.joint);
                push_pose_fields(&mut out, &j.pos, &j.rot, j.inferred);
            }
        }
        Frame::Population { body_ids } => {
            out.push('6');
            for id in body_ids {
                let _ = write!(out, ",{id}");
            }
        }
    }
    out.push('*');
    out
}

fn parse_flag(field: &str) -> Result<bool, DecodeError> {
    match field {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(DecodeError::BadFlag {
            value: other.to_string(),
        }),
    }
}

/// Parse the 9 fields of one joint group: name, pos×3, rot×4, inferred.
fn parse_joint_group(fields: &[&str]) -> Result<JointSample, DecodeError> {
    debug_assert_eq!(fields.len(), 9);
    Ok(JointSample {
        joint: fields[0].to_string(),
        pos: [
            WireF64::parse(fields[1])?,
            WireF64::parse(fields[2])?,
            WireF64::parse(fields[3])?,
        ],
        rot: [
            WireF64::parse(fields[4])?,
            WireF64::parse(fields[5])?,
            WireF64::parse(fields[6])?,
            WireF64::parse(fields[7])?,
        ],
        inferred: parse_flag(fields[8])?,
    })
}

fn expect_arity(
    tag: &'static str,
    expected: &'static str,
    want: usize,
    args: &[&str],
) -> Result<(), DecodeError> {
    if args.len() == want {
        Ok(())
    } else {
        Err(DecodeError::WrongArity {
            tag,
            expected,
            got: args.len(),
        })
    }
}

/// Parse one delimited unit (the text between two `*` sentinels, with the
/// sentinels already stripped) into a [`Frame`].
pub fn parse_unit(unit: &str) -> Result<Frame, DecodeError> {
    let mut fields = unit.split(',');
    let tag = fields.next().unwrap_or("");
    if tag.is_empty() && unit.is_empty() {
        return Err(DecodeError::EmptyUnit);
    }
    let args: Vec<&str> = fields.collect();

    match tag {
        "login" => {
            expect_arity("login", "1", 1, &args)?;
            Ok(Frame::Login {
                name: args[0].to_string(),
            })
        }
        "cbody" => {
            expect_arity("cbody", "1", 1, &args)?;
            Ok(Frame::CreateBody {
                body_id: args[0].to_string(),
            })
        }
        "dbody" => {
            expect_arity("dbody", "1", 1, &args)?;
            Ok(Frame::RemoveBody {
                body_id: args[0].to_string(),
            })
        }
        "ubody" => {
            expect_arity("ubody", "10", 10, &args)?;
            let group = parse_joint_group(&args[1..10])?;
            Ok(Frame::UpdateJoint {
                body_id: args[0].to_string(),
                joint: group.joint,
                pos: group.pos,
                rot: group.rot,
                inferred: group.inferred,
            })
        }
        "1" => {
            expect_arity("1", "1", 1, &args)?;
            Ok(Frame::BodyAppeared {
                body_id: args[0].to_string(),
            })
        }
        "0" => {
            expect_arity("0", "1", 1, &args)?;
            Ok(Frame::BodyRemoved {
                body_id: args[0].to_string(),
            })
        }
        "2" => {
            // 1 body id plus one or more 9-field joint groups.
            if args.is_empty() || (args.len() - 1) % 9 != 0 || args.len() == 1 {
                return Err(DecodeError::WrongArity {
                    tag: "2",
                    expected: "1 + 9n (n >= 1)",
                    got: args.len(),
                });
            }
            let body_id = args[0].to_string();
            let joints = args[1..]
                .chunks(9)
                .map(parse_joint_group)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Frame::Pose { body_id, joints })
        }
        "6" => Ok(Frame::Population {
            body_ids: args.iter().map(|s| s.to_string()).collect(),
        }),
        other => Err(DecodeError::UnknownTag {
            tag: other.to_string(),
        }),
    }
}
