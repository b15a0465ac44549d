//! Per-session axis remapping table for sensors without a fixed mounting

use crate::error::{GaitError, GaitResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Sensor axis label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(&self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn label(&self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
        }
    }
}

impl FromStr for Axis {
    type Err = GaitError;

    /// Accepts a bare axis letter or a column name ending in one
    /// (e.g. "Wide Range Accelerometer Z").
    fn from_str(s: &str) -> GaitResult<Self> {
        match s.trim().chars().last().map(|c| c.to_ascii_uppercase()) {
            Some('X') => Ok(Axis::X),
            Some('Y') => Ok(Axis::Y),
            Some('Z') => Ok(Axis::Z),
            _ => Err(GaitError::InvalidAxisMap {
                reason: format!("'{}' does not name an axis", s),
            }),
        }
    }
}

/// One row of an axis map: target axis sourced from a signed original axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisMapEntry {
    pub target: Axis,
    pub source: Axis,
    /// +1.0 or -1.0
    pub sign: f64,
}

/// Complete per-session axis remapping for a sensor without fixed mounting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisMap {
    entries: [AxisMapEntry; 3],
}

impl AxisMap {
    /// Build from rows of `(target, source, sign)`. Every target axis must
    /// appear exactly once.
    pub fn new(rows: &[AxisMapEntry]) -> GaitResult<Self> {
        let mut slots: [Option<AxisMapEntry>; 3] = [None; 3];
        for row in rows {
            if row.sign != 1.0 && row.sign != -1.0 {
                return Err(GaitError::InvalidAxisMap {
                    reason: format!("sign for {} must be +1 or -1, got {}", row.target.label(), row.sign),
                });
            }
            let slot = &mut slots[row.target.index()];
            if slot.is_some() {
                return Err(GaitError::InvalidAxisMap {
                    reason: format!("target axis {} listed twice", row.target.label()),
                });
            }
            *slot = Some(*row);
        }

        let mut entries = [AxisMapEntry { target: Axis::X, source: Axis::X, sign: 1.0 }; 3];
        for axis in Axis::ALL {
            entries[axis.index()] = slots[axis.index()]
                .ok_or(GaitError::MissingAxisMapEntry { axis: axis.label() })?;
        }

        Ok(AxisMap { entries })
    }

    /// Parse textual rows `axis, orig_axis_label, sign_modifier`
    pub fn from_text_rows<'a, I>(rows: I) -> GaitResult<Self>
    where
        I: IntoIterator<Item = [&'a str; 3]>,
    {
        let parsed = rows
            .into_iter()
            .map(|[target, source, sign]| -> GaitResult<AxisMapEntry> {
                let sign: f64 = sign.trim().parse().map_err(|_| GaitError::InvalidAxisMap {
                    reason: format!("sign modifier '{}' is not a number", sign.trim()),
                })?;
                Ok(AxisMapEntry {
                    target: target.parse()?,
                    source: source.parse()?,
                    sign,
                })
            })
            .collect::<GaitResult<Vec<_>>>()?;

        Self::new(&parsed)
    }

    pub fn entries(&self) -> &[AxisMapEntry; 3] {
        &self.entries
    }

    pub fn entry(&self, target: Axis) -> &AxisMapEntry {
        &self.entries[target.index()]
    }
}
