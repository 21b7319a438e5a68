//! Per-element machining parameters with inherit-by-sentinel semantics.

use serde::{Deserialize, Serialize};

/// Sentinel for "inherit from parent" on integer fields.
pub const INHERIT_PASSES: i32 = -1;

/// Engraving parameters carried by every element.
///
/// Each numeric field uses a sentinel (`NaN` for floats, `-1` for the pass
/// count) meaning "inherit from parent". The effective value of any element
/// is computed by walking from the document root down to the element, every
/// non-sentinel field overriding the inherited one. `all_at_once` combines by
/// logical OR along the same walk (the element `enabled` flag, which lives on
/// [`crate::model::Element`], combines by AND).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EngravingProperties {
    /// Feed rate in mm/min. `NaN` inherits.
    #[serde(with = "nan_as_null")]
    pub feed_rate: f64,
    /// Laser power (device units, typically 0-255). `NaN` inherits.
    #[serde(with = "nan_as_null")]
    pub power: f64,
    /// Number of passes. `-1` inherits.
    pub passes: i32,
    /// Z at the first pass. `NaN` inherits.
    #[serde(with = "nan_as_null")]
    pub z_start: f64,
    /// Z at the last pass. `NaN` inherits.
    #[serde(with = "nan_as_null")]
    pub z_end: f64,
    /// Z step per pass. `NaN` inherits.
    #[serde(with = "nan_as_null")]
    pub pass_depth: f64,
    /// Cut every ring of a pocket at each depth before stepping down.
    pub all_at_once: bool,
}

/// The `NaN` inherit sentinel crosses the wire as `null`.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_nan() {
            serializer.serialize_none()
        } else {
            serializer.serialize_some(value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

/// `NaN` sentinels compare equal to each other, so snapshots of a document
/// whose elements inherit still compare equal.
impl PartialEq for EngravingProperties {
    fn eq(&self, other: &Self) -> bool {
        let same = |a: f64, b: f64| a == b || (a.is_nan() && b.is_nan());
        same(self.feed_rate, other.feed_rate)
            && same(self.power, other.power)
            && self.passes == other.passes
            && same(self.z_start, other.z_start)
            && same(self.z_end, other.z_end)
            && same(self.pass_depth, other.pass_depth)
            && self.all_at_once == other.all_at_once
    }
}

impl Default for EngravingProperties {
    /// All fields inherit.
    fn default() -> Self {
        Self {
            feed_rate: f64::NAN,
            power: f64::NAN,
            passes: INHERIT_PASSES,
            z_start: f64::NAN,
            z_end: f64::NAN,
            pass_depth: f64::NAN,
            all_at_once: false,
        }
    }
}

impl EngravingProperties {
    /// Fully specified defaults used at the document root, so every
    /// effective-property walk terminates with concrete values.
    pub fn root_defaults() -> Self {
        Self {
            feed_rate: 1000.0,
            power: 255.0,
            passes: 1,
            z_start: 0.0,
            z_end: 0.0,
            pass_depth: 0.0,
            all_at_once: false,
        }
    }

    /// Applies this record on top of inherited values, returning the merged
    /// result. Sentinel fields keep the inherited value.
    pub fn resolve_over(&self, inherited: &EngravingProperties) -> EngravingProperties {
        EngravingProperties {
            feed_rate: if self.feed_rate.is_nan() {
                inherited.feed_rate
            } else {
                self.feed_rate
            },
            power: if self.power.is_nan() {
                inherited.power
            } else {
                self.power
            },
            passes: if self.passes == INHERIT_PASSES {
                inherited.passes
            } else {
                self.passes
            },
            z_start: if self.z_start.is_nan() {
                inherited.z_start
            } else {
                self.z_start
            },
            z_end: if self.z_end.is_nan() {
                inherited.z_end
            } else {
                self.z_end
            },
            pass_depth: if self.pass_depth.is_nan() {
                inherited.pass_depth
            } else {
                self.pass_depth
            },
            all_at_once: self.all_at_once || inherited.all_at_once,
        }
    }

    /// True when every field is the inherit sentinel.
    pub fn inherits_everything(&self) -> bool {
        self.feed_rate.is_nan()
            && self.power.is_nan()
            && self.passes == INHERIT_PASSES
            && self.z_start.is_nan()
            && self.z_end.is_nan()
            && self.pass_depth.is_nan()
            && !self.all_at_once
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_inherits_everything() {
        assert!(EngravingProperties::default().inherits_everything());
    }

    #[test]
    fn resolve_overrides_only_set_fields() {
        let root = EngravingProperties::root_defaults();
        let child = EngravingProperties {
            power: 100.0,
            passes: 3,
            ..Default::default()
        };
        let eff = child.resolve_over(&root);
        assert_eq!(eff.power, 100.0);
        assert_eq!(eff.passes, 3);
        assert_eq!(eff.feed_rate, 1000.0);
        assert_eq!(eff.z_start, 0.0);
    }

    #[test]
    fn records_with_inherit_sentinels_compare_equal() {
        assert_eq!(EngravingProperties::default(), EngravingProperties::default());
        let set = EngravingProperties {
            power: 200.0,
            ..Default::default()
        };
        assert_ne!(set, EngravingProperties::default());
    }

    #[test]
    fn inherit_sentinels_round_trip_through_json() {
        let props = EngravingProperties {
            power: 128.0,
            ..Default::default()
        };
        let json = serde_json::to_string(&props).unwrap();
        let restored: EngravingProperties = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, props);
        assert!(restored.feed_rate.is_nan());
        assert_eq!(restored.power, 128.0);
    }

    #[test]
    fn all_at_once_combines_by_or() {
        let parent = EngravingProperties {
            all_at_once: true,
            ..EngravingProperties::root_defaults()
        };
        let child = EngravingProperties::default();
        assert!(child.resolve_over(&parent).all_at_once);
    }
}
