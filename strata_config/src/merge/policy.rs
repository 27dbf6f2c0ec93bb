//! Merge policy: rule attributes, weight maps and priority solving.
//!
//! A rule is described by three booleans. A weight map assigns each
//! attribute a weight for its `false` side and one for its `true` side;
//! a combination's weight is the sum of the three selected values, and a
//! strictly greater weight wins. Users express intent as a total order
//! over attribute combinations; the registry derives a weight map whose
//! induced weights strictly decrease along that order.

use crate::error::StrataError;
use crate::result_ext::StrataResultExt;
use crate::StrataResult;

/// The three boolean attributes that influence rule priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuleAttrs {
    /// The rule is scoped at container level rather than item level.
    pub container_scoped: bool,
    /// The rule propagates to siblings instead of firing once.
    pub propagates: bool,
    /// The rule was declared statically in a schema rather than inline.
    pub from_schema: bool,
}

impl RuleAttrs {
    /// Build a combination from its three attributes.
    #[must_use]
    pub const fn new(container_scoped: bool, propagates: bool, from_schema: bool) -> Self {
        Self {
            container_scoped,
            propagates,
            from_schema,
        }
    }

    /// Build a combination from a three-digit binary mask, most
    /// significant attribute first: `"110"` means container-scoped and
    /// propagating but not schema-declared. Returns `None` for anything
    /// but three binary digits.
    #[must_use]
    pub fn from_mask(mask: &str) -> Option<Self> {
        let digits: Vec<bool> = mask
            .chars()
            .map(|c| match c {
                '1' => Some(true),
                '0' => Some(false),
                _ => None,
            })
            .collect::<Option<_>>()?;
        match digits.as_slice() {
            [container_scoped, propagates, from_schema] => {
                Some(Self::new(*container_scoped, *propagates, *from_schema))
            }
            _ => None,
        }
    }

    /// The combination's weight under `map`.
    #[must_use]
    pub const fn weight(&self, map: &RuleWeightMap) -> u32 {
        map.container_scoped.select(self.container_scoped)
            + map.propagates.select(self.propagates)
            + map.from_schema.select(self.from_schema)
    }
}

/// Weight pair for one attribute: one value for each side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrWeight {
    /// Weight contributed when the attribute is `false`.
    pub when_false: u32,
    /// Weight contributed when the attribute is `true`.
    pub when_true: u32,
}

impl AttrWeight {
    /// Build a weight pair.
    #[must_use]
    pub const fn new(when_false: u32, when_true: u32) -> Self {
        Self {
            when_false,
            when_true,
        }
    }

    const fn select(self, attribute: bool) -> u32 {
        if attribute { self.when_true } else { self.when_false }
    }
}

/// The weights used to decide which rule wins over another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleWeightMap {
    /// Weights for the container-scoped attribute.
    pub container_scoped: AttrWeight,
    /// Weights for the propagates attribute.
    pub propagates: AttrWeight,
    /// Weights for the from-schema attribute.
    pub from_schema: AttrWeight,
}

impl Default for RuleWeightMap {
    /// The stock map: container-scoped outweighs propagates outweighs
    /// from-schema, with both sides of each attribute weighted equally so
    /// every combination ties and resolution falls back to candidate
    /// precedence.
    fn default() -> Self {
        Self {
            container_scoped: AttrWeight::new(10, 10),
            propagates: AttrWeight::new(4, 4),
            from_schema: AttrWeight::new(1, 1),
        }
    }
}

/// Bound on candidate assignments examined while solving an ordering.
const ATTEMPT_LIMIT: u32 = 5_000;

/// Per-attribute delta magnitude scanned by the solver.
const DELTA_RANGE: i32 = 8;

/// Holds the active weight map and derives new ones from priority
/// orderings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePolicyRegistry {
    weight_map: RuleWeightMap,
}

impl MergePolicyRegistry {
    /// A registry carrying the default weight map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The active weight map.
    #[must_use]
    pub const fn weight_map(&self) -> &RuleWeightMap {
        &self.weight_map
    }

    /// Derive and install a weight map consistent with
    /// `priority_ordering`, listed from highest to lowest priority.
    ///
    /// The search is deterministic: the same ordering always produces the
    /// same map. Only the per-attribute difference between the `true` and
    /// `false` weights can affect relative order, so the solver scans that
    /// reduced space and converts the first satisfying deltas into a
    /// non-negative weight map.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::UnsatisfiablePolicy`] when no additive
    /// weight map realises the ordering within the attempt cap.
    pub fn update(&mut self, priority_ordering: &[RuleAttrs]) -> StrataResult<()> {
        self.weight_map = solve_weight_map(priority_ordering)?;
        Ok(())
    }
}

fn solve_weight_map(priority_ordering: &[RuleAttrs]) -> StrataResult<RuleWeightMap> {
    if priority_ordering.len() < 2 {
        return Ok(RuleWeightMap::default());
    }

    let mut attempts: u32 = 0;
    for scoped_delta in -DELTA_RANGE..=DELTA_RANGE {
        for propagates_delta in -DELTA_RANGE..=DELTA_RANGE {
            for schema_delta in -DELTA_RANGE..=DELTA_RANGE {
                if attempts >= ATTEMPT_LIMIT {
                    return Err(StrataError::UnsatisfiablePolicy { attempts }).arc_err();
                }
                attempts += 1;
                let candidate = RuleWeightMap {
                    container_scoped: delta_weight(scoped_delta),
                    propagates: delta_weight(propagates_delta),
                    from_schema: delta_weight(schema_delta),
                };
                if strictly_decreasing(priority_ordering, &candidate) {
                    return Ok(candidate);
                }
            }
        }
    }
    Err(StrataError::UnsatisfiablePolicy { attempts }).arc_err()
}

const fn delta_weight(delta: i32) -> AttrWeight {
    if delta >= 0 {
        AttrWeight::new(0, delta.unsigned_abs())
    } else {
        AttrWeight::new(delta.unsigned_abs(), 0)
    }
}

fn strictly_decreasing(ordering: &[RuleAttrs], map: &RuleWeightMap) -> bool {
    ordering
        .windows(2)
        .all(|pair| pair[0].weight(map) > pair[1].weight(map))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{MergePolicyRegistry, RuleAttrs, RuleWeightMap};
    use crate::error::StrataError;

    fn count_down_ordering() -> Vec<RuleAttrs> {
        // 111 > 110 > 101 > 100 > 011 > 010 > 001 > 000
        (0..8u8)
            .rev()
            .map(|bits| {
                RuleAttrs::new(bits & 0b100 != 0, bits & 0b010 != 0, bits & 0b001 != 0)
            })
            .collect()
    }

    #[rstest]
    #[case::all_set("111", RuleAttrs::new(true, true, true))]
    #[case::none_set("000", RuleAttrs::new(false, false, false))]
    #[case::mixed("110", RuleAttrs::new(true, true, false))]
    fn masks_parse_positionally(#[case] mask: &str, #[case] expected: RuleAttrs) {
        assert_eq!(RuleAttrs::from_mask(mask), Some(expected));
    }

    #[rstest]
    #[case::short("11")]
    #[case::long("1111")]
    #[case::junk("1a0")]
    fn bad_masks_are_rejected(#[case] mask: &str) {
        assert_eq!(RuleAttrs::from_mask(mask), None);
    }

    #[test]
    fn default_map_ranks_container_scope_over_the_rest() {
        let map = RuleWeightMap::default();
        assert_eq!(map.container_scoped.when_true, 10);
        assert_eq!(map.propagates.when_true, 4);
        assert_eq!(map.from_schema.when_true, 1);
        // Both sides weigh the same, so every combination ties.
        let all = RuleAttrs::new(true, true, true);
        let none = RuleAttrs::new(false, false, false);
        assert_eq!(all.weight(&map), none.weight(&map));
    }

    #[test]
    fn solved_map_induces_strictly_decreasing_weights() {
        let ordering = count_down_ordering();
        let mut registry = MergePolicyRegistry::new();
        registry.update(&ordering).expect("satisfiable");
        let map = *registry.weight_map();
        let weights: Vec<u32> = ordering.iter().map(|attrs| attrs.weight(&map)).collect();
        assert!(
            weights.windows(2).all(|pair| pair[0] > pair[1]),
            "weights not strictly decreasing: {weights:?}"
        );
    }

    #[test]
    fn solving_is_deterministic() {
        let ordering = count_down_ordering();
        let mut first = MergePolicyRegistry::new();
        let mut second = MergePolicyRegistry::new();
        first.update(&ordering).expect("satisfiable");
        second.update(&ordering).expect("satisfiable");
        assert_eq!(first.weight_map(), second.weight_map());
    }

    #[test]
    fn contradictory_orderings_are_unsatisfiable() {
        // w(110) > w(001) > w(000) forces both deltas positive, which
        // contradicts w(111) coming last.
        let ordering = [
            RuleAttrs::from_mask("110").expect("valid mask"),
            RuleAttrs::from_mask("001").expect("valid mask"),
            RuleAttrs::from_mask("000").expect("valid mask"),
            RuleAttrs::from_mask("111").expect("valid mask"),
        ];
        let mut registry = MergePolicyRegistry::new();
        let err = registry.update(&ordering).expect_err("must fail");
        assert!(matches!(&*err, StrataError::UnsatisfiablePolicy { .. }));
    }

    #[test]
    fn duplicate_combinations_cannot_strictly_decrease() {
        let ordering = [
            RuleAttrs::from_mask("100").expect("valid mask"),
            RuleAttrs::from_mask("100").expect("valid mask"),
        ];
        let mut registry = MergePolicyRegistry::new();
        assert!(registry.update(&ordering).is_err());
    }
}
