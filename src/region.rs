//! Regions represent the geographical aggregation of a scenario, plus the global aggregate region.
use crate::id::{IDCollection, define_id_type};
use anyhow::{Result, ensure};
use indexmap::IndexSet;

define_id_type! {RegionID}

/// The name used for the global aggregate region unless configured otherwise
pub const DEFAULT_GLOBAL_REGION: &str = "World";

/// The fixed, ordered set of regions for a reporting run.
///
/// The global region is held separately from the regional members so that reductions over regions
/// never accidentally include it.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSet {
    regions: IndexSet<RegionID>,
    global: RegionID,
}

impl RegionSet {
    /// Create a new [`RegionSet`].
    ///
    /// # Arguments
    ///
    /// * `regions` - The regional members, in reporting order
    /// * `global` - The ID of the global aggregate region
    pub fn new<I>(regions: I, global: RegionID) -> Result<Self>
    where
        I: IntoIterator<Item = RegionID>,
    {
        let mut set = IndexSet::new();
        for region in regions {
            ensure!(
                region != global,
                "The global region {global} cannot also be a regional member"
            );
            ensure!(set.insert(region.clone()), "Duplicate region {region}");
        }
        ensure!(!set.is_empty(), "No regions provided");

        Ok(Self {
            regions: set,
            global,
        })
    }

    /// The global aggregate region
    pub fn global(&self) -> &RegionID {
        &self.global
    }

    /// Whether `region` is the global aggregate region
    pub fn is_global(&self, region: &RegionID) -> bool {
        *region == self.global
    }

    /// Iterate over the regional members, excluding the global region
    pub fn iter(&self) -> impl Iterator<Item = &RegionID> {
        self.regions.iter()
    }

    /// Iterate over the regional members followed by the global region
    pub fn iter_with_global(&self) -> impl Iterator<Item = &RegionID> {
        self.regions.iter().chain(std::iter::once(&self.global))
    }

    /// The number of regional members
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Whether there are no regional members (never true for a validated set)
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Whether the set contains `region`, including the global region
    pub fn contains(&self, region: &str) -> bool {
        self.regions.contains(region) || *self.global.0 == *region
    }

    /// The canonical sort position of a region (regional members first, global region last)
    pub fn position(&self, region: &RegionID) -> Option<usize> {
        if self.is_global(region) {
            return Some(self.regions.len());
        }

        self.regions.get_index_of(region)
    }

    /// Look up a region by name
    pub fn get(&self, region: &str) -> Result<RegionID> {
        if *self.global.0 == *region {
            return Ok(self.global.clone());
        }

        self.regions.get_id_by_str(region)
    }
}
