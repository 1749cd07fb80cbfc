//! Facility pool with remaining capacities and a nearest-neighbour index
//!
//! The pool is the single mutable resource of an assignment run. Every facility
//! occupies a stable slot for the whole run; slots are never reused, so an index
//! handed out by a query stays meaningful until that facility is pruned.
//!
//! Facilities sharing an identical coordinate are grouped into one site so the
//! spatial index only ever sees distinct points.

use crate::simulation::error::{AssignmentError, AssignmentResult};
use crate::types::{FacilityId, Point};
use kiddo::{KdTree, SquaredEuclidean};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Stable slot of a facility inside a [`FacilityPool`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacilityIndex(pub usize);

impl fmt::Display for FacilityIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A destination with its remaining visitor capacity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityRecord {
    /// Upstream facility identifier
    pub id: FacilityId,
    /// Location of the facility
    pub point: Point,
    /// Remaining number of visitors the facility accepts
    pub capacity: u32,
}

impl FacilityRecord {
    /// Create a new facility record
    pub fn new(id: impl Into<FacilityId>, point: Point, capacity: u32) -> Self {
        Self { id: id.into(), point, capacity }
    }
}

/// Distinct coordinate shared by one or more facilities
#[derive(Debug, Clone)]
struct Site {
    point: Point,
    /// Live slots at this coordinate, ascending
    members: Vec<usize>,
}

/// Shared, shrinking registry of facilities for one purpose group
pub struct FacilityPool {
    /// Slot storage; `None` once a facility has been pruned
    slots: Vec<Option<FacilityRecord>>,
    /// Site of every slot
    site_of: Vec<usize>,
    sites: Vec<Site>,
    /// Lookup from upstream identifier to slot
    id_index: HashMap<FacilityId, FacilityIndex>,
    /// Index over sites that still have live members; items are site positions
    tree: KdTree<f64, 2>,
    live_sites: usize,
    live_facilities: usize,
    pruned: usize,
}

impl fmt::Debug for FacilityPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacilityPool")
            .field("facilities", &self.live_facilities)
            .field("sites", &self.live_sites)
            .field("pruned", &self.pruned)
            .finish()
    }
}

impl FacilityPool {
    /// Build a pool from facility records
    ///
    /// Records without capacity are dropped. Records with a non-finite coordinate
    /// or a duplicate identifier are reported and skipped.
    pub fn new(records: impl IntoIterator<Item = FacilityRecord>) -> Self {
        let mut slots = Vec::new();
        let mut site_of = Vec::new();
        let mut sites: Vec<Site> = Vec::new();
        let mut id_index = HashMap::new();
        let mut site_lookup: HashMap<(u64, u64), usize> = HashMap::new();

        for record in records {
            if record.capacity < 1 {
                debug!(facility = %record.id, "Dropping facility without capacity");
                continue;
            }
            if let Err(error) = Self::check_record(&record, &id_index) {
                error.report();
                continue;
            }

            let slot = slots.len();
            // -0.0 and 0.0 must land on the same site
            let key = ((record.point.x + 0.0).to_bits(), (record.point.y + 0.0).to_bits());
            let site = *site_lookup.entry(key).or_insert_with(|| {
                sites.push(Site { point: record.point, members: Vec::new() });
                sites.len() - 1
            });
            sites[site].members.push(slot);
            site_of.push(site);
            id_index.insert(record.id.clone(), FacilityIndex(slot));
            slots.push(Some(record));
        }

        let live_facilities = slots.len();
        let mut pool = Self {
            slots,
            site_of,
            sites,
            id_index,
            tree: KdTree::new(),
            live_sites: 0,
            live_facilities,
            pruned: 0,
        };
        pool.rebuild_index();
        pool
    }

    fn check_record(
        record: &FacilityRecord,
        id_index: &HashMap<FacilityId, FacilityIndex>,
    ) -> AssignmentResult<()> {
        if !record.point.is_finite() {
            return Err(AssignmentError::invalid_facility(format!(
                "{} has a non-finite coordinate {}",
                record.id, record.point
            )));
        }
        if id_index.contains_key(&record.id) {
            return Err(AssignmentError::invalid_facility(format!(
                "{} appears more than once",
                record.id
            )));
        }
        Ok(())
    }

    /// Rebuild the spatial index from the sites that still have live members
    fn rebuild_index(&mut self) {
        let mut tree: KdTree<f64, 2> = KdTree::with_capacity(self.sites.len().max(1));
        let mut live_sites = 0;
        for (position, site) in self.sites.iter().enumerate() {
            if !site.members.is_empty() {
                tree.add(&site.point.to_array(), position as u64);
                live_sites += 1;
            }
        }
        self.tree = tree;
        self.live_sites = live_sites;
    }

    /// Number of facilities with remaining capacity
    pub fn len(&self) -> usize {
        self.live_facilities
    }

    /// Whether no facility has remaining capacity
    pub fn is_empty(&self) -> bool {
        self.live_facilities == 0
    }

    /// Number of distinct coordinates still indexed
    pub fn site_count(&self) -> usize {
        self.live_sites
    }

    /// Number of facilities pruned so far
    pub fn pruned_count(&self) -> usize {
        self.pruned
    }

    /// Sum of remaining capacities
    pub fn total_capacity(&self) -> u64 {
        self.records().map(|(_, record)| u64::from(record.capacity)).sum()
    }

    /// Get a live facility by slot
    pub fn get(&self, index: FacilityIndex) -> Option<&FacilityRecord> {
        self.slots.get(index.0).and_then(Option::as_ref)
    }

    /// Remaining capacity of a live facility
    pub fn remaining_capacity(&self, index: FacilityIndex) -> Option<u32> {
        self.get(index).map(|record| record.capacity)
    }

    /// Slot of a facility by its upstream identifier, live or pruned
    pub fn index_of(&self, id: &FacilityId) -> Option<FacilityIndex> {
        self.id_index.get(id).copied()
    }

    /// Iterate over live facilities in slot order
    pub fn records(&self) -> impl Iterator<Item = (FacilityIndex, &FacilityRecord)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, record)| record.as_ref().map(|r| (FacilityIndex(slot), r)))
    }

    /// Nearest live facility to `point`
    pub fn nearest(&self, point: Point) -> Option<FacilityIndex> {
        self.nearest_where(point, |_, _| true)
    }

    /// Nearest live facility to `point` that satisfies `accept`
    ///
    /// Facilities without remaining capacity are never returned. The index answers the common case. When every facility at the nearest
    /// site is rejected, the remaining sites are scanned in distance order.
    pub fn nearest_where<F>(&self, point: Point, accept: F) -> Option<FacilityIndex>
    where
        F: Fn(FacilityIndex, &FacilityRecord) -> bool,
    {
        if self.live_sites == 0 {
            return None;
        }

        let nearest = self.tree.nearest_one::<SquaredEuclidean>(&point.to_array());
        let site = nearest.item as usize;
        if let Some(found) = self.first_accepted(site, &accept) {
            return Some(found);
        }

        let mut best: Option<(f64, FacilityIndex)> = None;
        for (position, candidate) in self.sites.iter().enumerate() {
            if position == site || candidate.members.is_empty() {
                continue;
            }
            let delta = candidate.point - point;
            let distance = delta.x * delta.x + delta.y * delta.y;
            if best.map_or(true, |(current, _)| distance < current) {
                if let Some(found) = self.first_accepted(position, &accept) {
                    best = Some((distance, found));
                }
            }
        }
        best.map(|(_, index)| index)
    }

    fn first_accepted<F>(&self, site: usize, accept: &F) -> Option<FacilityIndex>
    where
        F: Fn(FacilityIndex, &FacilityRecord) -> bool,
    {
        self.sites.get(site)?.members.iter().find_map(|&slot| {
            let record = self.slots[slot].as_ref()?;
            (record.capacity >= 1 && accept(FacilityIndex(slot), record)).then_some(FacilityIndex(slot))
        })
    }

    /// Decrement the capacity of a live facility by one and return what is left
    ///
    /// The facility stays indexed at zero capacity until [`FacilityPool::update`]
    /// prunes it, but lookups skip it from now on.
    pub fn consume(&mut self, index: FacilityIndex) -> AssignmentResult<u32> {
        let record = self
            .slots
            .get_mut(index.0)
            .and_then(Option::as_mut)
            .ok_or(AssignmentError::StaleFacility { index })?;
        record.capacity = record.capacity.saturating_sub(1);
        Ok(record.capacity)
    }

    /// Remove a facility from the pool and rebuild the spatial index
    pub fn update(&mut self, index: FacilityIndex) -> AssignmentResult<FacilityRecord> {
        let record = self
            .slots
            .get_mut(index.0)
            .and_then(Option::take)
            .ok_or(AssignmentError::StaleFacility { index })?;

        let site = self.site_of[index.0];
        self.sites[site].members.retain(|&slot| slot != index.0);
        self.live_facilities -= 1;
        self.pruned += 1;

        debug!(facility = %record.id, slot = index.0, "Facility exhausted, pruning from pool");
        if self.sites[site].members.is_empty() {
            self.rebuild_index();
        }
        Ok(record)
    }
}
