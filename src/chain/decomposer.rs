//! Chain decomposition of trip sequences into assignment problems
//!
//! Trips are scanned in order. A chain starts at the origin purpose of its first
//! trip and grows by one destination purpose per trip until an anchor purpose is
//! reached or the person's trips run out. Anchor ends are then replaced by their
//! fixed coordinates.

use super::problem::{AnchorLocations, AssignmentProblem, TripRecord};
use crate::types::{ActivityPurpose, PersonId, Point, TravelMode, TripId};
use std::iter::Peekable;
use tracing::debug;

/// Counters of chains produced and skipped by a [`ChainDecomposer`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecomposerStats {
    /// Problems handed out
    pub problems: usize,
    /// Chains without any free stop, e.g. a direct home to work trip
    pub skipped_empty: usize,
    /// Chains whose anchor had no coordinate
    pub skipped_missing_anchor: usize,
    /// Chains with no anchor at either end
    pub skipped_unanchored: usize,
}

impl DecomposerStats {
    /// Chains skipped as data-quality problems; chains without free stops are not counted
    pub fn skipped(&self) -> usize {
        self.skipped_missing_anchor + self.skipped_unanchored
    }
}

/// Chain under construction, before anchors are resolved
#[derive(Debug)]
struct PendingChain {
    person: PersonId,
    purposes: Vec<ActivityPurpose>,
    modes: Vec<TravelMode>,
    travel_times: Vec<f64>,
    trip_ids: Vec<TripId>,
    trip_orders: Vec<u32>,
}

impl PendingChain {
    fn start(trip: &TripRecord) -> Self {
        Self {
            person: trip.person.clone(),
            purposes: vec![trip.origin_purpose.clone()],
            modes: Vec::new(),
            travel_times: Vec::new(),
            trip_ids: Vec::new(),
            trip_orders: Vec::new(),
        }
    }

    fn push(&mut self, trip: TripRecord) {
        self.purposes.push(trip.destination_purpose);
        self.modes.push(trip.mode);
        self.travel_times.push(trip.travel_time);
        self.trip_ids.push(trip.trip);
        self.trip_orders.push(trip.order);
    }
}

/// Lazy stream of [`AssignmentProblem`]s over sorted trips and anchors
///
/// Trips must be sorted by person and order number, anchors by person. Both
/// streams are consumed once.
#[derive(Debug)]
pub struct ChainDecomposer<T, A>
where
    T: Iterator<Item = TripRecord>,
    A: Iterator<Item = AnchorLocations>,
{
    trips: T,
    anchors: Peekable<A>,
    current_anchors: Option<AnchorLocations>,
    pending: Option<PendingChain>,
    held: Option<TripRecord>,
    stats: DecomposerStats,
}

impl<T, A> ChainDecomposer<T, A>
where
    T: Iterator<Item = TripRecord>,
    A: Iterator<Item = AnchorLocations>,
{
    /// Create a decomposer over sorted trips and anchors
    pub fn new<IT, IA>(trips: IT, anchors: IA) -> Self
    where
        IT: IntoIterator<Item = TripRecord, IntoIter = T>,
        IA: IntoIterator<Item = AnchorLocations, IntoIter = A>,
    {
        Self {
            trips: trips.into_iter(),
            anchors: anchors.into_iter().peekable(),
            current_anchors: None,
            pending: None,
            held: None,
            stats: DecomposerStats::default(),
        }
    }

    /// Counters so far
    pub fn stats(&self) -> DecomposerStats {
        self.stats
    }

    /// Next chain ending at an anchor, or a tail cut off by the end of a person's day
    fn next_pending(&mut self) -> Option<PendingChain> {
        loop {
            let trip = match self.held.take().or_else(|| self.trips.next()) {
                Some(trip) => trip,
                None => return self.pending.take(),
            };

            if let Some(pending) = &self.pending {
                if pending.person != trip.person {
                    self.held = Some(trip);
                    return self.pending.take();
                }
            }

            let closes = trip.destination_purpose.is_anchor();
            let chain = self.pending.get_or_insert_with(|| PendingChain::start(&trip));
            chain.push(trip);

            if closes {
                return self.pending.take();
            }
        }
    }

    /// Coordinate of an anchor purpose for `person`
    fn anchor_location(&mut self, person: &PersonId, purpose: &ActivityPurpose) -> Option<Point> {
        let cached = matches!(&self.current_anchors, Some(anchors) if &anchors.person == person);
        if !cached {
            self.current_anchors = None;
            while self.anchors.peek().map_or(false, |anchors| anchors.person < *person) {
                self.anchors.next();
            }
            if self.anchors.peek().map_or(false, |anchors| anchors.person == *person) {
                self.current_anchors = self.anchors.next();
            }
        }
        self.current_anchors.as_ref().and_then(|anchors| anchors.location(purpose))
    }

    fn resolve(&mut self, chain: PendingChain) -> Option<AssignmentProblem> {
        let PendingChain { person, mut purposes, modes, travel_times, trip_ids, trip_orders } =
            chain;

        let origin_purpose = purposes.first().filter(|p| p.is_anchor()).cloned();
        let destination_purpose = purposes.last().filter(|p| p.is_anchor()).cloned();

        if origin_purpose.is_none() && destination_purpose.is_none() {
            debug!(person = %person, "Skipping chain without any anchor");
            self.stats.skipped_unanchored += 1;
            return None;
        }

        if destination_purpose.is_some() {
            purposes.pop();
        }
        if origin_purpose.is_some() {
            purposes.remove(0);
        }

        if purposes.is_empty() {
            self.stats.skipped_empty += 1;
            return None;
        }

        let mut origin = None;
        if let Some(purpose) = &origin_purpose {
            origin = self.anchor_location(&person, purpose);
            if origin.is_none() {
                debug!(person = %person, purpose = %purpose, "Skipping chain with unplaced origin anchor");
                self.stats.skipped_missing_anchor += 1;
                return None;
            }
        }

        let mut destination = None;
        if let Some(purpose) = &destination_purpose {
            destination = self.anchor_location(&person, purpose);
            if destination.is_none() {
                debug!(person = %person, purpose = %purpose, "Skipping chain with unplaced destination anchor");
                self.stats.skipped_missing_anchor += 1;
                return None;
            }
        }

        self.stats.problems += 1;
        Some(AssignmentProblem {
            person,
            purposes,
            modes,
            travel_times,
            trip_ids,
            trip_orders,
            origin,
            destination,
        })
    }
}

impl<T, A> Iterator for ChainDecomposer<T, A>
where
    T: Iterator<Item = TripRecord>,
    A: Iterator<Item = AnchorLocations>,
{
    type Item = AssignmentProblem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let chain = self.next_pending()?;
            if let Some(problem) = self.resolve(chain) {
                return Some(problem);
            }
        }
    }
}
