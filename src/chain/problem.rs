//! Trip and anchor input records and the assignment problem built from them

use crate::types::{ActivityPurpose, PersonId, Point, TravelMode, TripId};
use serde::{Deserialize, Serialize};

/// One trip of a synthetic person, as produced by the trip synthesis stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    /// Person making the trip
    pub person: PersonId,
    /// Trip identifier
    pub trip: TripId,
    /// Position of the trip in the person's day
    pub order: u32,
    /// Main mode of the trip
    pub mode: TravelMode,
    /// Purpose of the activity the trip starts at
    pub origin_purpose: ActivityPurpose,
    /// Purpose of the activity the trip ends at
    pub destination_purpose: ActivityPurpose,
    /// Declared travel time in minutes
    pub travel_time: f64,
}

/// Fixed anchor coordinates of one person; any of them may be unassigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorLocations {
    /// Person owning the anchors
    pub person: PersonId,
    /// Home location
    #[serde(default)]
    pub home: Option<Point>,
    /// Work location
    #[serde(default)]
    pub work: Option<Point>,
    /// Education location
    #[serde(default)]
    pub education: Option<Point>,
}

impl AnchorLocations {
    /// Create anchors with no locations assigned
    pub fn new(person: impl Into<PersonId>) -> Self {
        Self { person: person.into(), home: None, work: None, education: None }
    }

    /// Set the home location
    pub fn with_home(mut self, point: Point) -> Self {
        self.home = Some(point);
        self
    }

    /// Set the work location
    pub fn with_work(mut self, point: Point) -> Self {
        self.work = Some(point);
        self
    }

    /// Set the education location
    pub fn with_education(mut self, point: Point) -> Self {
        self.education = Some(point);
        self
    }

    /// Location of an anchor purpose; always `None` for secondary purposes
    pub fn location(&self, purpose: &ActivityPurpose) -> Option<Point> {
        match purpose {
            ActivityPurpose::Home => self.home,
            ActivityPurpose::Work => self.work,
            ActivityPurpose::Education => self.education,
            ActivityPurpose::Secondary(_) => None,
        }
    }
}

/// A maximal run of free stops between anchors, ready to be solved
///
/// Leg `i` connects chain point `i` and `i + 1`, where the chain points are the
/// fixed origin (if any), the free stops, and the fixed destination (if any).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentProblem {
    /// Person owning the chain
    pub person: PersonId,
    /// Purposes of the free stops, in visiting order
    pub purposes: Vec<ActivityPurpose>,
    /// Mode of every leg
    pub modes: Vec<TravelMode>,
    /// Declared travel time of every leg
    pub travel_times: Vec<f64>,
    /// Trip of every leg
    pub trip_ids: Vec<TripId>,
    /// Order number of every leg
    pub trip_orders: Vec<u32>,
    /// Fixed coordinate the chain starts at
    pub origin: Option<Point>,
    /// Fixed coordinate the chain ends at
    pub destination: Option<Point>,
}

impl AssignmentProblem {
    /// Number of free stops
    pub fn size(&self) -> usize {
        self.purposes.len()
    }

    /// Number of legs
    pub fn leg_count(&self) -> usize {
        self.modes.len()
    }

    /// Whether both ends are anchored
    pub fn is_closed(&self) -> bool {
        self.origin.is_some() && self.destination.is_some()
    }

    /// Trip reported for free stop `stop`
    ///
    /// This is the trip arriving at the stop, or the trip leaving it when the
    /// chain starts at a free stop.
    pub fn trip_for_stop(&self, stop: usize) -> usize {
        stop.min(self.leg_count().saturating_sub(1))
    }

    /// All chain points: fixed origin, the given stops, fixed destination
    pub fn chain_points(&self, stops: &[Point]) -> Vec<Point> {
        let mut points = Vec::with_capacity(stops.len() + 2);
        points.extend(self.origin);
        points.extend_from_slice(stops);
        points.extend(self.destination);
        points
    }
}
