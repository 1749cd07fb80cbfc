//! Snapping continuous stop positions onto facilities

use super::{Discretization, DiscretizationSolver, FacilityChoice};
use crate::chain::AssignmentProblem;
use crate::facility::{FacilityIndex, FacilityPool};
use crate::simulation::error::{AssignmentError, AssignmentResult};
use crate::types::{ActivityPurpose, Point};
use std::collections::HashMap;

/// Nearest-facility discretization that respects capacity within one problem
///
/// A facility is picked for several stops of the same problem only while its
/// remaining capacity covers all of them, so committing a solution never takes
/// a facility below zero.
#[derive(Debug)]
pub struct CapacityAwareDiscretizer {
    pool: FacilityPool,
}

impl CapacityAwareDiscretizer {
    /// Create a discretizer owning `pool`
    pub fn new(pool: FacilityPool) -> Self {
        Self { pool }
    }

    /// Give the pool back, e.g. to hand it to the next survey source
    pub fn into_pool(self) -> FacilityPool {
        self.pool
    }

    fn exhausted(purpose: Option<&ActivityPurpose>) -> AssignmentError {
        let purpose = purpose
            .cloned()
            .unwrap_or_else(|| ActivityPurpose::Secondary(String::new()));
        AssignmentError::pool_exhausted(purpose)
    }
}

impl DiscretizationSolver for CapacityAwareDiscretizer {
    fn solve(&self, problem: &AssignmentProblem, positions: &[Point]) -> AssignmentResult<Discretization> {
        if self.pool.is_empty() {
            return Err(Self::exhausted(problem.purposes.first()));
        }

        let mut demand: HashMap<FacilityIndex, u32> = HashMap::new();
        let mut choices = Vec::with_capacity(positions.len());

        for (stop, &position) in positions.iter().enumerate() {
            let index = self
                .pool
                .nearest_where(position, |index, record| {
                    demand.get(&index).copied().unwrap_or(0) < record.capacity
                })
                .ok_or_else(|| Self::exhausted(problem.purposes.get(stop)))?;

            let record = self.pool.get(index).ok_or(AssignmentError::StaleFacility { index })?;
            *demand.entry(index).or_insert(0) += 1;
            choices.push(FacilityChoice { index, id: record.id.clone(), point: record.point });
        }

        Ok(Discretization { choices })
    }

    fn consume(&mut self, index: FacilityIndex) -> AssignmentResult<u32> {
        self.pool.consume(index)
    }

    fn update(&mut self, index: FacilityIndex) -> AssignmentResult<()> {
        self.pool.update(index).map(|_| ())
    }

    fn pool(&self) -> &FacilityPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facility::FacilityRecord;
    use crate::types::{FacilityId, PersonId, TravelMode, TripId};

    fn problem(stops: usize) -> AssignmentProblem {
        AssignmentProblem {
            person: PersonId::from("p"),
            purposes: vec![ActivityPurpose::Secondary("6".to_string()); stops],
            modes: vec![TravelMode::from("1"); stops + 1],
            travel_times: vec![10.0; stops + 1],
            trip_ids: (0..=stops).map(|i| TripId::new(i.to_string())).collect(),
            trip_orders: (0..=stops as u32).collect(),
            origin: Some(Point::ORIGIN),
            destination: Some(Point::ORIGIN),
        }
    }

    fn discretizer(records: &[(&str, f64, f64, u32)]) -> CapacityAwareDiscretizer {
        CapacityAwareDiscretizer::new(FacilityPool::new(
            records
                .iter()
                .map(|&(id, x, y, capacity)| FacilityRecord::new(id, Point::new(x, y), capacity)),
        ))
    }

    #[test]
    fn test_snaps_to_nearest_facility() {
        let solver = discretizer(&[("a", 0.0, 0.0, 5), ("b", 100.0, 0.0, 5)]);
        let positions = [Point::new(10.0, 0.0), Point::new(90.0, 0.0)];

        let result = solver.solve(&problem(2), &positions).unwrap();
        let ids: Vec<_> = result.choices.iter().map(|choice| choice.id.clone()).collect();
        assert_eq!(ids, vec![FacilityId::from("a"), FacilityId::from("b")]);
        assert_eq!(result.points(), vec![Point::new(0.0, 0.0), Point::new(100.0, 0.0)]);
    }

    #[test]
    fn test_duplicates_allowed_while_capacity_lasts() {
        let solver = discretizer(&[("a", 0.0, 0.0, 2), ("b", 100.0, 0.0, 5)]);
        let positions = [Point::ORIGIN, Point::ORIGIN, Point::ORIGIN];

        let result = solver.solve(&problem(3), &positions).unwrap();
        let ids: Vec<_> = result.choices.iter().map(|choice| choice.id.0.as_str()).collect();
        assert_eq!(ids, vec!["a", "a", "b"]);
    }

    #[test]
    fn test_solve_does_not_change_capacity() {
        let solver = discretizer(&[("a", 0.0, 0.0, 1)]);
        solver.solve(&problem(1), &[Point::ORIGIN]).unwrap();
        assert_eq!(solver.pool().total_capacity(), 1);
    }

    #[test]
    fn test_empty_pool_is_exhausted() {
        let solver = discretizer(&[]);
        let result = solver.solve(&problem(1), &[Point::ORIGIN]);
        assert!(matches!(result, Err(AssignmentError::PoolExhausted { .. })));
    }

    #[test]
    fn test_insufficient_capacity_is_exhausted() {
        let solver = discretizer(&[("a", 0.0, 0.0, 1)]);
        match solver.solve(&problem(2), &[Point::ORIGIN, Point::ORIGIN]) {
            Err(AssignmentError::PoolExhausted { purpose }) => {
                assert_eq!(purpose, ActivityPurpose::Secondary("6".to_string()))
            }
            other => panic!("Expected PoolExhausted, got {:?}", other),
        }
    }

    #[test]
    fn test_update_prunes_through_the_trait() {
        let mut solver = discretizer(&[("a", 0.0, 0.0, 1), ("b", 50.0, 0.0, 1)]);
        let index = solver.pool().index_of(&FacilityId::from("a")).unwrap();

        assert_eq!(solver.consume(index).unwrap(), 0);
        solver.update(index).unwrap();

        let result = solver.solve(&problem(1), &[Point::ORIGIN]).unwrap();
        assert_eq!(result.choices[0].id, FacilityId::from("b"));
        assert_eq!(solver.into_pool().len(), 1);
    }
}
