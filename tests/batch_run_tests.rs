//! Tests for complete batch runs
//!
//! These tests verify reproducibility under a fixed seed, the capacity
//! invariant over a whole run, chain decomposition of full days and the
//! sharing of one facility pool between survey sources.

use activity_chain_locator::chain::{AnchorLocations, TripRecord};
use activity_chain_locator::facility::{FacilityPool, FacilityRecord};
use activity_chain_locator::io;
use activity_chain_locator::simulation::{AssignmentError, BatchRunner, SurveySource};
use activity_chain_locator::survey::{SurveyPerson, SurveyTrip};
use activity_chain_locator::types::*;
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

fn survey(distances: &[f64]) -> (Vec<SurveyPerson>, Vec<SurveyTrip>) {
    let persons = vec![
        SurveyPerson { person: PersonId::from("r1"), weight: 1.0 },
        SurveyPerson { person: PersonId::from("r2"), weight: 2.5 },
    ];
    let mut trips = Vec::new();
    for (i, &distance) in distances.iter().enumerate() {
        for mode in ["1", "3"] {
            trips.push(SurveyTrip {
                person: PersonId::from(if i % 2 == 0 { "r1" } else { "r2" }),
                mode: TravelMode::from(mode),
                origin_purpose: ActivityPurpose::Home,
                destination_purpose: ActivityPurpose::Secondary("6".to_string()),
                travel_time: 5.0 + (i % 4) as f64 * 5.0,
                distance: if mode == "1" { distance } else { distance * 4.0 },
            });
        }
    }
    (persons, trips)
}

fn trip(person: &str, order: u32, mode: &str, from: &str, to: &str) -> TripRecord {
    TripRecord {
        person: PersonId::from(person),
        trip: TripId::new(format!("{}-{}", person, order)),
        order,
        mode: TravelMode::from(mode),
        origin_purpose: from.parse().unwrap(),
        destination_purpose: to.parse().unwrap(),
        travel_time: 10.0,
    }
}

/// Persons with a mix of chain shapes around home (0, 0) and work (2000, 0)
fn population(prefix: &str, count: usize) -> (Vec<TripRecord>, Vec<AnchorLocations>) {
    let mut trips = Vec::new();
    let mut anchors = Vec::new();
    for i in 0..count {
        let person = format!("{}{:03}", prefix, i);
        let p = person.as_str();
        match i % 3 {
            // home -> shop -> home
            0 => {
                trips.push(trip(p, 1, "1", "1", "6"));
                trips.push(trip(p, 2, "1", "6", "1"));
            }
            // home -> work -> shop -> leisure -> home
            1 => {
                trips.push(trip(p, 1, "3", "1", "4"));
                trips.push(trip(p, 2, "1", "4", "6"));
                trips.push(trip(p, 3, "1", "6", "7"));
                trips.push(trip(p, 4, "3", "7", "1"));
            }
            // leisure -> home -> shop (open at both ends)
            _ => {
                trips.push(trip(p, 1, "1", "7", "1"));
                trips.push(trip(p, 2, "1", "1", "6"));
            }
        }
        anchors.push(
            AnchorLocations::new(p)
                .with_home(Point::new(0.0, 100.0 * i as f64))
                .with_work(Point::new(2000.0, 0.0)),
        );
    }
    (trips, anchors)
}

fn source(name: &str, prefix: &str, count: usize) -> SurveySource {
    let distances: Vec<f64> = (0..60).map(|i| 300.0 + 20.0 * i as f64).collect();
    let (survey_persons, survey_trips) = survey(&distances);
    let (trips, anchors) = population(prefix, count);
    SurveySource { name: name.to_string(), survey_persons, survey_trips, trips, anchors }
}

fn grid_records(capacity: u32) -> Vec<FacilityRecord> {
    let mut records = Vec::new();
    for gx in -10..=30 {
        for gy in -10..=40 {
            records.push(FacilityRecord::new(
                format!("f_{}_{}", gx, gy).as_str(),
                Point::new(f64::from(gx) * 100.0, f64::from(gy) * 100.0),
                capacity,
            ));
        }
    }
    records
}

fn seeded(seed: u64) -> BatchRunner {
    BatchRunner::new(AssignmentConfig { seed: Some(seed), ..Default::default() }).unwrap()
}

#[test]
fn test_same_seed_same_assignment() {
    let first = seeded(42).run(FacilityPool::new(grid_records(2)), vec![source("mid", "p", 30)]).unwrap();
    let second = seeded(42).run(FacilityPool::new(grid_records(2)), vec![source("mid", "p", 30)]).unwrap();

    assert!(!first.locations.is_empty());
    assert_eq!(first.locations, second.locations);
    assert_eq!(first.convergence, second.convergence);

    // The written assignment tables are byte-identical
    let (first_dir, second_dir) = (TempDir::new().unwrap(), TempDir::new().unwrap());
    let first_paths = io::write_results(first_dir.path(), &first).unwrap();
    let second_paths = io::write_results(second_dir.path(), &second).unwrap();
    assert!(first_paths.locations.ends_with(io::LOCATIONS_FILE));

    let first_bytes = fs::read(&first_paths.locations).unwrap();
    let second_bytes = fs::read(&second_paths.locations).unwrap();
    assert!(!first_bytes.is_empty());
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn test_capacity_never_exceeded() {
    let records = grid_records(1);
    let initial: HashMap<FacilityId, u32> =
        records.iter().map(|record| (record.id.clone(), record.capacity)).collect();
    let initial_total: u64 = initial.values().map(|&c| u64::from(c)).sum();

    let result = seeded(9).run(FacilityPool::new(records), vec![source("mid", "p", 60)]).unwrap();

    let mut used: HashMap<FacilityId, u32> = HashMap::new();
    for record in &result.locations {
        *used.entry(record.facility.clone()).or_insert(0) += 1;
    }
    for (facility, count) in &used {
        assert!(*count <= initial[facility], "{} assigned {} times", facility, count);
    }

    assert_eq!(result.pool.total_capacity() + result.locations.len() as u64, initial_total);
    assert_eq!(result.summary.facilities_exhausted, used.len());
}

#[test]
fn test_chain_shapes_are_decomposed() {
    let result = seeded(1).run(FacilityPool::new(grid_records(5)), vec![source("mid", "p", 3)]).unwrap();

    // p000: one round-trip stop; p001: two stops between work and home; p002: one tail each side
    assert_eq!(result.summary.problems, 4);
    assert_eq!(result.locations.len(), 5);
    assert_eq!(result.summary.assigned_stops, 5);
    assert_eq!(result.summary.skipped_chains, 0);

    let p001: Vec<_> = result.locations.iter().filter(|r| r.person == PersonId::from("p001")).collect();
    assert_eq!(p001.len(), 2);
    assert_eq!(p001[0].trip, TripId::from("p001-2"));
    assert_eq!(p001[0].purpose, ActivityPurpose::Secondary("6".to_string()));
    assert_eq!(p001[1].trip, TripId::from("p001-3"));
    assert_eq!(p001[1].purpose, ActivityPurpose::Secondary("7".to_string()));

    // The leading tail has no arriving trip, so it reports the trip leaving it
    let p002: Vec<_> = result.locations.iter().filter(|r| r.person == PersonId::from("p002")).collect();
    assert_eq!(p002.len(), 2);
    assert_eq!(p002[0].trip, TripId::from("p002-1"));
    assert_eq!(p002[1].trip, TripId::from("p002-2"));
}

#[test]
fn test_persons_without_anchors_are_skipped() {
    let mut src = source("mid", "p", 3);
    src.anchors.retain(|anchors| anchors.person != PersonId::from("p000"));

    let result = seeded(1).run(FacilityPool::new(grid_records(5)), vec![src]).unwrap();
    assert_eq!(result.summary.skipped_chains, 1);
    assert!(result.locations.iter().all(|r| r.person != PersonId::from("p000")));
}

#[test]
fn test_sources_processed_in_order_on_one_pool() {
    let records = grid_records(1);
    let total = records.len() as u64;
    let result = seeded(4)
        .run(FacilityPool::new(records), vec![source("first", "a", 10), source("second", "b", 10)])
        .unwrap();

    let boundary = result.locations.iter().position(|r| r.source == "second").unwrap();
    assert!(result.locations[..boundary].iter().all(|r| r.source == "first"));
    assert!(result.locations[boundary..].iter().all(|r| r.source == "second"));

    let mut facilities: Vec<_> = result.locations.iter().map(|r| r.facility.clone()).collect();
    facilities.sort();
    facilities.dedup();
    assert_eq!(facilities.len(), result.locations.len());
    assert_eq!(result.pool.total_capacity(), total - result.locations.len() as u64);
}

#[test]
fn test_source_without_usable_survey_fails() {
    let mut src = source("mid", "p", 3);
    src.survey_persons.clear();

    let result = seeded(1).run(FacilityPool::new(grid_records(5)), vec![src]);
    assert!(matches!(result, Err(AssignmentError::EmptySurvey { .. })));
}

#[test]
fn test_summary_counts_validity() {
    let result = seeded(8).run(FacilityPool::new(grid_records(3)), vec![source("mid", "p", 12)]).unwrap();
    let summary = &result.summary;

    let valid = result.convergence.iter().filter(|record| record.valid).count();
    assert_eq!(summary.valid, valid);
    assert_eq!(summary.problems, result.convergence.len());
    assert!(summary.finished_at.is_some());
    assert!(summary.success_rate() >= 0.0 && summary.success_rate() <= 1.0);
    assert!(result.convergence.iter().all(|record| record.iterations >= 1 && record.iterations <= 20));
}
