//! Continuous placement of free stops ("gravity chain" relaxation)
//!
//! Closed chains with one free stop are solved exactly by intersecting the two
//! leg circles. Longer closed chains start from a placement along the straight
//! line between the anchors and are corrected iteratively: every round each leg
//! pulls or pushes its free endpoints by a fraction of its length error. Open
//! chains are random-bearing walks from their anchor.

use super::{Relaxation, RelaxationSolver};
use crate::chain::AssignmentProblem;
use crate::types::Point;
use rand::Rng;
use std::f64::consts::TAU;

/// Spans shorter than this are treated as round trips
const COINCIDENT_SPAN: f64 = 1e-6;

/// Iterative pairwise distance correction between fixed anchors
#[derive(Debug, Clone)]
pub struct GravityChainSolver {
    /// Bound on the lateral offset of the initial placement (metres)
    pub lateral_deviation: f64,
    /// Fraction of each leg error corrected per round
    pub alpha: f64,
    /// Largest leg error accepted as converged (metres)
    pub eps: f64,
    /// Round limit
    pub maximum_iterations: usize,
}

impl Default for GravityChainSolver {
    fn default() -> Self {
        Self { lateral_deviation: 10.0, alpha: 0.3, eps: 1.0, maximum_iterations: 1000 }
    }
}

impl GravityChainSolver {
    /// Create a solver with the given parameters
    pub fn new(lateral_deviation: f64, alpha: f64, eps: f64, maximum_iterations: usize) -> Self {
        Self { lateral_deviation, alpha, eps, maximum_iterations }
    }

    /// Exact placement of a single stop between two anchors
    fn place_single<R>(&self, origin: Point, destination: Point, d0: f64, d1: f64, rng: &mut R) -> Point
    where
        R: Rng + ?Sized,
    {
        let span = destination - origin;
        let direct = span.norm();

        let Some(direction) = span.normalized().filter(|_| direct > COINCIDENT_SPAN) else {
            // Round trip: any point on the circle around the anchor
            let radius = 0.5 * (d0 + d1);
            return origin + Point::from_bearing(rng.gen_range(0.0..TAU)) * radius;
        };

        if direct >= d0 + d1 {
            // Legs too short to reach: split the gap proportionally
            let share = if d0 + d1 > 0.0 { d0 / (d0 + d1) } else { 0.5 };
            return origin + direction * (direct * share);
        }

        if direct <= (d0 - d1).abs() {
            // One leg too long: overshoot along the line by the longer leg
            return if d0 >= d1 {
                origin + direction * d0
            } else {
                destination - direction * d1
            };
        }

        let along = (d0 * d0 - d1 * d1 + direct * direct) / (2.0 * direct);
        let height = (d0 * d0 - along * along).max(0.0).sqrt();
        let side = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        origin + direction * along + direction.perpendicular() * (height * side)
    }

    /// Starting positions for a closed chain with several stops
    fn initial_placement<R>(
        &self,
        origin: Point,
        destination: Point,
        distances: &[f64],
        stops: usize,
        rng: &mut R,
    ) -> Vec<Point>
    where
        R: Rng + ?Sized,
    {
        let total: f64 = distances.iter().sum();
        let span = destination - origin;
        let round_trip = span.norm() <= COINCIDENT_SPAN;

        let direction = if round_trip {
            Point::from_bearing(rng.gen_range(0.0..TAU))
        } else {
            span.normalized().unwrap_or_else(|| Point::new(1.0, 0.0))
        };
        let lateral = direction.perpendicular();

        let mut travelled = 0.0;
        (0..stops)
            .map(|stop| {
                travelled += distances.get(stop).copied().unwrap_or(0.0);
                let fraction = if total > 0.0 {
                    travelled / total
                } else {
                    (stop + 1) as f64 / (stops + 1) as f64
                };

                let base = if round_trip {
                    // Out and back along one bearing
                    let reach = if fraction <= 0.5 { fraction } else { 1.0 - fraction };
                    origin + direction * (reach * total)
                } else {
                    origin + span * fraction
                };

                let offset = if self.lateral_deviation > 0.0 {
                    rng.gen_range(-self.lateral_deviation..=self.lateral_deviation)
                } else {
                    0.0
                };
                base + lateral * offset
            })
            .collect()
    }

    /// One correction round over the full chain; the ends stay fixed
    fn correct(&self, chain: &[Point], distances: &[f64]) -> (Vec<Point>, f64) {
        let legs = chain.len() - 1;
        let mut pulls = Vec::with_capacity(legs);
        let mut worst: f64 = 0.0;

        for leg in 0..legs {
            let delta = chain[leg + 1] - chain[leg];
            let error = delta.norm() - distances.get(leg).copied().unwrap_or(0.0);
            worst = worst.max(error.abs());
            let unit = delta.normalized().unwrap_or_else(|| Point::new(1.0, 0.0));
            pulls.push(unit * error);
        }

        let mut next = chain.to_vec();
        for stop in 1..legs {
            next[stop] = chain[stop] + (pulls[stop] - pulls[stop - 1]) * self.alpha;
        }
        (next, worst)
    }

    fn relax_closed<R>(&self, origin: Point, destination: Point, distances: &[f64], stops: usize, rng: &mut R) -> Relaxation
    where
        R: Rng + ?Sized,
    {
        if stops == 1 && distances.len() >= 2 {
            let point = self.place_single(origin, destination, distances[0], distances[1], rng);
            let errors = [
                (origin.distance_to(&point) - distances[0]).abs(),
                (point.distance_to(&destination) - distances[1]).abs(),
            ];
            return Relaxation {
                points: vec![point],
                converged: errors.iter().all(|&error| error < self.eps),
                iterations: 1,
            };
        }

        let mut chain = Vec::with_capacity(stops + 2);
        chain.push(origin);
        chain.extend(self.initial_placement(origin, destination, distances, stops, rng));
        chain.push(destination);

        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.maximum_iterations {
            let (next, worst) = self.correct(&chain, distances);
            if worst < self.eps {
                converged = true;
                break;
            }
            chain = next;
            iterations += 1;
        }

        let points = chain[1..chain.len() - 1].to_vec();
        Relaxation { points, converged, iterations }
    }

    /// Random-bearing walk from `start` along `distances`
    fn walk<R>(start: Point, distances: &[f64], rng: &mut R) -> Vec<Point>
    where
        R: Rng + ?Sized,
    {
        let mut current = start;
        distances
            .iter()
            .map(|&distance| {
                current = current + Point::from_bearing(rng.gen_range(0.0..TAU)) * distance;
                current
            })
            .collect()
    }
}

impl RelaxationSolver for GravityChainSolver {
    fn relax<R>(&self, problem: &AssignmentProblem, distances: &[f64], rng: &mut R) -> Relaxation
    where
        R: Rng + ?Sized,
    {
        let stops = problem.size();
        match (problem.origin, problem.destination) {
            (Some(origin), Some(destination)) => {
                self.relax_closed(origin, destination, distances, stops, rng)
            }
            (Some(origin), None) => {
                let points = Self::walk(origin, &distances[..stops.min(distances.len())], rng);
                Relaxation { points, converged: true, iterations: 0 }
            }
            (None, Some(destination)) => {
                let reversed: Vec<f64> =
                    distances.iter().rev().take(stops).copied().collect();
                let mut points = Self::walk(destination, &reversed, rng);
                points.reverse();
                Relaxation { points, converged: true, iterations: 0 }
            }
            (None, None) => {
                let legs = &distances[..stops.saturating_sub(1).min(distances.len())];
                let mut points = vec![Point::ORIGIN];
                points.extend(Self::walk(Point::ORIGIN, legs, rng));
                points.truncate(stops);
                Relaxation { points, converged: true, iterations: 0 }
            }
        }
    }
}
