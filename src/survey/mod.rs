//! Travel survey input and the distance distribution model

pub mod distribution;

pub use distribution::{
    calculate_bounds, resample_cdf, DistanceBand, DistanceDistribution, ModeDistribution,
    SurveyPerson, SurveyTrip,
};
