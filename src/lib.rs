//! Synthetic augmentation of periodic light curves and minimum-observation analysis.
//!
//! See [`light_curve::PeriodicLightCurve`] for the light-curve model and [`batch`] for the
//! catalog-level pipelines.
pub mod augmentation;
pub mod batch;
pub mod catalog;
pub mod constants;
pub mod lcaugment_errors;
pub mod light_curve;
pub mod min_observations;
pub mod observations;
pub mod period;
pub mod phase;
pub mod reconstruction;
pub mod regression;
