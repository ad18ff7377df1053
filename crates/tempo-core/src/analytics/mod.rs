//! Analytical engines: calibration, simulation, state-transition analysis,
//! impact previews, attention views, task intelligence and plan cost.

pub mod attention;
pub mod cost;
pub mod historical;
pub mod impact;
pub mod intelligence;
pub mod linalg;
pub mod markov;
pub mod monte_carlo;
pub mod pert;
