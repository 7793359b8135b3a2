pub mod control;
pub mod curve;
pub mod daemon;
pub mod methods;
