//! Event schemas published by the unit producer

pub mod outbound;

pub use outbound::UnitProducedEvent;
