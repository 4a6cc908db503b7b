//! Thread abstractions: a stoppable [`managed::ManagedThread`] worker and the
//! [`threadloop::Threadloop`] plugin base built on top of it.

pub mod managed;
pub mod threadloop;
