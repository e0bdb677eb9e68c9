//! Storefront domain: value objects, aggregates, catalog queries and events.
pub mod aggregates;
pub mod catalog;
pub mod events;
pub mod value_objects;
