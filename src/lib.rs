//! CityGrid: concurrent city infrastructure simulation
//!
//! Models power and road networks as live graphs whose edges and
//! intersections are independently running actors. Builders deduplicate
//! connections and publish geometry events for a renderer; road lines carry
//! vehicles between terminus actors; a spatial index answers nearest-element
//! queries for snapping; and a procedural generator grows an infinite
//! highway as terrain regions are discovered.
//!
//! Everything communicates through channels: mailboxes per actor, broadcast
//! streams for ticks, geometry and vehicle positions. The only lock in the
//! crate guards the graph store's structure.

pub mod core;
pub mod geometry;
pub mod graph;
pub mod power;
pub mod road;
pub mod spatial;
pub mod vehicle;
