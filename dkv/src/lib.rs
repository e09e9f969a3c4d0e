//! `dkv` is a distributed, versioned key-value object store. Entities are
//! not rows, they are histories: every commit of an entity produces an
//! immutable version identified by a SHA-1 digest of its contents and linked
//! to its predecessor, forming a per-entity hash chain. Two independently
//! evolved chains for the same entity reconcile through a deterministic,
//! per-attribute merge strategy, so nodes that exchange versions converge.
//! [Author fengyang]
//!
//! Storage is a pluggable key→bytes contract with composable adapters for
//! tiering, sharding and LRU caching; a [`drone::Drone`] binds a store to a
//! node id and moves entities in and out of it.
//!
//! ## Getting started
//!
//! ```rust
//! use dkv::attribute::Attribute;
//! use dkv::datastore::MemoryDatastore;
//! use dkv::drone::Drone;
//! use dkv::error::DResult;
//! use dkv::key::Key;
//! use dkv::model::{self, Model, Schema};
//!
//! fn main() -> DResult<()> {
//!     let schema = model::register(
//!         Schema::new("Person")
//!             .attribute(Attribute::string("first").default_value("Firstname"))
//!             .attribute(Attribute::integer("age").default_value(0i64)),
//!     );
//!
//!     let mut person = Model::new(schema, "HerpDerp");
//!     person.set_attr("first", "Herp")?;
//!     person.set_attr("age", 120i64)?;
//!     person.commit()?;
//!
//!     let mut drone = Drone::new(Key::new("/drones/d1"), Box::new(MemoryDatastore::new()));
//!     drone.put(&person)?;
//!
//!     let fetched = drone.get(&Key::new("/Person/HerpDerp"))?.unwrap();
//!     assert_eq!(fetched.version().hash(), person.version().hash());
//!
//!     Ok(())
//! }
//! ```

pub mod attribute;
pub mod config;
pub mod datastore;
pub mod drone;
pub mod error;
pub mod key;
pub mod merge;
pub mod model;
pub mod query;
pub mod serial;
pub mod time;
pub mod version;
