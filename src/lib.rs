//! spinedb – a staged, checked object-relational mapping over a Spine
//! database stored in SQLite.
//!
//! A Spine database describes a model as *entities* with *parameters*:
//! * An [`model::EntityClass`] is either an object class or a relationship
//!   class; a relationship class lists its member object classes by dimension.
//! * An [`model::Entity`] is either an object or a relationship, whose members
//!   must follow the member classes of its class in order.
//! * A [`model::ParameterDefinition`] belongs to an entity class and may be
//!   restricted to the values of a [`model::ParameterValueList`].
//! * A [`model::ParameterValue`] holds one encoded value per entity, parameter
//!   and [`model::Alternative`]. A [`model::Scenario`] ranks alternatives; the
//!   higher rank wins.
//!
//! Rows live in a normalized schema; typed and "wide" records are reassembled
//! by composed views that the mapping memoizes and invalidates per table.
//!
//! ## Modules
//! * [`schema`] – The statically declared tables, startup verification and
//!   bootstrap of fresh databases.
//! * [`model`] – Records read back through the views.
//! * [`view`] – Composed views, the view cache with its dependency graph and
//!   the [`view::ViewProvider`] seam filters plug into.
//! * [`check`] – Pure integrity checks, one per kind, over caller-supplied lookups.
//! * [`kinds`] – How each kind is looked up, laid out as rows and cascaded on removal.
//! * [`staging`] – Tracked ids and shadow tables of the open staging session.
//! * [`persist`] – Merges a committed session into the original tables.
//! * [`allocator`] – Collision-free id reservation shared by every writer.
//! * [`filter`] – Scenario, alternative and tool filters.
//! * [`mapping`] – [`mapping::DatabaseMapping`], tying it all together.
//!
//! ## Staging
//! Writes never touch the original tables directly. They are checked, given
//! ids by the [`allocator::IdAllocator`] and written to connection-private
//! shadow tables; reads see the shadow rows merged with the original rows
//! they have not superseded. [`mapping::DatabaseMapping::commit_session`]
//! merges everything in one transaction under a single commit row, while
//! [`mapping::DatabaseMapping::rollback_session`] drops it.
//!
//! ## Quick Start
//! ```
//! use spinedb::check::{AlternativeItem, Mode};
//! use spinedb::config::MappingConfig;
//! use spinedb::mapping::DatabaseMapping;
//! use spinedb::model::Alternative;
//!
//! let config = MappingConfig { create: true, ..MappingConfig::default() };
//! let mut db = DatabaseMapping::open(&config).unwrap();
//! let item = AlternativeItem { name: Some("high_demand".into()), ..Default::default() };
//! let (added, errors) = db.add_alternatives(vec![item], Mode::strict()).unwrap();
//! assert_eq!(added.len(), 1);
//! assert!(errors.is_empty());
//! db.commit_session("Add an alternative").unwrap();
//! assert_eq!(db.query::<Alternative>().unwrap().len(), 2);
//! ```

pub mod allocator;
pub mod check;
pub mod config;
pub mod error;
pub mod filter;
pub mod kinds;
pub mod mapping;
pub mod model;
pub mod persist;
pub mod schema;
pub mod snapshot;
pub mod staging;
pub mod value;
pub mod view;
