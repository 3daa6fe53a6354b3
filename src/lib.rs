//! Location-based directory service.
//!
//! RouteGuide answers four kinds of calls against a fixed set of named map features:
//!
//! | Call | Shape | What it does |
//! |------|-------|--------------|
//! | **GetFeature** | unary | Feature at an exact point, or an unnamed one |
//! | **ListFeatures** | server streaming | Every named feature inside a rectangle |
//! | **RecordRoute** | client streaming | Point/feature counts, distance and duration of a route |
//! | **RouteChat** | bidirectional | Notes shared with everyone chatting at the same point |
//!
//! Coordinates are degrees × 1e7 stored as `i32`; see [`geo::Point`].
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`geo`] — Message types and great-circle distance
//! - [`store`] — Immutable feature store and feature database loading
//! - [`route`] — Per-call route recorder state machine
//! - [`chat`] — Location-scoped note history and live fan-out
//! - [`service`] — The four calls, transport-independent
//! - [`server`] — HTTP/WebSocket binding

pub mod chat;
pub mod config;
pub mod geo;
pub mod route;
pub mod server;
pub mod service;
pub mod store;
