//! Algorithms for Reducer Sync
//!
//! - Dependency graph builder (cycle rejection)
//! - Kahn's topological sort
//! - Start-point normalization
//! - Safe intersection
//! - Mass-rollback guard

pub mod dependency_builder;
pub mod kahns;
pub mod rollback;
pub mod safe_intersection;
pub mod start_point;

pub use dependency_builder::build_dependency_graph;
pub use kahns::kahns_topological_sort;
pub use rollback::check_rollback_depth;
pub use safe_intersection::safe_intersection_points;
pub use start_point::initialize_all_reducer_states;
