//! featpress: typeset living documentation from test-run event logs.
//!
//! Reads a Cucumber messages event log (NDJSON), reconstructs the nested
//! document → scenario → step tree by resolving the log's internal
//! cross-references, and typesets it together with a markdown narrative
//! into a single LaTeX article.
//!
//! The pipeline:
//! - [`ingest::read_log`]: NDJSON → decoded records
//! - [`project::project`]: records → normalized [`store::Store`]
//! - [`resolve::resolve`]: store entry point → reference-free tree
//! - [`narrative::parse_narrative`]: markdown → typesettable blocks
//! - [`render::render_package`]: narrative + tree → LaTeX
//!
//! The store and resolver are the core; ingest, narrative and render are
//! replaceable collaborators around them.

pub mod error;
pub mod ingest;
pub mod narrative;
pub mod project;
pub mod record;
pub mod render;
pub mod resolve;
pub mod store;
pub mod value;

pub use error::{ExitCode, PressError};
pub use project::{project, ProjectError};
pub use render::{render_package, RenderOptions};
pub use resolve::{resolve, ResolveError};
pub use store::Store;
pub use value::{Category, EntityRef, Node};
