pub mod ap_scaling;
pub mod catalog_errors;
pub mod comm;
pub mod config;
pub mod constants;
pub mod conversion;
pub mod cosmology;
pub mod geometry;
pub mod interpolation;
pub mod nbar;
pub mod source;
pub mod tracer_catalog;

pub use catalog_errors::CatalogError;
pub use comm::{Communicator, Role, SelfComm, ThreadComm};
pub use config::{BoxSizeSpec, TracerCatalogConfig};
pub use geometry::GlobalGeometry;
pub use tracer_catalog::{SourceKind, TracerCatalog, TracerCatalogBuilder, TracerColumn};
