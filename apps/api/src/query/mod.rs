pub mod collection;
pub mod descriptor;
pub mod geo;

pub use collection::{Collection, ColumnKind, FieldSpec};
pub use descriptor::{QueryDescriptor, QueryLimits};
pub use geo::{to_geo_filter, SpatialFilter};
