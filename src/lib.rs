pub mod error;
pub mod output;
pub mod parser;
pub mod timeseries;
pub mod transform;

pub use error::{AggregateError, ConfigurationError, SeriesError};
pub use timeseries::{Flags, IntervalType, Metadata, Record, TimeSeries, TimeStep};
pub use transform::aggregate::{DEFAULT_MISSING_FLAG, aggregate};
pub use transform::method::Method;
pub use transform::regularize::{DEFAULT_INSERTED_FLAG, regularize};
