pub mod extract;
pub mod mapping;
pub mod normalize;
pub mod resolver;

pub use extract::{EdgeExtractor, Extraction, UnresolvedRow, WeightParseError};
pub use mapping::{validate, validate_json, ColumnRole, MappingError, MappingViolation};
pub use normalize::{NameNormalizer, NameSplitter};
pub use resolver::{EntityResolver, Roster};
