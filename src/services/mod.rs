pub mod link_cache;
pub mod link_resolver;
pub mod record_extractor;
pub mod result_writer;

pub use link_cache::LinkCache;
pub use link_resolver::LinkResolver;
pub use record_extractor::{Extraction, RecordExtractor};
pub use result_writer::{ResultWriter, WrittenFiles};
