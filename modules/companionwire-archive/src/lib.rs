pub mod connector;
pub mod og_image;
pub mod sources;
pub mod syndication;
pub mod text_extract;

pub use connector::{Connector, ConnectorRegistry, FetchOutcome, FetchedItem, SourceConfig};
pub use syndication::SyndicationConnector;
