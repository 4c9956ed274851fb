//! Shared contracts of the commander gateway: keys, samples, time helpers,
//! component interface descriptions, the collaborator error type and the
//! traits implemented by upstream adapters (connectors, time-series stores,
//! command channels).

pub mod catalog;
pub mod command;
pub mod connector;
pub mod error;
pub mod store;
pub mod types;

pub use catalog::{ComponentMetadata, ComponentSchema, FieldInfo, TopicCategory, TopicFields};
pub use command::{AckProgress, AckStage, CommandChannel, CommandParams, Operation, OperationTable};
pub use connector::Connector;
pub use error::{ClientError, ErrorKind};
pub use store::{SeriesQuery, TimeSeriesStore, TopNQuery};
pub use types::{
    ComponentKey, FieldFrame, LogRow, Sample, SortOrder, TimeRange, TimeScale, TopicRef,
    format_ts, parse_datetime,
};

pub use futures::future::BoxFuture;
