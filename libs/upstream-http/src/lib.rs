//! reqwest-адаптеры внешних сервисов gateway: data instance (topic REST
//! API), каталог instance'ов, middleware командных каналов и схем
//! компонентов.

mod channel;
mod http;
mod schema;
mod store;

pub use channel::{HttpChannelConnector, MiddlewareChannel, MiddlewareOperation};
pub use schema::HttpSchemaConnector;
pub use store::{HttpStore, HttpStoreConnector, TopicRecord};
