use command_dispatch::{ChannelHandle, CommandDispatcher, CommandRequest, DispatchError};
use commander_api::{BoxFuture, ClientError, ComponentKey, Connector, TopicCategory};
use component_catalog::{CatalogError, ComponentCatalog, MetadataMap, SchemaHandle, TopicDataMap, TopicNamesMap};
use efd_reports::{BumpTestReport, BumpTestRequest, ReportError, Reports};
use query_fanout::{FanoutError, FanoutResult, QueryFanout, QueryMode, SourceTree, StoreHandle};

/// Исполнение команд компонентов (то, что нужно HTTP-слою от dispatcher'а).
pub trait CommandService: Send + Sync {
    fn dispatch<'a>(&'a self, request: &'a CommandRequest) -> BoxFuture<'a, Result<String, DispatchError>>;
}

/// Запросы к data instance'ам.
pub trait QueryService: Send + Sync {
    fn run<'a>(
        &'a self,
        instance: &'a str,
        tree: &'a SourceTree,
        mode: &'a QueryMode,
    ) -> BoxFuture<'a, Result<FanoutResult, FanoutError>>;

    fn list_instances(&self) -> BoxFuture<'_, Result<Vec<String>, ClientError>>;
}

/// Описания интерфейсов компонентов.
pub trait CatalogService: Send + Sync {
    fn metadata(&self) -> BoxFuture<'_, Result<MetadataMap, CatalogError>>;

    fn topic_names<'a>(&'a self, categories: &'a [TopicCategory]) -> BoxFuture<'a, Result<TopicNamesMap, CatalogError>>;

    fn topic_data<'a>(&'a self, categories: &'a [TopicCategory]) -> BoxFuture<'a, Result<TopicDataMap, CatalogError>>;
}

/// Отчёты поверх data instance'ов.
pub trait ReportService: Send + Sync {
    fn m1m3_bump_tests<'a>(&'a self, request: &'a BumpTestRequest) -> BoxFuture<'a, Result<BumpTestReport, ReportError>>;
}

impl<C> CommandService for CommandDispatcher<C>
where
    C: Connector<Key = ComponentKey, Handle = ChannelHandle>,
{
    fn dispatch<'a>(&'a self, request: &'a CommandRequest) -> BoxFuture<'a, Result<String, DispatchError>> {
        Box::pin(CommandDispatcher::dispatch(self, request))
    }
}

impl<C> QueryService for QueryFanout<C>
where
    C: Connector<Key = String, Handle = StoreHandle>,
{
    fn run<'a>(
        &'a self,
        instance: &'a str,
        tree: &'a SourceTree,
        mode: &'a QueryMode,
    ) -> BoxFuture<'a, Result<FanoutResult, FanoutError>> {
        Box::pin(QueryFanout::run(self, instance, tree, mode))
    }

    fn list_instances(&self) -> BoxFuture<'_, Result<Vec<String>, ClientError>> {
        Box::pin(self.stores().list_available_endpoints())
    }
}

impl<C> CatalogService for ComponentCatalog<C>
where
    C: Connector<Key = String, Handle = SchemaHandle>,
{
    fn metadata(&self) -> BoxFuture<'_, Result<MetadataMap, CatalogError>> {
        Box::pin(ComponentCatalog::metadata(self))
    }

    fn topic_names<'a>(&'a self, categories: &'a [TopicCategory]) -> BoxFuture<'a, Result<TopicNamesMap, CatalogError>> {
        Box::pin(ComponentCatalog::topic_names(self, categories))
    }

    fn topic_data<'a>(&'a self, categories: &'a [TopicCategory]) -> BoxFuture<'a, Result<TopicDataMap, CatalogError>> {
        Box::pin(ComponentCatalog::topic_data(self, categories))
    }
}

impl<C> ReportService for Reports<C>
where
    C: Connector<Key = String, Handle = StoreHandle>,
{
    fn m1m3_bump_tests<'a>(&'a self, request: &'a BumpTestRequest) -> BoxFuture<'a, Result<BumpTestReport, ReportError>> {
        Box::pin(Reports::m1m3_bump_tests(self, request))
    }
}
