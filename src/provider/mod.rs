pub use self::{
    http::HTTP,
    indexer::IndexerClient,
    query_builder::{QueryBuilder, UNIVERSAL_TRANSACTION_FIELDS},
    state_query::{Expression, StateQueryClient},
    transport::{IndexerTransport, RequestOptions, StateTransport},
};

mod http;
mod indexer;
mod query_builder;
mod state_query;
mod transport;
