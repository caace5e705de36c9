pub use self::{
    abci_response::{AbciQueryBody, BodyError},
    indexer_response::{
        Attributes, BlockTime, GraphQLBody, GraphQLError, Transaction,
        TxEvent, TxResponse,
    },
    market::{
        ListedMarket, Market, MarketInfo, MarketInfoList, MarketList,
        MarketParams, TokenInfo, RATE_DECIMALS,
    },
    position::{HealthFactor, LoanAmount, Position, UserLoan},
    schema::{parse_validated, Validate},
};

#[cfg(test)]
pub(crate) use self::market::tests::market_info_json;

mod abci_response;
mod indexer_response;
mod market;
mod position;
pub mod schema;
