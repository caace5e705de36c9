use bigdecimal::BigDecimal;
use serde::Serialize;
use serde_json::Value;

use crate::{
    custom_uint::UnsignedBigInt,
    error::Error,
    types::schema::{
        array, bool_field, child_path, field, index_path,
        non_negative_int_field, object, optional_string_field, string_field,
        uint_field, Validate,
    },
};

/// Scale of the fixed point rates (`borrowAPR`, `supplyAPR`, `utilization`,
/// `lltv`, `currentPrice`).
pub const RATE_DECIMALS: u32 = 18;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Market {
    pub total_supply_assets: UnsignedBigInt,
    pub total_supply_shares: UnsignedBigInt,
    pub total_borrow_assets: UnsignedBigInt,
    pub total_borrow_shares: UnsignedBigInt,
    pub last_update: u64,
    pub fee: UnsignedBigInt,
}

impl Validate for Market {
    fn validate(value: &Value, path: &str) -> Result<Self, Error> {
        let map = object(value, path)?;
        Ok(Market {
            total_supply_assets: uint_field(map, path, "totalSupplyAssets")?,
            total_supply_shares: uint_field(map, path, "totalSupplyShares")?,
            total_borrow_assets: uint_field(map, path, "totalBorrowAssets")?,
            total_borrow_shares: uint_field(map, path, "totalBorrowShares")?,
            last_update: non_negative_int_field(map, path, "lastUpdate")?,
            fee: uint_field(map, path, "fee")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketParams {
    pub pool_path: String,
    pub irm: String,
    pub lltv: UnsignedBigInt,
    pub is_token0_loan: bool,
}

impl Validate for MarketParams {
    fn validate(value: &Value, path: &str) -> Result<Self, Error> {
        let map = object(value, path)?;
        Ok(MarketParams {
            pool_path: string_field(map, path, "poolPath")?,
            irm: string_field(map, path, "irm")?,
            lltv: uint_field(map, path, "lltv")?,
            is_token0_loan: bool_field(map, path, "isToken0Loan")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketInfo {
    #[serde(flatten)]
    pub market: Market,
    #[serde(flatten)]
    pub params: MarketParams,
    pub loan_token: TokenInfo,
    pub collateral_token: TokenInfo,
    pub current_price: String,
    #[serde(rename = "borrowAPR")]
    pub borrow_apr: UnsignedBigInt,
    #[serde(rename = "supplyAPR")]
    pub supply_apr: UnsignedBigInt,
    pub utilization: UnsignedBigInt,
    pub market_id: Option<String>,
}

impl MarketInfo {
    pub fn pool_path(&self) -> &str {
        &self.params.pool_path
    }

    /// `borrowAPR` as a plain ratio, `0.05` for 5%.
    pub fn borrow_apr_ratio(&self) -> BigDecimal {
        self.borrow_apr.to_decimal(RATE_DECIMALS)
    }

    pub fn supply_apr_ratio(&self) -> BigDecimal {
        self.supply_apr.to_decimal(RATE_DECIMALS)
    }

    pub fn utilization_ratio(&self) -> BigDecimal {
        self.utilization.to_decimal(RATE_DECIMALS)
    }
}

fn token_info(
    value: &Value,
    path: &str,
    prefix: &str,
) -> Result<TokenInfo, Error> {
    let map = object(value, path)?;
    let decimals_key = format!("{}Decimals", prefix);
    let decimals = non_negative_int_field(map, path, &decimals_key)?;

    Ok(TokenInfo {
        address: string_field(map, path, prefix)?,
        name: string_field(map, path, &format!("{}Name", prefix))?,
        symbol: string_field(map, path, &format!("{}Symbol", prefix))?,
        decimals: u32::try_from(decimals).map_err(|_| {
            Error::schema(child_path(path, &decimals_key), decimals)
        })?,
    })
}

impl Validate for MarketInfo {
    fn validate(value: &Value, path: &str) -> Result<Self, Error> {
        let map = object(value, path)?;
        Ok(MarketInfo {
            market: Market::validate(value, path)?,
            params: MarketParams::validate(value, path)?,
            loan_token: token_info(value, path, "loanToken")?,
            collateral_token: token_info(value, path, "collateralToken")?,
            current_price: string_field(map, path, "currentPrice")?,
            borrow_apr: uint_field(map, path, "borrowAPR")?,
            supply_apr: uint_field(map, path, "supplyAPR")?,
            utilization: uint_field(map, path, "utilization")?,
            market_id: optional_string_field(map, path, "marketId")?,
        })
    }
}

/// One `{ "<market id>": { ... } }` entry of a realm listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedMarket<T> {
    pub market_id: String,
    pub market: T,
}

fn listed_entries<T: Validate>(
    items: &[Value],
    path: &str,
) -> Result<Vec<ListedMarket<T>>, Error> {
    let mut data = vec![];

    for (index, item) in items.iter().enumerate() {
        let item_path = index_path(path, index);
        for (market_id, value) in object(item, &item_path)? {
            let market = T::validate(value, &child_path(&item_path, market_id))?;
            data.push(ListedMarket {
                market_id: market_id.to_owned(),
                market,
            });
        }
    }

    Ok(data)
}

/// `ApiListMarkets` returns `{ "markets": [ { "<id>": Market }, ... ] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketList(pub Vec<ListedMarket<Market>>);

impl Validate for MarketList {
    fn validate(value: &Value, path: &str) -> Result<Self, Error> {
        let map = object(value, path)?;
        let markets_path = child_path(path, "markets");
        let items = array(field(map, path, "markets")?, &markets_path)?;
        Ok(MarketList(listed_entries(items, &markets_path)?))
    }
}

/// `ApiListMarketsInfo` returns `[ { "<id>": MarketInfo }, ... ]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketInfoList(pub Vec<ListedMarket<MarketInfo>>);

impl Validate for MarketInfoList {
    fn validate(value: &Value, path: &str) -> Result<Self, Error> {
        let items = array(value, path)?;
        Ok(MarketInfoList(listed_entries(items, path)?))
    }
}
