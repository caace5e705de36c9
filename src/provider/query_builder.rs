//! `getTransactions` query assembly for the tx-indexer.
//!
//! The builder is a plain value: every filter consumes it and returns the
//! extended copy, `build` only renders.

use serde_json::Value;

use crate::{error::Error, helpers::is_identifier};

pub const UNIVERSAL_TRANSACTION_FIELDS: &str = "hash
    index
    success
    block_height
    messages {
      value {
        ... on MsgCall {
          caller
          pkg_path
          func
        }
      }
    }
    response {
      events {
        ... on GnoEvent {
          type
          pkg_path
          attrs {
            key
            value
          }
        }
      }
    }";

/// GraphQL string literal. JSON string escaping is a subset of what GraphQL
/// accepts, so the serde_json rendering is reused.
pub fn graphql_string(value: &str) -> String {
    Value::String(value.to_owned()).to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBuilder {
    operation_name: String,
    fields: String,
    conditions: Vec<String>,
    event_conditions: Vec<String>,
}

impl QueryBuilder {
    pub fn new(operation_name: &str) -> Result<QueryBuilder, Error> {
        if !is_identifier(operation_name) {
            return Err(Error::QueryConstruction(format!(
                "invalid operation name {:?}",
                operation_name
            )));
        }

        Ok(QueryBuilder {
            operation_name: operation_name.to_owned(),
            fields: UNIVERSAL_TRANSACTION_FIELDS.to_owned(),
            conditions: vec![],
            event_conditions: vec![],
        })
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    pub fn use_fields(mut self, fields: &str) -> Self {
        self.fields = fields.to_owned();
        self
    }

    pub fn add_fields(mut self, fields: &str) -> Self {
        self.fields.push_str("\n    ");
        self.fields.push_str(fields);
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.conditions
            .push(format!("success: {{ eq: {} }}", success));
        self
    }

    /// Exclusive bounds. Nothing is added when both are `None`.
    pub fn block_height_range(
        mut self,
        min: Option<i64>,
        max: Option<i64>,
    ) -> Self {
        let mut bounds = vec![];
        if let Some(min) = min {
            bounds.push(format!("gt: {}", min));
        }
        if let Some(max) = max {
            bounds.push(format!("lt: {}", max));
        }

        if !bounds.is_empty() {
            self.conditions
                .push(format!("block_height: {{ {} }}", bounds.join(", ")));
        }
        self
    }

    /// Raw filter text, inserted as is.
    pub fn condition(mut self, condition: &str) -> Self {
        self.conditions.push(condition.to_owned());
        self
    }

    pub fn event_type(mut self, event_type: &str) -> Self {
        self.event_conditions
            .push(format!("type: {{ eq: {} }}", graphql_string(event_type)));
        self
    }

    pub fn market_id(mut self, market_id: &str) -> Self {
        self.event_conditions.push(format!(
            "attrs: {{ key: {{ eq: \"market_id\" }}, value: {{ eq: {} }} }}",
            graphql_string(market_id)
        ));
        self
    }

    pub fn reset(mut self) -> Self {
        self.conditions.clear();
        self.event_conditions.clear();
        self
    }

    fn where_clause(&self) -> String {
        let mut conditions = self.conditions.clone();

        if !self.event_conditions.is_empty() {
            conditions.push(format!(
                "response: {{\n        events: {{\n          GnoEvent: {{\n            {}\n          }}\n        }}\n      }}",
                self.event_conditions.join("\n            ")
            ));
        }

        conditions
            .into_iter()
            .filter(|condition| !condition.is_empty())
            .collect::<Vec<String>>()
            .join("\n      ")
    }

    pub fn build(&self) -> String {
        format!(
            "query {} {{\n  getTransactions(\n    where: {{\n      {}\n    }}\n  ) {{\n    {}\n  }}\n}}",
            self.operation_name,
            self.where_clause(),
            self.fields
        )
    }
}
