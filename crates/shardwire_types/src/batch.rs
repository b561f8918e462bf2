//! Keyspace-id addressed batch requests.

use crate::error::WireResult;
use crate::keyspace::KeyspaceId;
use crate::query::BoundQuery;
use crate::topo::{TabletType, Target};
use crate::wire;
use crate::TransactionId;
use serde::{Deserialize, Serialize};

/// Identity of the end user on whose behalf a request runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerId {
    /// Principal (user) name.
    pub principal: String,
    /// Calling component.
    pub component: String,
    /// Calling sub-component.
    pub subcomponent: String,
}

impl CallerId {
    /// Creates a caller id.
    pub fn new(
        principal: impl Into<String>,
        component: impl Into<String>,
        subcomponent: impl Into<String>,
    ) -> Self {
        Self {
            principal: principal.into(),
            component: component.into(),
            subcomponent: subcomponent.into(),
        }
    }
}

/// A query addressed to the shards owning a set of keyspace ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundKeyspaceIdQuery {
    /// The query to run.
    pub query: BoundQuery,
    /// Keyspace the ids belong to.
    pub keyspace: String,
    /// Keyspace ids whose owning shards must run the query.
    pub keyspace_ids: Vec<KeyspaceId>,
}

/// A transaction held open on one shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSession {
    /// Shard owning the transaction.
    pub target: Target,
    /// Transaction id on that shard.
    pub transaction_id: TransactionId,
}

/// Client-held transaction state spanning several shards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Whether the client is inside a transaction.
    pub in_transaction: bool,
    /// Open per-shard transactions.
    pub shard_sessions: Vec<ShardSession>,
}

impl Session {
    /// Returns the transaction id held on a target, or 0.
    pub fn transaction_id(&self, target: &Target) -> TransactionId {
        self.shard_sessions
            .iter()
            .find(|s| &s.target == target)
            .map(|s| s.transaction_id)
            .unwrap_or(0)
    }
}

/// A batch of keyspace-id addressed queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyspaceIdBatchQuery {
    /// Caller identity, if forwarded.
    pub caller_id: Option<CallerId>,
    /// Queries in execution order.
    pub queries: Vec<BoundKeyspaceIdQuery>,
    /// Tablet role to route to.
    pub tablet_type: TabletType,
    /// Run each shard's part as its own transaction.
    pub as_transaction: bool,
    /// Session carrying open transactions, if any.
    pub session: Option<Session>,
}

impl KeyspaceIdBatchQuery {
    /// Creates a batch without caller id or session.
    pub fn new(queries: Vec<BoundKeyspaceIdQuery>, tablet_type: TabletType) -> Self {
        Self {
            caller_id: None,
            queries,
            tablet_type,
            as_transaction: false,
            session: None,
        }
    }

    /// Encodes to CBOR.
    pub fn encode(&self) -> WireResult<Vec<u8>> {
        wire::to_cbor(self)
    }

    /// Decodes from CBOR.
    pub fn decode(bytes: &[u8]) -> WireResult<Self> {
        wire::from_cbor(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn sample_query() -> BoundKeyspaceIdQuery {
        BoundKeyspaceIdQuery {
            query: BoundQuery::new("update t set v = :v where id = :id")
                .with_bind("v", Value::from_text("x"))
                .with_bind("id", 7),
            keyspace: "user".into(),
            keyspace_ids: vec![KeyspaceId::new(vec![0x10, 0x20])],
        }
    }

    #[test]
    fn absent_optionals_stay_absent() {
        let batch = KeyspaceIdBatchQuery::new(vec![sample_query()], TabletType::Master);
        let decoded = KeyspaceIdBatchQuery::decode(&batch.encode().unwrap()).unwrap();
        assert_eq!(decoded.caller_id, None);
        assert_eq!(decoded.session, None);
        assert_eq!(decoded, batch);
    }

    #[test]
    fn populated_batch_survives_encoding() {
        let target = Target::new("user", "-80", TabletType::Master);
        let mut batch = KeyspaceIdBatchQuery::new(vec![sample_query()], TabletType::Master);
        batch.caller_id = Some(CallerId::new("alice", "gate", "batch"));
        batch.as_transaction = true;
        batch.session = Some(Session {
            in_transaction: true,
            shard_sessions: vec![ShardSession {
                target: target.clone(),
                transaction_id: 99,
            }],
        });

        let decoded = KeyspaceIdBatchQuery::decode(&batch.encode().unwrap()).unwrap();
        assert_eq!(decoded, batch);
        assert_eq!(decoded.session.unwrap().transaction_id(&target), 99);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(KeyspaceIdBatchQuery::decode(&[0xff, 0x00, 0x13]).is_err());
    }
}
