//! Conversion between records and remote documents

use serde_json::Value;

use super::{Document, RemoteDocument};
use crate::error::{Error, Result};
use crate::models::Entity;

/// Owner of the document
pub const USER_ID_FIELD: &str = "userId";
/// Local id of the record the document stores, as a string
pub const LOCAL_ID_FIELD: &str = "localId";
/// Parent trip of child documents
pub const TRIP_ID_FIELD: &str = "tripId";

/// Serialize a record into a document owned by `user_id`
pub fn entity_to_document<E: Entity>(entity: &E, user_id: &str) -> Result<Document> {
    match serde_json::to_value(entity)? {
        Value::Object(mut document) => {
            document.insert(USER_ID_FIELD.to_string(), Value::from(user_id));
            document.insert(LOCAL_ID_FIELD.to_string(), Value::from(entity.local_id()));
            Ok(document)
        }
        other => Err(Error::InvalidInput(format!(
            "{} record did not serialize to an object: {other}",
            E::COLLECTION
        ))),
    }
}

/// Deserialize a record from a document, ignoring the bookkeeping fields
pub fn entity_from_document<E: Entity>(document: &RemoteDocument) -> Result<E> {
    let mut data = document.data.clone();
    data.remove(USER_ID_FIELD);
    data.remove(LOCAL_ID_FIELD);
    Ok(serde_json::from_value(Value::Object(data))?)
}

/// Local id embedded in a document, if any
pub fn embedded_local_id(document: &RemoteDocument) -> Option<String> {
    match document.data.get(LOCAL_ID_FIELD)? {
        Value::String(local_id) => Some(local_id.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
