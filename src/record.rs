use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::schema::parse_int;

/// One entity instance: the service-assigned `Id` plus a flat field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i64,
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&Value> {
        if name == "Id" {
            return None;
        }
        self.fields.get(name)
    }

    /// Field rendered as text for matching: strings as-is, numbers and booleans in
    /// their JSON form, null and absent as empty.
    pub fn text(&self, name: &str) -> String {
        if name == "Id" {
            return self.id.to_string();
        }
        match self.fields.get(name) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut obj = Map::with_capacity(self.fields.len() + 1);
        obj.insert("Id".to_string(), Value::from(self.id));
        for (k, v) in &self.fields {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }

    /// Splits a service record object into `Id` and fields. `None` when the object
    /// carries no usable identifier.
    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let id = obj.get("Id").and_then(parse_record_id)?;
        let fields = obj
            .iter()
            .filter(|(k, _)| k.as_str() != "Id")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Some(Self { id, fields })
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Record::from_json(&value).ok_or_else(|| serde::de::Error::custom("record without a numeric Id"))
    }
}

/// Normalizes an identifier given as a JSON number or a numeric string.
pub fn parse_record_id(v: &Value) -> Option<i64> {
    parse_int(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_json_is_flat_with_id() {
        let r = Record::from_json(&json!({ "Id": "12", "title": "Alpha", "done": false }))
            .expect("record");
        assert_eq!(r.id, 12);
        assert_eq!(r.text("title"), "Alpha");
        assert_eq!(r.text("done"), "false");
        assert_eq!(r.text("missing"), "");
        assert_eq!(r.to_json(), json!({ "Id": 12, "title": "Alpha", "done": false }));
    }

    #[test]
    fn record_without_id_is_rejected() {
        assert!(Record::from_json(&json!({ "title": "x" })).is_none());
        assert!(serde_json::from_value::<Record>(json!({ "Id": "abc" })).is_err());
    }
}
