//! JSON encoding of guest values

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::{Map, Number, Value as Json};
use starbridge_vm::{Dict, Value};

use super::{from_guest, HostValue};
use crate::error::ConvertError;

fn host_to_json(value: &HostValue) -> Result<Json, ConvertError> {
    Ok(match value {
        HostValue::None => Json::Null,
        HostValue::Bool(b) => Json::Bool(*b),
        HostValue::Int(i) => Json::from(*i),
        HostValue::UInt(u) => Json::from(*u),
        HostValue::Float(f) => Number::from_f64(*f)
            .map(Json::Number)
            .ok_or_else(|| ConvertError::Json(format!("unsupported value: {f}")))?,
        HostValue::String(s) => Json::String(s.clone()),
        HostValue::Time(t) => Json::String(t.to_rfc3339()),
        HostValue::List(items) => Json::Array(items.iter().map(host_to_json).collect::<Result<_, _>>()?),
        HostValue::Map(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), host_to_json(v)?);
            }
            Json::Object(out)
        }
        HostValue::ValueMap(pairs) => {
            let mut out = Map::new();
            for (k, v) in pairs {
                out.insert(k.to_string(), host_to_json(v)?);
            }
            Json::Object(out)
        }
        HostValue::Wrapped(w) => host_to_json(w.unwrap()?)?,
        HostValue::Guest(v) => host_to_json(&from_guest(v)?)?,
        other => {
            return Err(ConvertError::Json(format!("unsupported type: {}", other.kind())));
        }
    })
}

/// Encode a guest value as JSON
///
/// `indent == 0` gives compact single-line output; otherwise the output
/// is pretty-printed with `indent` spaces per level.
pub fn marshal_json(value: &Value, indent: usize) -> Result<String, ConvertError> {
    let json = host_to_json(&from_guest(value)?)?;
    if indent == 0 {
        return serde_json::to_string(&json).map_err(|e| ConvertError::Json(e.to_string()));
    }
    let pad = " ".repeat(indent);
    let mut out = Vec::new();
    let mut ser = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(pad.as_bytes()));
    json.serialize(&mut ser)
        .map_err(|e| ConvertError::Json(e.to_string()))?;
    String::from_utf8(out).map_err(|e| ConvertError::Json(e.to_string()))
}

/// Decode JSON text into a guest value
pub fn unmarshal_json(text: &str) -> Result<Value, ConvertError> {
    let json: Json = serde_json::from_str(text).map_err(|e| ConvertError::Json(e.to_string()))?;
    json_to_guest(&json)
}

/// Objects become dicts, integral numbers ints, other numbers floats
pub fn json_to_guest(json: &Json) -> Result<Value, ConvertError> {
    Ok(match json {
        Json::Null => Value::None,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Json::String(s) => Value::string(s),
        Json::Array(items) => Value::list(items.iter().map(json_to_guest).collect::<Result<_, _>>()?),
        Json::Object(map) => {
            let dict = Dict::new();
            for (k, v) in map {
                dict.insert(Value::string(k), json_to_guest(v)?)?;
            }
            Value::dict(dict)
        }
    })
}
