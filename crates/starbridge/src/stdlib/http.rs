//! Blocking HTTP client
//!
//! Every request returns `struct(url, status_code, headers, body)`;
//! non-2xx statuses are not errors.

use std::time::Duration;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{Method, Url};
use starbridge_vm::builtins::registry::BuiltinRegistry;
use starbridge_vm::{Args, Dict, Env, Struct, Thread, Value, VmError};

use super::{module_env, opt_str_arg, str_arg};
use crate::convert::marshal_json;

pub const NAME: &str = "http";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

static CLIENT: Lazy<Result<Client, reqwest::Error>> =
    Lazy::new(|| Client::builder().timeout(REQUEST_TIMEOUT).build());

pub fn load() -> Result<Env, VmError> {
    let mut registry = BuiltinRegistry::new();
    registry.register("get", vm_get);
    registry.register("post", vm_post);
    registry.register("put", vm_put);
    registry.register("delete", vm_delete);
    module_env(NAME, registry)
}

fn vm_get(thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    request(thread, "get", Method::GET, args)
}

fn vm_post(thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    request(thread, "post", Method::POST, args)
}

fn vm_put(thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    request(thread, "put", Method::PUT, args)
}

fn vm_delete(thread: &mut Thread, args: &Args) -> Result<Value, VmError> {
    request(thread, "delete", Method::DELETE, args)
}

/// `f(url, params=None, headers=None, body=None, json_body=None)`
fn request(thread: &mut Thread, fname: &str, method: Method, args: &Args) -> Result<Value, VmError> {
    let [url, params, headers, body, json_body] =
        args.unpack(fname, ["url", "params?", "headers?", "body?", "json_body?"])?;
    thread.check_cancelled()?;

    let url = str_arg(fname, "url", &url)?;
    let url = match params {
        Value::None => Url::parse(url),
        params => Url::parse_with_params(url, string_pairs(fname, "params", &params)?),
    }
    .map_err(|e| VmError::runtime(format!("{fname}: invalid url: {e}")))?;

    let client = CLIENT
        .as_ref()
        .map_err(|e| VmError::runtime(format!("{fname}: {e}")))?;
    let mut req: RequestBuilder = client.request(method, url);
    if !headers.is_none() {
        for (name, value) in string_pairs(fname, "headers", &headers)? {
            req = req.header(name, value);
        }
    }
    if let Some(body) = opt_str_arg(fname, "body", &body)? {
        req = req.body(body.to_string());
    } else if !json_body.is_none() {
        let text = marshal_json(&json_body, 0).map_err(|e| VmError::runtime(format!("{fname}: {e}")))?;
        req = req.header("Content-Type", "application/json").body(text);
    }

    let response = req.send().map_err(|e| VmError::runtime(format!("{fname}: {e}")))?;
    response_value(fname, response)
}

fn string_pairs(fname: &str, param: &str, value: &Value) -> Result<Vec<(String, String)>, VmError> {
    let Value::Dict(dict) = value else {
        return Err(VmError::arg_type(fname, param, "dict", value));
    };
    dict.items()
        .into_iter()
        .map(|(k, v)| {
            let k = str_arg(fname, param, &k)?.to_string();
            let v = match v.as_str() {
                Some(s) => s.to_string(),
                None => v.to_str(),
            };
            Ok((k, v))
        })
        .collect()
}

fn response_value(fname: &str, response: Response) -> Result<Value, VmError> {
    let url = response.url().to_string();
    let status = response.status().as_u16();

    let headers = Dict::new();
    for name in response.headers().keys() {
        let joined = response
            .headers()
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(",");
        headers.insert(Value::string(name.as_str()), Value::string(joined))?;
    }

    let body = response
        .text()
        .map_err(|e| VmError::runtime(format!("{fname}: reading body: {e}")))?;

    let mut fields = IndexMap::new();
    fields.insert("url".to_string(), Value::string(url));
    fields.insert("status_code".to_string(), Value::Int(i64::from(status)));
    fields.insert("headers".to_string(), Value::dict(headers));
    fields.insert("body".to_string(), Value::string(body));
    Ok(Struct::new(fields).into_value())
}
