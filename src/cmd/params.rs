/*!
params.rs - turning CLI tokens and piped JSON into call params.

  coerce("3")         -> 3
  coerce("true")      -> true
  coerce("bob")       -> "bob"
  coerce("{\"a\":1}") -> {"a":1}

  build_params(["[1,2,3]"])            -> [1,2,3]
  build_params(["a=1","b=true","c=x"]) -> {"a":1,"b":true,"c":"x"}
  build_params([])                     -> null

Numbers keep their decimal text (serde_json `arbitrary_precision`), so large
integers pass through untouched.
*/

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value};
use std::io::Read;

/// Parse a token as a JSON literal, falling back to the token as a string.
pub fn coerce(token: &str) -> Value {
    serde_json::from_str(token).unwrap_or_else(|_| Value::String(token.to_string()))
}

/// Build the params value for one call from argument tokens.
pub fn build_params(args: &[String]) -> Result<Value> {
    match args {
        [] => return Ok(Value::Null),
        [only] => {
            if let Ok(value) = serde_json::from_str::<Value>(only) {
                return Ok(value);
            }
        }
        _ => {}
    }

    let mut map = Map::new();
    for arg in args {
        let Some((key, value)) = arg.split_once('=') else {
            bail!("invalid argument '{arg}' (expected KEY=VALUE)");
        };
        map.insert(key.to_string(), coerce(value));
    }
    Ok(Value::Object(map))
}

/// Decode successive whole JSON values from `reader`.
pub fn decode_stream<R: Read>(reader: R) -> impl Iterator<Item = Result<Value>> {
    serde_json::Deserializer::from_reader(reader)
        .into_iter::<Value>()
        .map(|item| item.context("invalid JSON in input stream"))
}
