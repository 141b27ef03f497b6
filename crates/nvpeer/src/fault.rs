//! # Fault Classification
//!
//! The host reports a failed call as a two-element `[code, detail]` error value
//! in the response. The code says whose fault it was.

use nvwire::Value;

use crate::error::Error;

/// The host raised an exception while running the method.
pub const EXCEPTION: i64 = 0;
/// The host rejected the call's arguments.
pub const VALIDATION: i64 = 1;

/// Turns a non-nil response error value into a typed error for `method`.
///
/// The leading code alone decides the kind; the detail may be any value.
pub fn classify(method: &str, error: Value) -> Error {
    let method = method.to_string();
    let coded = match &error {
        Value::Array(fields) if fields.len() == 2 => match fields[0].as_i64() {
            Some(code @ (EXCEPTION | VALIDATION)) => Some((code, detail(&fields[1]))),
            _ => None,
        },
        _ => None,
    };
    match coded {
        Some((EXCEPTION, detail)) => Error::Exception { method, detail },
        Some((_, detail)) => Error::Validation { method, detail },
        None => Error::Remote { method, value: error },
    }
}

/// Renders an error detail as text. Strings are taken as they are, and bytes
/// that are not valid UTF-8 are converted lossily.
fn detail(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Binary(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        other => other.to_string(),
    }
}

/// Splits a response into its result or its classified failure.
pub fn check(method: &str, error: Value, result: Value) -> Result<Value, Error> {
    if error.is_nil() {
        Ok(result)
    } else {
        Err(classify(method, error))
    }
}
