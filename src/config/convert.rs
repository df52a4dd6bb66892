//! Backtick special-value conversion
//!
//! The decoded content of a backtick string is matched against the
//! recognized patterns in order; the first match wins:
//!
//! 1. ISO date or date-time (with optional fractional seconds and offset)
//! 2. Environment variable, `$NAME` or `$NAME|default`
//! 3. Dotted host-object path, resolved through an injected callback
//! 4. Interpolation: any text containing `${path}` placeholders
//!
//! When nothing matches the result is `None`; the engine then either fails
//! (strict conversions) or passes the text through unchanged.

use std::env;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use lazy_static::lazy_static;
use log::warn;
use regex::{Captures, Regex};

use crate::config::engine::Config;
use crate::config::value::Value;

lazy_static! {
    static ref ISO_DATETIME_PATTERN: Regex = Regex::new(
        r"^(\d{4})-(\d{2})-(\d{2})(([ T])(((\d{2}):(\d{2}):(\d{2}))(\.\d{1,6})?(([+-])(\d{2}):(\d{2})(:(\d{2})(\.\d{1,6})?)?)?))?$"
    )
    .expect("couldn't compile date-time regex");
    static ref ENV_VALUE_PATTERN: Regex =
        Regex::new(r"^\$(\w+)(\|(.*))?$").expect("couldn't compile env-value regex");
    static ref DOTTED_OBJECT_PATTERN: Regex =
        Regex::new(r"^[A-Za-z_]\w*(\.[A-Za-z_]\w*)*$").expect("couldn't compile dotted regex");
    static ref INTERPOLATION_PATTERN: Regex =
        Regex::new(r"\$\{([^}]+)\}").expect("couldn't compile interpolation regex");
}

/// Apply the special-value patterns to `s`, in order. Returns `None` when
/// no pattern matches, or when a matching pattern fails to produce a value.
pub(crate) fn convert(s: &str, cfg: &Config) -> Option<Value> {
    if let Some(groups) = ISO_DATETIME_PATTERN.captures(s) {
        return convert_datetime(&groups);
    }
    if let Some(groups) = ENV_VALUE_PATTERN.captures(s) {
        return convert_env(&groups, cfg);
    }
    if DOTTED_OBJECT_PATTERN.is_match(s) {
        // host-object lookup; an unresolved name converts to itself
        if let Some(resolver) = cfg.host_resolver() {
            if let Some(v) = resolver(s) {
                return Some(v);
            }
        }
        return Some(Value::Str(s.to_string()));
    }
    if INTERPOLATION_PATTERN.is_match(s) {
        return interpolate(s, cfg);
    }
    None
}

fn group_u32(caps: &Captures, i: usize) -> Option<u32> {
    caps.get(i)?.as_str().parse().ok()
}

fn group_i32(caps: &Captures, i: usize) -> Option<i32> {
    caps.get(i)?.as_str().parse().ok()
}

fn convert_datetime(caps: &Captures) -> Option<Value> {
    let year = group_i32(caps, 1)?;
    let month = group_u32(caps, 2)?;
    let day = group_u32(caps, 3)?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    if caps.get(5).is_none() {
        return Some(Value::Date(date));
    }
    let hour = group_u32(caps, 8)?;
    let minute = group_u32(caps, 9)?;
    let second = group_u32(caps, 10)?;
    let nanos = match caps.get(11) {
        None => 0,
        // the group includes the leading dot, so it parses as a fraction
        Some(frac) => (frac.as_str().parse::<f64>().ok()? * 1e9).round() as u32,
    };
    let time = NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)?;
    let naive = NaiveDateTime::new(date, time);
    let offset_seconds = if caps.get(13).is_none() {
        0
    } else {
        let sign = if caps.get(13)?.as_str() == "-" { -1 } else { 1 };
        let oh = group_i32(caps, 14)?;
        let om = group_i32(caps, 15)?;
        let os = group_i32(caps, 17).unwrap_or(0);
        sign * (os + om * 60 + oh * 3600)
    };
    let offset = FixedOffset::east_opt(offset_seconds)?;
    let result = offset.from_local_datetime(&naive).single()?;
    Some(Value::DateTime(result))
}

fn convert_env(caps: &Captures, cfg: &Config) -> Option<Value> {
    let name = caps.get(1)?.as_str();

    match env::var(name) {
        Ok(v) => Some(Value::Str(v)),
        Err(_) => {
            if caps.get(2).is_some() {
                // an explicit default was given, possibly empty
                let default = caps.get(3).map(|m| m.as_str()).unwrap_or("");
                Some(Value::Str(default.to_string()))
            } else if cfg.strict_conversions {
                None
            } else {
                Some(Value::Null)
            }
        }
    }
}

fn interpolate(s: &str, cfg: &Config) -> Option<Value> {
    let mut parts: Vec<String> = vec![];
    let mut consumed = 0;

    for m in INTERPOLATION_PATTERN.find_iter(s) {
        if consumed < m.start() {
            parts.push(s[consumed..m.start()].to_string());
        }
        let path = &s[m.start() + 2..m.end() - 1];
        match cfg.get(path) {
            Err(e) => {
                warn!("interpolation of '{}' failed: {}", path, e);
                return None;
            }
            Ok(v) => parts.push(string_for(&v)),
        }
        consumed = m.end();
    }
    if consumed < s.len() {
        parts.push(s[consumed..].to_string());
    }
    Some(Value::Str(parts.join("")))
}

/// Canonical rendering used for interpolated placeholders: lists as
/// `[x, y]`, mappings as `{k: v}`, scalars via their native string form.
pub(crate) fn string_for(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Complex(c) => {
            if c.re != 0.0 && c.im != 0.0 {
                format!("{} + {}j", c.re, c.im)
            } else if c.re == 0.0 {
                format!("{}j", c.im)
            } else {
                format!("{}", c.re)
            }
        }
        Value::Str(s) => s.clone(),
        Value::Date(d) => d.to_string(),
        Value::DateTime(dt) => dt.to_string(),
        Value::List(items) => {
            let rendered: Vec<String> = items.iter().map(string_for).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Mapping(map) => {
            let rendered: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, string_for(v)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
        Value::Config(cfg) => match cfg.as_mapping() {
            Ok(map) => string_for(&Value::Mapping(map)),
            Err(_) => "<config>".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn cfg() -> Config {
        Config::new()
    }

    #[test]
    fn test_date() {
        let v = convert("2019-03-28", &cfg()).expect("no conversion");
        match v {
            Value::Date(d) => {
                assert_eq!((d.year(), d.month(), d.day()), (2019, 3, 28));
            }
            other => panic!("Expected a date, got {:?}", other),
        }
    }

    #[test]
    fn test_datetime_naive() {
        let v = convert("2019-03-28 23:27:04.314159", &cfg()).expect("no conversion");
        match v {
            Value::DateTime(dt) => {
                assert_eq!((dt.hour(), dt.minute(), dt.second()), (23, 27, 4));
                assert_eq!(dt.nanosecond(), 314_159_000);
                assert_eq!(dt.offset().local_minus_utc(), 0);
            }
            other => panic!("Expected a date-time, got {:?}", other),
        }
    }

    #[test]
    fn test_datetime_with_offset() {
        let v = convert("2019-03-28T23:27:04+05:30", &cfg()).expect("no conversion");
        match v {
            Value::DateTime(dt) => {
                assert_eq!(dt.offset().local_minus_utc(), 5 * 3600 + 30 * 60);
                assert_eq!(dt.hour(), 23);
            }
            other => panic!("Expected a date-time, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_date_is_no_conversion() {
        assert_eq!(convert("2019-13-99", &cfg()), None);
    }

    #[test]
    fn test_env_with_default() {
        let v = convert("$NO_SUCH_VARIABLE_CFG|fallback", &cfg()).expect("no conversion");
        assert_eq!(v, Value::Str("fallback".to_string()));

        let v = convert("$NO_SUCH_VARIABLE_CFG|", &cfg()).expect("no conversion");
        assert_eq!(v, Value::Str(String::new()));
    }

    #[test]
    fn test_env_missing_without_default() {
        // strict: the conversion fails; lenient: null
        assert_eq!(convert("$NO_SUCH_VARIABLE_CFG", &cfg()), None);

        let mut lenient = cfg();
        lenient.strict_conversions = false;
        assert_eq!(convert("$NO_SUCH_VARIABLE_CFG", &lenient), Some(Value::Null));
    }

    #[test]
    fn test_dotted_name_without_resolver() {
        let v = convert("sys.stderr", &cfg()).expect("no conversion");
        assert_eq!(v, Value::Str("sys.stderr".to_string()));
    }

    #[test]
    fn test_dotted_name_with_resolver() {
        fn resolver(name: &str) -> Option<Value> {
            if name == "app.version" {
                Some(Value::Str("1.2.3".to_string()))
            } else {
                None
            }
        }
        let mut config = cfg();
        config.set_host_resolver(resolver);
        assert_eq!(
            convert("app.version", &config),
            Some(Value::Str("1.2.3".to_string()))
        );
        // declined lookups convert to the original text
        assert_eq!(
            convert("app.nothing", &config),
            Some(Value::Str("app.nothing".to_string()))
        );
    }

    #[test]
    fn test_string_for() {
        assert_eq!(string_for(&Value::Integer(4)), "4");
        assert_eq!(string_for(&Value::Str("x".to_string())), "x");
        assert_eq!(
            string_for(&Value::List(vec![
                Value::Integer(1),
                Value::Str("a".to_string())
            ])),
            "[1, a]"
        );
        assert_eq!(string_for(&Value::Null), "null");
    }
}
