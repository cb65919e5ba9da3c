//! Line-based wire codec
//!
//! # Frame Format
//!
//! Every frame is one UTF-8 line terminated by `\n`. Tokens are textual and
//! separated by `:`; repeated fields are separated by `,`.
//!
//! ```text
//! SENSOR:<nodeId>:<type>=<value><unit>,<type>=<value><unit>,...
//! ACTUATOR:<nodeId>:<actuatorId>:<type>=<bool>,<actuatorId>:<type>=<bool>,...
//! NODE_ADDED:<nodeId>
//! NODE_REMOVED:<nodeId>
//! ```
//!
//! `ACTUATOR` entries also come in two shortened forms: `<type>=<bool>` (flat
//! form, no id) and `<actuatorId>:<bool>` (command form, no type).
//!
//! ## Numbers
//!
//! Values use the shortest representation that parses back to the same
//! `f64`, with `.` as decimal separator and never an exponent. On decode the
//! value ends at the first character that is not a digit, `.` or `-`;
//! everything after it is the unit (`27.4°C`, `-3.5lux`, `80%`).
//!
//! ## Error Handling
//!
//! - **Unknown kind, wrong token count, bad node id**: the whole line is
//!   rejected with [`Error::Malformed`]
//! - **Bad entry** inside a multi-entry line: the entry is logged and skipped,
//!   the remaining entries are kept
//! - **No valid entry left**: the line is rejected
//! - **Unencodable token** (separator inside a name or unit, non-finite value):
//!   [`Error::Encode`]

use crate::core::types::{ActuatorState, NodeId, SensorReading};
use crate::error::{Error, Result};
use crate::streaming::messages::{
    ACTUATOR_TAG, Message, NODE_ADDED_TAG, NODE_REMOVED_TAG, SENSOR_TAG,
};

/// Encode a message as a single frame, without the line terminator
pub fn encode(msg: &Message) -> Result<String> {
    match msg {
        Message::SensorUpdate { node_id, readings } => {
            if readings.is_empty() {
                return Err(Error::Encode(format!(
                    "sensor update for node {} has no readings",
                    node_id
                )));
            }
            let entries = readings
                .iter()
                .map(encode_reading)
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("{}:{}:{}", SENSOR_TAG, node_id, entries.join(",")))
        }
        Message::ActuatorUpdate { node_id, actuators } => {
            if actuators.is_empty() {
                return Err(Error::Encode(format!(
                    "actuator update for node {} has no actuators",
                    node_id
                )));
            }
            let entries = actuators
                .iter()
                .map(encode_actuator)
                .collect::<Result<Vec<_>>>()?;
            Ok(format!("{}:{}:{}", ACTUATOR_TAG, node_id, entries.join(",")))
        }
        Message::NodeAdded { node_id } => Ok(format!("{}:{}", NODE_ADDED_TAG, node_id)),
        Message::NodeRemoved { node_id } => Ok(format!("{}:{}", NODE_REMOVED_TAG, node_id)),
    }
}

/// Decode one frame into a message
///
/// A trailing `\r` / `\n` is ignored. Malformed entries inside a `SENSOR` or
/// `ACTUATOR` frame are dropped with a warning.
pub fn decode(line: &str) -> Result<Message> {
    let line = line.trim_end_matches(['\r', '\n']);

    let mut tokens = line.splitn(3, ':');
    let tag = tokens.next().unwrap_or_default();
    let node_token = tokens.next();
    let body = tokens.next();

    match tag {
        SENSOR_TAG => {
            let (node_id, body) = expect_body(tag, node_token, body)?;
            let readings = decode_entries(node_id, body, decode_reading);
            if readings.is_empty() {
                return Err(Error::Malformed(format!(
                    "no valid sensor entry in {:?}",
                    line
                )));
            }
            Ok(Message::SensorUpdate { node_id, readings })
        }
        ACTUATOR_TAG => {
            let (node_id, body) = expect_body(tag, node_token, body)?;
            let actuators = decode_entries(node_id, body, decode_actuator);
            if actuators.is_empty() {
                return Err(Error::Malformed(format!(
                    "no valid actuator entry in {:?}",
                    line
                )));
            }
            Ok(Message::ActuatorUpdate { node_id, actuators })
        }
        NODE_ADDED_TAG | NODE_REMOVED_TAG => {
            if body.is_some() {
                return Err(Error::Malformed(format!(
                    "{} takes exactly one argument: {:?}",
                    tag, line
                )));
            }
            let node_id = parse_node_id(node_token)?;
            if tag == NODE_ADDED_TAG {
                Ok(Message::NodeAdded { node_id })
            } else {
                Ok(Message::NodeRemoved { node_id })
            }
        }
        _ => Err(Error::Malformed(format!("unknown frame kind {:?}", tag))),
    }
}

/// Split a value+unit token at the first character that cannot be part of
/// the number
///
/// Returns the byte index where the unit begins (the token length if there
/// is no unit).
pub fn unit_boundary(value_and_unit: &str) -> usize {
    value_and_unit
        .char_indices()
        .find(|&(_, c)| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .map(|(i, _)| i)
        .unwrap_or(value_and_unit.len())
}

fn expect_body<'a>(
    tag: &str,
    node_token: Option<&str>,
    body: Option<&'a str>,
) -> Result<(NodeId, &'a str)> {
    let body = body.ok_or_else(|| {
        Error::Malformed(format!("{} frame needs <kind>:<nodeId>:<entries>", tag))
    })?;
    Ok((parse_node_id(node_token)?, body))
}

fn parse_node_id(token: Option<&str>) -> Result<NodeId> {
    let token = token.ok_or_else(|| Error::Malformed("missing node id".to_string()))?;
    token
        .trim()
        .parse::<NodeId>()
        .map_err(|e| Error::Malformed(format!("invalid node id {:?}: {}", token, e)))
}

fn decode_entries<T>(node_id: NodeId, body: &str, decode_entry: fn(&str) -> Result<T>) -> Vec<T> {
    body.split(',')
        .filter_map(|entry| match decode_entry(entry) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Node {}: skipping entry {:?}: {}", node_id, entry, e);
                None
            }
        })
        .collect()
}

fn decode_reading(entry: &str) -> Result<SensorReading> {
    let (sensor_type, value_and_unit) = entry
        .split_once('=')
        .ok_or_else(|| Error::Malformed("expected <type>=<value><unit>".to_string()))?;
    if value_and_unit.contains('=') {
        return Err(Error::Malformed("too many '=' in sensor entry".to_string()));
    }

    let sensor_type = sensor_type.trim();
    check_name(sensor_type).map_err(Error::Malformed)?;

    let value_and_unit = value_and_unit.trim();
    let split = unit_boundary(value_and_unit);
    let number = &value_and_unit[..split];
    let value = number
        .parse::<f64>()
        .map_err(|e| Error::Malformed(format!("bad value {:?}: {}", number, e)))?;
    let unit = value_and_unit[split..].trim();

    Ok(SensorReading::new(sensor_type, value, unit))
}

fn decode_actuator(entry: &str) -> Result<ActuatorState> {
    let entry = entry.trim();
    let (id_token, type_token, state_token) = match entry.split_once('=') {
        Some((head, state)) => match head.split_once(':') {
            Some((id, actuator_type)) => (Some(id), Some(actuator_type), state),
            None => (None, Some(head), state),
        },
        None => {
            let (id, state) = entry.split_once(':').ok_or_else(|| {
                Error::Malformed("expected <id>:<type>=<bool>, <type>=<bool> or <id>:<bool>".to_string())
            })?;
            (Some(id), None, state)
        }
    };

    let actuator_id = id_token
        .map(|id| {
            id.trim()
                .parse::<u32>()
                .map_err(|e| Error::Malformed(format!("bad actuator id {:?}: {}", id, e)))
        })
        .transpose()?;

    let actuator_type = match type_token {
        Some(t) => {
            let t = t.trim();
            check_name(t).map_err(Error::Malformed)?;
            Some(t.to_string())
        }
        None => None,
    };

    Ok(ActuatorState {
        actuator_id,
        actuator_type,
        is_on: parse_bool(state_token)?,
    })
}

fn parse_bool(token: &str) -> Result<bool> {
    let token = token.trim();
    if token.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if token.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(Error::Malformed(format!("bad actuator state {:?}", token)))
    }
}

fn encode_reading(reading: &SensorReading) -> Result<String> {
    check_name(&reading.sensor_type).map_err(Error::Encode)?;
    check_unit(&reading.unit).map_err(Error::Encode)?;
    if !reading.value.is_finite() {
        return Err(Error::Encode(format!(
            "{} value {} is not finite",
            reading.sensor_type, reading.value
        )));
    }
    Ok(format!(
        "{}={}{}",
        reading.sensor_type, reading.value, reading.unit
    ))
}

fn encode_actuator(state: &ActuatorState) -> Result<String> {
    let mut entry = String::new();
    if let Some(id) = state.actuator_id {
        entry.push_str(&id.to_string());
        entry.push(':');
    }
    match &state.actuator_type {
        Some(t) => {
            check_name(t).map_err(Error::Encode)?;
            entry.push_str(t);
            entry.push('=');
        }
        None if state.actuator_id.is_none() => {
            return Err(Error::Encode(
                "actuator entry needs an id or a type".to_string(),
            ));
        }
        None => {}
    }
    entry.push_str(if state.is_on { "true" } else { "false" });
    Ok(entry)
}

/// Sensor and actuator type names
fn check_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("empty type name".to_string());
    }
    if name
        .chars()
        .any(|c| matches!(c, ':' | ',' | '=') || c.is_whitespace())
    {
        return Err(format!("type name {:?} contains a separator", name));
    }
    Ok(())
}

fn check_unit(unit: &str) -> std::result::Result<(), String> {
    if unit.chars().any(|c| matches!(c, ':' | ',' | '=' | '\n' | '\r')) {
        return Err(format!("unit {:?} contains a separator", unit));
    }
    if unit_boundary(unit) != 0 {
        return Err(format!("unit {:?} starts like a number", unit));
    }
    if unit.trim() != unit {
        return Err(format!("unit {:?} has surrounding whitespace", unit));
    }
    Ok(())
}
