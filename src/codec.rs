//! JSON body of one batch:
//! `{"ezkey": <key>, "data": [{"stat": .., "count": .., "t": ..}, {"stat": .., "value": .., "t": ..}]}`

use serde::{Deserialize, Serialize};

use crate::{error::EncodeError, Observation, Time};

#[derive(Debug, Serialize)]
struct BodyRef<'a> {
    ezkey: &'a str,
    data: Vec<StatRef<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum StatRef<'a> {
    Count {
        stat: &'a str,
        count: i64,
        t: Time,
    },
    Value {
        stat: &'a str,
        value: f64,
        t: Time,
    },
}

#[derive(Debug, Deserialize)]
struct Body {
    ezkey: String,
    data: Vec<Stat>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Stat {
    Count {
        stat: String,
        count: i64,
        t: Option<Time>,
    },
    Value {
        stat: String,
        value: f64,
        t: Option<Time>,
    },
}

/// Writes the batch body into `wtr`, replacing its contents.
///
/// Nothing usable is left in `wtr` on error.
pub fn encode_batch(
    wtr: &mut Vec<u8>,
    key: &str,
    observations: &[Observation],
) -> Result<(), EncodeError> {
    wtr.clear();
    if observations.is_empty() {
        return Err(EncodeError::Empty);
    }
    let mut data = Vec::with_capacity(observations.len());
    for observation in observations {
        let stat = match observation {
            Observation::Counter { name, delta, time } => StatRef::Count {
                stat: name,
                count: *delta,
                t: *time,
            },
            Observation::Gauge { name, value, time } => {
                // serde_json would silently turn these into `null`
                if !value.is_finite() {
                    return Err(EncodeError::NonFiniteGauge {
                        name: name.clone(),
                        value: *value,
                    });
                }
                StatRef::Value {
                    stat: name,
                    value: *value,
                    t: *time,
                }
            }
        };
        data.push(stat);
    }
    let body = BodyRef { ezkey: key, data };
    serde_json::to_writer(&mut *wtr, &body).inspect_err(|_| wtr.clear())?;
    Ok(())
}

/// Reference decoder for [`encode_batch`] output.
///
/// A missing `t` decodes as time `0`.
pub fn decode_batch(buf: &[u8]) -> serde_json::Result<(String, Vec<Observation>)> {
    let body: Body = serde_json::from_slice(buf)?;
    let observations = body
        .data
        .into_iter()
        .map(|stat| match stat {
            Stat::Count { stat, count, t } => Observation::counter_at(stat, count, t.unwrap_or(0)),
            Stat::Value { stat, value, t } => Observation::gauge_at(stat, value, t.unwrap_or(0)),
        })
        .collect();
    Ok((body.ezkey, observations))
}
