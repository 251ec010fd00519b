use pupilnet_codec::{Map, Value};
use tracing::info;

use crate::cmd::{NotifyArgs, RemoteArgs};
use crate::exit::{remote_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_reply, OutputFormat};

pub fn run(args: NotifyArgs, remote: &RemoteArgs, format: OutputFormat) -> CliResult<i32> {
    let record = build_record(&args)?;

    let mut client = remote.connect()?;
    client
        .send_notification(&record)
        .map_err(|err| remote_error("notification failed", err))?;
    client.close();

    info!(subject = %args.subject, fields = record.len(), "notification sent");
    print_reply(&format!("notify.{}", args.subject), "sent", format);
    Ok(SUCCESS)
}

/// The record sent on the wire: `subject` first, then the `--json` fields.
/// `--subject` wins over a `subject` key in the JSON object.
fn build_record(args: &NotifyArgs) -> CliResult<Map> {
    if args.subject.is_empty() {
        return Err(CliError::new(USAGE, "--subject must not be empty"));
    }

    let mut record = Map::new();
    record.insert("subject", args.subject.as_str());

    if let Some(json) = &args.json {
        let parsed: serde_json::Value = serde_json::from_str(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        let serde_json::Value::Object(fields) = parsed else {
            return Err(CliError::new(USAGE, "--json must be a JSON object"));
        };
        for (key, value) in fields {
            if key == "subject" {
                continue;
            }
            record.insert(key, json_to_value(value));
        }
    }

    Ok(record)
}

fn json_to_value(value: serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(fields) => Value::Map(
            fields
                .into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect(),
        ),
    }
}
