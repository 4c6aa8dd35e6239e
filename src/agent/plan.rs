//! Planner reply parsing and interim result merging

use crate::sandbox::ScriptOutput;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PythonBlock {
    #[serde(default = "default_filename")]
    pub filename: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub code: String,
}

fn default_filename() -> String {
    "run.py".to_string()
}

fn default_format() -> String {
    "array".to_string()
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub steps: Vec<Value>,
    #[serde(default)]
    pub python_blocks: Vec<PythonBlock>,
    #[serde(default = "default_format")]
    pub final_format: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub postprocess_instructions: String,
}

impl Plan {
    /// Parses a planner reply, treating anything that is not a plan object as code
    pub fn parse(reply: &str) -> Plan {
        let parsed = extract_json_object(reply).and_then(|json| {
            let value: Value = serde_json::from_str(&json).map_err(|e| e.to_string())?;
            if !PLAN_KEYS.iter().any(|key| value.get(key).is_some()) {
                return Err("object has neither steps nor python_blocks".to_string());
            }
            serde_json::from_value::<Plan>(value).map_err(|e| e.to_string())
        });

        match parsed {
            Ok(plan) => {
                debug!(
                    steps = plan.steps.len(),
                    blocks = plan.python_blocks.len(),
                    format = %plan.final_format,
                    "Parsed plan"
                );
                plan
            }
            Err(reason) => {
                warn!(reason = %reason, "Planner reply is not a plan, running it as a script");
                Plan::fallback(reply)
            }
        }
    }

    pub fn fallback(reply: &str) -> Plan {
        Plan {
            steps: Vec::new(),
            python_blocks: vec![PythonBlock {
                filename: default_filename(),
                code: reply.to_string(),
            }],
            final_format: default_format(),
            postprocess_instructions: String::new(),
        }
    }
}

/// A reply object must carry at least one of these to count as a plan
const PLAN_KEYS: [&str; 2] = ["python_blocks", "steps"];

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```(?:json)?\s*\n?([\s\S]*?)\n?```").expect("valid regex"))
}

/// Returns the reply as a JSON object when it is one, or wraps exactly one in a fence
pub fn extract_json_object(response: &str) -> Result<String, String> {
    let trimmed = response.trim();

    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Ok(trimmed.to_string());
    }

    if trimmed.contains("```") {
        if let Some(json) = fence_re()
            .captures(trimmed)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
        {
            if json.starts_with('{') && json.ends_with('}') {
                return Ok(json.to_string());
            }
        }
    }

    Err("no JSON object found".to_string())
}

/// Parses a reply as any JSON value, allowing one fenced block around it
pub fn parse_json_value(reply: &str) -> Option<Value> {
    let trimmed = reply.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    fence_re()
        .captures(trimmed)
        .and_then(|c| c.get(1))
        .and_then(|m| serde_json::from_str(m.as_str().trim()).ok())
}

/// Merges one block's output into the interim map
///
/// A JSON object on stdout contributes its keys. Anything else is kept verbatim
/// under `block_<index>_raw`.
pub fn merge_output(interim: &mut Map<String, Value>, index: usize, output: &ScriptOutput) {
    match serde_json::from_str::<Value>(output.stdout.trim()) {
        Ok(Value::Object(fields)) => {
            debug!(block = index, keys = fields.len(), "Merged block output");
            interim.extend(fields);
        }
        _ => {
            debug!(block = index, "Block output is not a JSON object, keeping raw text");
            interim.insert(
                format!("block_{}_raw", index),
                Value::String(output.combined()),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_plain_plan() {
        let reply = r#"{"steps":["load","sum"],"python_blocks":[{"filename":"run1.py","code":"print(1)"}],"final_format":"object","postprocess_instructions":"round"}"#;
        let plan = Plan::parse(reply);

        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.python_blocks[0].filename, "run1.py");
        assert_eq!(plan.python_blocks[0].code, "print(1)");
        assert_eq!(plan.final_format, "object");
        assert_eq!(plan.postprocess_instructions, "round");
    }

    #[test]
    fn test_parse_fenced_plan_with_defaults() {
        let reply = "Here you go:\n```json\n{\"python_blocks\":[{\"code\":\"print(2)\"}]}\n```";
        let plan = Plan::parse(reply);

        assert_eq!(plan.python_blocks.len(), 1);
        assert_eq!(plan.python_blocks[0].filename, "run.py");
        assert_eq!(plan.final_format, "array");
        assert!(plan.postprocess_instructions.is_empty());
    }

    #[test]
    fn test_null_code_becomes_empty() {
        let plan = Plan::parse(r#"{"python_blocks":[{"filename":"a.py","code":null}]}"#);
        assert_eq!(plan.python_blocks[0].code, "");
    }

    #[test]
    fn test_unparseable_reply_becomes_single_block() {
        let reply = "import pandas as pd\nprint('no plan')";
        let plan = Plan::parse(reply);

        assert_eq!(plan, Plan::fallback(reply));
        assert_eq!(plan.python_blocks.len(), 1);
        assert_eq!(plan.python_blocks[0].filename, "run.py");
        assert_eq!(plan.python_blocks[0].code, reply);
        assert_eq!(plan.final_format, "array");
    }

    #[test]
    fn test_wrong_shape_falls_back() {
        let reply = r#"{"python_blocks": "not a list"}"#;
        assert_eq!(Plan::parse(reply).python_blocks[0].code, reply);
    }

    #[test]
    fn test_script_with_dict_literal_runs_as_script() {
        let reply = "import json\nprint(json.dumps({\"rows\": 3}))";
        let plan = Plan::parse(reply);

        assert_eq!(plan.python_blocks.len(), 1);
        assert_eq!(plan.python_blocks[0].filename, "run.py");
        assert_eq!(plan.python_blocks[0].code, reply);
    }

    #[test]
    fn test_object_without_plan_keys_falls_back() {
        let reply = r#"{"rows": 3}"#;
        let plan = Plan::parse(reply);

        assert_eq!(plan, Plan::fallback(reply));
    }

    #[test]
    fn test_extract_json_object_ignores_prose() {
        assert!(extract_json_object("Plan follows {\"steps\":[]} thanks").is_err());
        assert!(extract_json_object("no braces here").is_err());
        assert_eq!(
            extract_json_object("```json\n{\"steps\":[]}\n```").unwrap(),
            "{\"steps\":[]}"
        );
    }

    #[test]
    fn test_merge_object_keys() {
        let mut interim = Map::new();
        merge_output(&mut interim, 0, &ScriptOutput::success("{\"mean\": 2.5, \"n\": 4}\n"));
        merge_output(&mut interim, 1, &ScriptOutput::success("{\"n\": 5}"));

        assert_eq!(interim.get("mean"), Some(&json!(2.5)));
        assert_eq!(interim.get("n"), Some(&json!(5)));
        assert_eq!(interim.len(), 2);
    }

    #[test]
    fn test_merge_non_object_is_raw() {
        let mut interim = Map::new();
        merge_output(&mut interim, 0, &ScriptOutput::success("[1, 2, 3]\n"));
        merge_output(
            &mut interim,
            1,
            &ScriptOutput {
                stdout: String::new(),
                stderr: "Traceback: boom\n".to_string(),
                exit_code: Some(1),
            },
        );

        assert_eq!(interim.get("block_0_raw"), Some(&json!("[1, 2, 3]\n")));
        assert_eq!(interim.get("block_1_raw"), Some(&json!("Traceback: boom\n")));
    }

    #[test]
    fn test_parse_json_value() {
        assert_eq!(parse_json_value(" [1, 2] "), Some(json!([1, 2])));
        assert_eq!(parse_json_value("```json\n{\"a\": 1}\n```"), Some(json!({"a": 1})));
        assert_eq!(parse_json_value("The answer is 42."), None);
    }
}
