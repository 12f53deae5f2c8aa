// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SkillError {
    #[error("no front-matter block found")]
    MissingFrontMatter,
    #[error("front-matter is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("missing required parameter '{0}'")]
    MissingParameter(String),
    #[error("parameter '{param}' does not allow value '{value}'")]
    InvalidEnumValue { param: String, value: String },
}

/// Inferred (or declared) parameter type, mirrored into the JSON schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamType {
    Integer,
    Number,
    Boolean,
    #[default]
    String,
}

impl ParamType {
    fn as_str(&self) -> &'static str {
        match self {
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::String => "string",
        }
    }

    /// Infer a type from the shape of a default value.
    fn infer(default: &str) -> Self {
        if default.parse::<i64>().is_ok() {
            ParamType::Integer
        } else if default.parse::<f64>().is_ok() {
            ParamType::Number
        } else if default == "true" || default == "false" {
            ParamType::Boolean
        } else {
            ParamType::String
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "integer" | "int" => Some(ParamType::Integer),
            "number" | "float" => Some(ParamType::Number),
            "boolean" | "bool" => Some(ParamType::Boolean),
            "string" => Some(ParamType::String),
            _ => None,
        }
    }
}

/// One declared parameter of a skill.
#[derive(Debug, Clone, Default)]
pub struct SkillParameter {
    pub name: String,
    pub description: String,
    pub default: Option<String>,
    pub required: bool,
    pub param_type: ParamType,
    pub allowed_values: Vec<String>,
}

/// A parsed SKILL.md: front-matter fields plus the Markdown body.
#[derive(Debug, Clone)]
pub struct ParsedSkill {
    pub name: String,
    pub description: String,
    /// Command template with `{{param}}` placeholders retained.
    pub command_template: String,
    pub category: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    pub parameters: Vec<SkillParameter>,
    /// Everything after the closing front-matter fence.
    pub body: String,
    /// Directory the SKILL.md was loaded from (empty for in-memory parses).
    pub dir: PathBuf,
}

impl ParsedSkill {
    /// The function-call name this skill is exposed as.
    pub fn tool_name(&self) -> String {
        to_snake_case(&self.name)
    }

    /// JSON Schema for the tool spec's `parameters` object.
    pub fn parameters_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for p in &self.parameters {
            let mut prop = json!({
                "type": p.param_type.as_str(),
                "description": p.description,
            });
            if let Some(default) = &p.default {
                prop["default"] = json!(default);
            }
            if !p.allowed_values.is_empty() {
                prop["enum"] = json!(p.allowed_values);
            }
            properties.insert(p.name.clone(), prop);
            if p.required {
                required.push(p.name.clone());
            }
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    /// Substitute call arguments into the command template.
    ///
    /// Arguments win over declared defaults; a required parameter with
    /// neither is an error, as is a value outside a parameter's allowed set.
    pub fn render_command(&self, args: &Value) -> Result<String, SkillError> {
        let mut command = self.command_template.clone();
        for p in &self.parameters {
            let value = match args.get(&p.name) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(v) if !v.is_null() => Some(v.to_string()),
                _ => p.default.clone(),
            };
            let value = match value {
                Some(v) => v,
                None if p.required => return Err(SkillError::MissingParameter(p.name.clone())),
                None => String::new(),
            };
            if !p.allowed_values.is_empty() && !p.allowed_values.contains(&value) {
                return Err(SkillError::InvalidEnumValue {
                    param: p.name.clone(),
                    value,
                });
            }
            command = command.replace(&format!("{{{{{}}}}}", p.name), &value);
        }
        Ok(command)
    }
}

/// Lower-case a human name into a snake_case tool identifier.
///
/// Idempotent: applying it twice gives the same result.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = true; // suppress a leading underscore
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if c.is_ascii_uppercase() && !prev_underscore && !out.is_empty() {
                // Word boundary inside CamelCase
                if !out.ends_with('_') {
                    out.push('_');
                }
            }
            out.push(c.to_ascii_lowercase());
            prev_underscore = false;
        } else if !prev_underscore {
            out.push('_');
            prev_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Parse a SKILL.md document.
///
/// The front-matter is delimited by `---` lines and parsed with a small
/// YAML-subset reader: top-level `key: value` pairs plus a `parameters:`
/// section containing `- name:`-style list items with indented fields.
pub fn parse_skill_md(content: &str) -> Result<ParsedSkill, SkillError> {
    let (yaml_src, body) = split_front_matter(content).ok_or(SkillError::MissingFrontMatter)?;

    let mut name = None;
    let mut description = None;
    let mut command = None;
    let mut category = None;
    let mut version = None;
    let mut author = None;
    let mut parameters: Vec<SkillParameter> = Vec::new();
    let mut in_parameters = false;

    for line in yaml_src.lines() {
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        let indented = line.starts_with(' ') || line.starts_with('\t');
        if !indented {
            in_parameters = false;
        }

        if in_parameters {
            let item = line.trim_start();
            if let Some(rest) = item.strip_prefix("- ") {
                // New list item; the first key usually is `name:`.
                let mut param = SkillParameter::default();
                if let Some((k, v)) = split_kv(rest) {
                    apply_param_field(&mut param, &k, &v);
                }
                parameters.push(param);
            } else if let Some((k, v)) = split_kv(item) {
                if let Some(param) = parameters.last_mut() {
                    apply_param_field(param, &k, &v);
                }
            }
            continue;
        }

        if indented {
            // Indented but outside any section — ignore
            continue;
        }

        if let Some((key, val)) = split_kv(line) {
            match key.as_str() {
                "name" => name = Some(val),
                "description" => description = Some(val),
                "command" => command = Some(val),
                "category" => category = Some(val),
                "version" => version = Some(val),
                "author" => author = Some(val),
                "parameters" => {
                    if val.is_empty() {
                        in_parameters = true;
                    }
                }
                // Unknown keys are ignored for forward compat
                _ => {}
            }
        }
    }

    // Finish type inference for parameters that declared neither a type nor
    // a default shape.
    for p in &mut parameters {
        if p.param_type == ParamType::String {
            if let Some(default) = &p.default {
                p.param_type = ParamType::infer(default);
            }
        }
    }

    Ok(ParsedSkill {
        name: name.ok_or(SkillError::MissingField("name"))?,
        description: description.ok_or(SkillError::MissingField("description"))?,
        command_template: command.ok_or(SkillError::MissingField("command"))?,
        category,
        version,
        author,
        parameters,
        body: body.trim().to_string(),
        dir: PathBuf::new(),
    })
}

fn apply_param_field(param: &mut SkillParameter, key: &str, val: &str) {
    match key {
        "name" => param.name = val.to_string(),
        "description" => param.description = val.to_string(),
        "default" => param.default = Some(val.to_string()),
        "required" => param.required = val == "true",
        "type" => {
            if let Some(t) = ParamType::parse(val) {
                param.param_type = t;
            }
        }
        "enum" => {
            // Inline list form: [a, b, c]
            let inner = val.trim_start_matches('[').trim_end_matches(']');
            param.allowed_values = inner
                .split(',')
                .map(|s| unquote(s.trim()).to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        _ => {}
    }
}

/// Split a SKILL.md into `(front_matter, body)`.
fn split_front_matter(content: &str) -> Option<(&str, &str)> {
    let header = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))?;

    let close_unix = header.find("\n---\n");
    let close_crlf = header.find("\n---\r\n");

    let (yaml_end, skip) = match (close_unix, close_crlf) {
        (Some(u), Some(c)) if u <= c => (u, "\n---\n".len()),
        (_, Some(c)) => (c, "\n---\r\n".len()),
        (Some(u), _) => (u, "\n---\n".len()),
        (None, None) => return None,
    };

    Some((&header[..yaml_end], &header[yaml_end + skip..]))
}

/// Split `key: value` into `(key, value)`, stripping quotes and whitespace.
fn split_kv(s: &str) -> Option<(String, String)> {
    let colon = s.find(':')?;
    let key = s[..colon].trim().to_string();
    if key.is_empty() {
        return None;
    }
    let val = unquote(s[colon + 1..].trim()).to_string();
    Some((key, val))
}

/// Strip a single layer of matching `"..."` or `'...'` quotes if present.
fn unquote(s: &str) -> &str {
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"'))
            || (s.starts_with('\'') && s.ends_with('\'')))
    {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
