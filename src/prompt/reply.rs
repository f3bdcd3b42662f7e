//! 结构化回复解析器
//!
//! 神谕只会返回自由文本，这里是把文本变成结构的唯一入口。语法规则：
//!
//! 1. 恰好一个分隔令牌 `--next-move--`；
//! 2. 恰好一个结束令牌 `--end--`，且位于分隔令牌之后；
//! 3. 两者之间恰好一个顶层 JSON 对象（参数）；
//! 4. JSON 对象之外恰好一个 `[name]` 令牌（能力名或任务令牌）。
//!
//! 每条规则都是独立函数，违反时返回对应的 ReplyViolation，由 RecoveryEngine 生成纠正提示。

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// 思考过程与结论之间的分隔令牌
pub const SEPARATOR: &str = "--next-move--";
/// 结论结束令牌
pub const END_TOKEN: &str = "--end--";
/// 任务已完成（不是真实能力）
pub const MISSION_COMPLETE: &str = "-mission-complete-";
/// 任务无法完成（不是真实能力）
pub const MISSION_FAILED: &str = "-mission-failed-";

/// 协议违规：每种对应一条语法规则或一条语义校验
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReplyViolation {
    #[error("expected exactly one --next-move-- separator, found {0}")]
    SeparatorCount(usize),

    #[error("expected exactly one --end-- token, found {0}")]
    EndTokenCount(usize),

    #[error("the --end-- token appears before the --next-move-- separator")]
    EndBeforeSeparator,

    #[error("expected exactly one JSON object, found {0}")]
    ObjectCount(usize),

    #[error("malformed JSON object: {0}")]
    MalformedObject(String),

    #[error("expected exactly one [name] token, found {0}")]
    NameTokenCount(usize),

    #[error("unknown capability [{name}]")]
    UnknownCapability { name: String, valid: Vec<String> },

    #[error("capability {capability} does not accept {unexpected:?}")]
    UnexpectedArguments {
        capability: String,
        unexpected: Vec<String>,
        expected: Vec<String>,
    },

    #[error("capability {capability} is missing {missing:?}")]
    MissingArguments {
        capability: String,
        missing: Vec<String>,
        expected: Vec<String>,
    },

    #[error("summary object is missing keys {missing:?}")]
    MissingKeys {
        missing: Vec<String>,
        required: Vec<String>,
    },
}

/// 语法层面解析出的下一步（尚未校验能力名与参数）
#[derive(Debug, Clone, PartialEq)]
pub struct RawMove {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl RawMove {
    pub fn is_complete(&self) -> bool {
        self.name == MISSION_COMPLETE
    }

    pub fn is_failed(&self) -> bool {
        self.name == MISSION_FAILED
    }
}

fn name_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\[\]\r\n]*)\]").expect("static regex"))
}

/// 规则 1 + 2：取分隔令牌与结束令牌之间的片段
pub fn extract_segment(reply: &str) -> Result<&str, ReplyViolation> {
    let separators = reply.matches(SEPARATOR).count();
    if separators != 1 {
        return Err(ReplyViolation::SeparatorCount(separators));
    }
    let ends = reply.matches(END_TOKEN).count();
    if ends != 1 {
        return Err(ReplyViolation::EndTokenCount(ends));
    }
    let start = reply.find(SEPARATOR).map(|i| i + SEPARATOR.len()).unwrap_or(0);
    let end = reply.find(END_TOKEN).unwrap_or(reply.len());
    if end < start {
        return Err(ReplyViolation::EndBeforeSeparator);
    }
    Ok(&reply[start..end])
}

/// 扫描顶层 `{...}` 的字节区间；会跳过 JSON 字符串中的括号与转义
pub fn top_level_objects(text: &str) -> Result<Vec<Range<usize>>, ReplyViolation> {
    let mut spans = Vec::new();
    let mut depth = 0usize;
    let mut open_at = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if depth > 0 && in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    open_at = i;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    spans.push(open_at..i + 1);
                }
            }
            _ => {}
        }
    }

    if depth != 0 {
        return Err(ReplyViolation::MalformedObject("unbalanced braces".to_string()));
    }
    Ok(spans)
}

fn parse_object(raw: &str) -> Result<Map<String, Value>, ReplyViolation> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ReplyViolation::MalformedObject(format!(
            "expected an object, got {}",
            other
        ))),
        Err(e) => Err(ReplyViolation::MalformedObject(e.to_string())),
    }
}

/// 规则 3：片段内恰好一个顶层 JSON 对象；返回对象与去掉对象后的剩余文本
pub fn extract_object(segment: &str) -> Result<(Map<String, Value>, String), ReplyViolation> {
    let spans = top_level_objects(segment)?;
    if spans.len() != 1 {
        return Err(ReplyViolation::ObjectCount(spans.len()));
    }
    let span = spans[0].clone();
    let object = parse_object(&segment[span.clone()])?;
    let mut rest = String::with_capacity(segment.len());
    rest.push_str(&segment[..span.start]);
    rest.push(' ');
    rest.push_str(&segment[span.end..]);
    Ok((object, rest))
}

/// 规则 4：恰好一个 `[name]` 令牌
pub fn extract_name(text: &str) -> Result<String, ReplyViolation> {
    let names: Vec<&str> = name_token_re()
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if names.len() != 1 {
        return Err(ReplyViolation::NameTokenCount(names.len()));
    }
    Ok(names[0].trim().trim_matches(|c| c == '"' || c == '`').to_string())
}

/// 依次应用 1-4 条规则
pub fn parse_next_move(reply: &str) -> Result<RawMove, ReplyViolation> {
    let segment = extract_segment(reply)?;
    let (arguments, rest) = extract_object(segment)?;
    let name = extract_name(&rest)?;
    Ok(RawMove { name, arguments })
}

/// 从自由文本中找出所有可解析的顶层 JSON 对象；无法解析的 `{` 直接跳过
fn candidate_objects(text: &str) -> Vec<Map<String, Value>> {
    let mut objects = Vec::new();
    let mut resume = 0;
    for (i, _) in text.match_indices('{') {
        if i < resume {
            continue;
        }
        let mut stream = serde_json::Deserializer::from_str(&text[i..]).into_iter::<Value>();
        if let Some(Ok(Value::Object(map))) = stream.next() {
            resume = i + stream.byte_offset();
            objects.push(map);
        }
    }
    objects
}

/// 宽松地取最后一个带齐必需键的顶层 JSON 对象（执行摘要使用）
///
/// 正文中的零散括号不会导致失败；一个合格对象都没有时，按最后一个对象报告缺失的键。
pub fn parse_summary_object(
    reply: &str,
    required: &[&str],
) -> Result<Map<String, Value>, ReplyViolation> {
    let objects = candidate_objects(reply);
    if let Some(found) = objects
        .iter()
        .rev()
        .find(|o| required.iter().all(|k| o.contains_key(*k)))
    {
        return Ok(found.clone());
    }
    let last = objects.last().ok_or(ReplyViolation::ObjectCount(0))?;
    Err(ReplyViolation::MissingKeys {
        missing: required
            .iter()
            .filter(|k| !last.contains_key(**k))
            .map(|k| k.to_string())
            .collect(),
        required: required.iter().map(|k| k.to_string()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply(body: &str) -> String {
        format!("Step 1: thinking about [history]...\n{SEPARATOR}\n{body}\n{END_TOKEN}")
    }

    #[test]
    fn test_parse_well_formed_move() {
        let r = reply(r#"{"expr": "2+2"} [calculator]"#);
        let mv = parse_next_move(&r).unwrap();
        assert_eq!(mv.name, "calculator");
        assert_eq!(mv.arguments.get("expr"), Some(&json!("2+2")));
    }

    #[test]
    fn test_brackets_inside_json_are_not_name_tokens() {
        let r = reply(r#"{"items": [1, 2], "note": "see [x] and }"} [sum]"#);
        let mv = parse_next_move(&r).unwrap();
        assert_eq!(mv.name, "sum");
        assert_eq!(mv.arguments.get("items"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_mission_tokens() {
        let mv = parse_next_move(&reply("{} [-mission-complete-]")).unwrap();
        assert!(mv.is_complete());
        let mv = parse_next_move(&reply("{}\n[ -mission-failed- ]")).unwrap();
        assert!(mv.is_failed());
    }

    #[test]
    fn test_separator_count() {
        let r = format!("{SEPARATOR} {SEPARATOR} {{}} [a] {END_TOKEN}");
        assert_eq!(parse_next_move(&r), Err(ReplyViolation::SeparatorCount(2)));
        assert_eq!(
            parse_next_move("{} [a] --end--"),
            Err(ReplyViolation::SeparatorCount(0))
        );
    }

    #[test]
    fn test_end_token_rules() {
        let r = format!("{SEPARATOR} {{}} [a]");
        assert_eq!(parse_next_move(&r), Err(ReplyViolation::EndTokenCount(0)));
        let r = format!("{END_TOKEN} {{}} [a] {SEPARATOR}");
        assert_eq!(parse_next_move(&r), Err(ReplyViolation::EndBeforeSeparator));
    }

    #[test]
    fn test_object_count() {
        assert_eq!(
            parse_next_move(&reply("[a]")),
            Err(ReplyViolation::ObjectCount(0))
        );
        assert_eq!(
            parse_next_move(&reply(r#"{"a": 1} {"b": 2} [a]"#)),
            Err(ReplyViolation::ObjectCount(2))
        );
    }

    #[test]
    fn test_malformed_object() {
        assert!(matches!(
            parse_next_move(&reply(r#"{"a": } [a]"#)),
            Err(ReplyViolation::MalformedObject(_))
        ));
        assert!(matches!(
            parse_next_move(&reply(r#"{"a": 1 [a]"#)),
            Err(ReplyViolation::MalformedObject(_))
        ));
    }

    #[test]
    fn test_name_token_count() {
        assert_eq!(
            parse_next_move(&reply("{}")),
            Err(ReplyViolation::NameTokenCount(0))
        );
        assert_eq!(
            parse_next_move(&reply("{} [a] [b]")),
            Err(ReplyViolation::NameTokenCount(2))
        );
    }

    #[test]
    fn test_summary_object_takes_last_and_checks_keys() {
        let text = r#"example: {"x": 1}
        answer: {"capability": "calc", "arguments": {}, "result": 4, "summary": "done"}"#;
        let obj = parse_summary_object(text, &["capability", "summary"]).unwrap();
        assert_eq!(obj.get("summary"), Some(&json!("done")));

        let err = parse_summary_object(r#"{"capability": "calc"}"#, &["capability", "summary"])
            .unwrap_err();
        assert_eq!(
            err,
            ReplyViolation::MissingKeys {
                missing: vec!["summary".to_string()],
                required: vec!["capability".to_string(), "summary".to_string()],
            }
        );
        assert_eq!(
            parse_summary_object("no json here", &[]),
            Err(ReplyViolation::ObjectCount(0))
        );
    }

    #[test]
    fn test_summary_object_ignores_stray_braces_in_prose() {
        let required = ["capability", "summary"];
        let leading = r#"I opened { a brace and forgot it. {"capability": "calc", "summary": "done"}"#;
        assert_eq!(
            parse_summary_object(leading, &required).unwrap().get("summary"),
            Some(&json!("done"))
        );
        let trailing = r#"{"capability": "calc", "summary": "done"} (that is the {answer})"#;
        assert_eq!(
            parse_summary_object(trailing, &required).unwrap().get("capability"),
            Some(&json!("calc"))
        );
        let after = r#"{"capability": "calc", "summary": "done"} and an aside {"x": 1}"#;
        assert!(parse_summary_object(after, &required).is_ok());
    }
}
