//! 端到端场景测试：MockLlmClient 按调用顺序回放脚本
//!
//! 调用顺序：分解 -> 计划（有能力时）-> 决策 -> 执行摘要 -> ... -> 结论；
//! 构建委派能力时先有一次子 Agent 的自我介绍。

use std::sync::{Arc, Mutex};

use foreman::capability::{self, str_arg, DELEGATION_PREFIX};
use foreman::observability::AgentEvent;
use foreman::prompt::reply::{END_TOKEN, SEPARATOR};
use foreman::prompt::ResolvedRequest;
use foreman::{Agent, AgentError, Brain, Capability, CapabilityError, MockLlmClient, ParamKind};
use serde_json::{json, Value};

fn next_move(arguments: Value, name: &str) -> String {
    format!("Step 1: ...\nStep 6: ...\n{SEPARATOR}\n{arguments}\n[{name}]\n{END_TOKEN}")
}

fn summary(capability: &str, arguments: Value, result: Value, text: &str) -> String {
    json!({
        "capability": capability,
        "arguments": arguments,
        "result": result,
        "summary": text,
    })
    .to_string()
}

fn calculator() -> Capability {
    Capability::builder("calculator")
        .description("Evaluate a single addition such as 2+2")
        .param("expr", ParamKind::String, "a single math expression")
        .returns("float")
        .sync(|args| {
            let expr = str_arg(args, "expr")?;
            let total = expr
                .split('+')
                .map(|t| t.trim().parse::<f64>())
                .sum::<Result<f64, _>>()
                .map_err(|e| CapabilityError::InvalidArgument {
                    name: "expr".to_string(),
                    reason: e.to_string(),
                })?;
            Ok(json!(total))
        })
        .unwrap()
}

fn write_file() -> Capability {
    Capability::builder("write_file")
        .description("Write content into a file")
        .param("filename", ParamKind::String, "path of the file")
        .param("content", ParamKind::String, "text to write")
        .returns("str")
        .sync(|args| {
            let filename = str_arg(args, "filename")?;
            let content = str_arg(args, "content")?;
            std::fs::write(filename, content).map_err(|e| CapabilityError::failed(e.to_string()))?;
            Ok(json!(format!("{content} written to {filename}.")))
        })
        .unwrap()
}

fn delegation_name(child: &str) -> String {
    format!("{DELEGATION_PREFIX}{child}")
}

#[test]
fn scenario_a_single_capability_then_complete() {
    let mock = Arc::new(MockLlmClient::new([
        "step_1: (Start) compute 2+2\nstep_2: (After: computed) stop".to_string(),
        "[calculator, calculator]".to_string(),
        next_move(json!({"expr": "2+2"}), "calculator"),
        summary("calculator", json!({"expr": "2+2"}), json!(4.0), "I computed 2+2 = 4."),
        next_move(json!({}), "-mission-complete-"),
        "You wanted 2+2 computed; it is 4. Done.".to_string(),
    ]));
    let mut agent = Agent::builder(Brain::new(mock.clone()))
        .name("jack")
        .capability(calculator())
        .build()
        .unwrap();

    let report = agent.assign("compute 2+2 then stop").unwrap().run().unwrap();

    assert!(report.outcome.success);
    assert_eq!(report.memory.len(), 1);
    let record = &report.memory.entries()[0].record;
    assert_eq!(record.capability, "calculator");
    assert_eq!(record.arguments, json!({"expr": "2+2"}));
    assert_eq!(record.returned, json!(4.0));
    assert_eq!(mock.call_count(), 6);
}

#[test]
fn scenario_b_no_capabilities_fails() {
    let mock = Arc::new(MockLlmClient::new([
        "step_1: (Start) book a flight".to_string(),
        next_move(json!({}), "-mission-failed-"),
        "You wanted a flight booked, but I have no ability to do it.".to_string(),
    ]));
    let mut agent = Agent::builder(Brain::new(mock.clone()))
        .termination(1e-9, 1.5)
        .seed(7)
        .build()
        .unwrap();

    let outcome = agent.assign("book a flight").unwrap().just_do_it().unwrap();

    assert!(!outcome.success);
    assert!(outcome.response.contains("no ability"));
    assert_eq!(mock.call_count(), 3);
}

#[test]
fn scenario_c_delegate_memory_is_merged_into_parent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("file.txt");
    let path_str = path.to_string_lossy().to_string();
    let child_args = json!({"filename": path_str, "content": "X"});
    let talk = delegation_name("tylor");

    let mock = Arc::new(MockLlmClient::new([
        // 构建父 Agent 时子 Agent 的自我介绍
        "My name is tylor. What can I do: write files.".to_string(),
        // 父：分解、计划、决策
        "step_1: (Start) write X to file.txt".to_string(),
        format!("[{talk}, {talk}]"),
        next_move(json!({"instruction": "write X to file.txt"}), &talk),
        // 子：计划、决策、执行摘要、完成、结论
        "[write_file, write_file]".to_string(),
        next_move(child_args.clone(), "write_file"),
        summary("write_file", child_args.clone(), json!("X written"), "I wrote X to the file."),
        next_move(json!({}), "-mission-complete-"),
        "You wanted X written to file.txt and it is done.".to_string(),
        // 父：执行摘要、完成、结论
        summary(&talk, json!("asked for a favor"), json!({"success": true}), "tylor wrote the file for me."),
        next_move(json!({}), "-mission-complete-"),
        "You wanted X written to file.txt; tylor did it.".to_string(),
    ]));
    let brain = Brain::new(mock.clone());

    let child = Agent::builder(brain.clone())
        .name("tylor")
        .capability(write_file())
        .build()
        .unwrap();
    let mut parent = Agent::builder(brain)
        .name("ceo")
        .delegate(Arc::new(Mutex::new(child)))
        .build()
        .unwrap();
    assert!(parent.capabilities().contains(&talk));

    let report = parent.assign("write X to file.txt").unwrap().run().unwrap();

    assert!(report.outcome.success);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "X");
    let entries = report.memory.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].agent, "tylor");
    assert_eq!(entries[0].record.capability, "write_file");
    assert_eq!(entries[1].agent, "ceo");
    assert_eq!(entries[1].record.arguments, json!("asked for a favor"));
    assert_eq!(entries[1].record.returned["success"], true);
    assert!(entries[1].record.returned.get("memory").is_none());
    // 子 Agent 收到的是指令 + 父 Agent 的分步描述，不再重新分解
    assert!(mock.prompts()[5].contains("<user_request>write X to file.txt</user_request>"));
    assert_eq!(mock.remaining(), 0);
}

#[test]
fn scenario_d_empty_request_short_circuits() {
    let mock = Arc::new(MockLlmClient::default());
    let mut agent = Agent::builder(Brain::new(mock.clone()))
        .capability(calculator())
        .build()
        .unwrap();

    agent.assign("").unwrap();
    let first = agent.request().clone();
    agent.assign("").unwrap();

    assert_eq!(first, ResolvedRequest::do_nothing());
    assert_eq!(agent.request(), &first);
    assert_eq!(agent.termination().expected_steps(), 0);
    assert_eq!(mock.call_count(), 0);
}

#[test]
fn next_move_retries_are_bounded() {
    let mock = Arc::new(
        MockLlmClient::new(["step_1: (Start) anything"]).with_fallback("I refuse to follow the format."),
    );
    let mut agent = Agent::builder(Brain::new(mock.clone()))
        .termination(1e-9, 1.5)
        .next_move_retries(2)
        .build()
        .unwrap();

    let err = agent.assign("anything").unwrap().just_do_it().unwrap_err();

    match err {
        AgentError::OracleIncapable {
            oracle,
            stage,
            attempts,
            ..
        } => {
            assert_eq!(oracle, "mock");
            assert_eq!(stage, "next_move");
            assert_eq!(attempts, 3);
        }
        other => panic!("Expected OracleIncapable, got {other:?}"),
    }
    assert_eq!(mock.call_count(), 4);
    assert!(agent.memory().is_empty());
}

#[test]
fn termination_policy_can_stop_before_any_move() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mock = Arc::new(MockLlmClient::new([
        "step_1: (Start) anything".to_string(),
        "I stopped before doing anything.".to_string(),
    ]));
    let mut agent = Agent::builder(Brain::new(mock.clone()))
        .termination(0.999_999, 1.0)
        .seed(42)
        .events(tx)
        .build()
        .unwrap();

    let outcome = agent.assign("anything").unwrap().just_do_it().unwrap();

    assert!(!outcome.success);
    assert_eq!(mock.call_count(), 2);
    let mut stopped = false;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, AgentEvent::Stopped { .. }) {
            stopped = true;
        }
    }
    assert!(stopped);
}

#[test]
fn delegation_beyond_max_depth_is_refused() {
    let talk = delegation_name("kid");
    let mock = Arc::new(MockLlmClient::new([
        "My name is kid.".to_string(),
        "step_1: (Start) ask kid".to_string(),
        format!("[{talk}, {talk}]"),
        next_move(json!({"instruction": "do it"}), &talk),
        summary(&talk, json!("asked for a favor"), json!({"success": false}), "kid refused."),
        next_move(json!({}), "-mission-failed-"),
        "You wanted kid's help but kid refused.".to_string(),
    ]));
    let brain = Brain::new(mock.clone());
    let kid = Agent::builder(brain.clone())
        .name("kid")
        .capability(calculator())
        .max_depth(0)
        .build()
        .unwrap();
    let mut parent = Agent::builder(brain)
        .name("boss")
        .delegate(Arc::new(Mutex::new(kid)))
        .build()
        .unwrap();

    let report = parent.assign("ask kid").unwrap().run().unwrap();

    assert!(!report.outcome.success);
    assert!(mock.prompts()[4].contains("too deep"));
    assert_eq!(report.memory.len(), 1);
    assert_eq!(report.memory.entries()[0].record.returned["success"], false);
}

#[test]
fn delegation_cycle_is_refused_instead_of_deadlocking() {
    let to_a = delegation_name("a");
    let to_b = delegation_name("b");
    let mock = Arc::new(MockLlmClient::new([
        "My name is b.".to_string(),
        "My name is a.".to_string(),
        // a：分解、计划、决策
        "step_1: (Start) ping".to_string(),
        format!("[{to_b}, {to_b}]"),
        next_move(json!({"instruction": "ping a back"}), &to_b),
        // b：计划、决策（回到 a，被拒绝）、执行摘要、失败、结论
        format!("[{to_a}, {to_a}]"),
        next_move(json!({"instruction": "ping"}), &to_a),
        summary(&to_a, json!("asked for a favor"), json!({"success": false}), "a is busy."),
        next_move(json!({}), "-mission-failed-"),
        "a was busy.".to_string(),
        // a：执行摘要、完成、结论
        summary(&to_b, json!("asked for a favor"), json!({"success": false}), "b could not reach me."),
        next_move(json!({}), "-mission-complete-"),
        "Done.".to_string(),
    ]));
    let brain = Brain::new(mock.clone());

    let b = Arc::new(Mutex::new(Agent::builder(brain.clone()).name("b").build().unwrap()));
    let a = Arc::new(Mutex::new(
        Agent::builder(brain).name("a").delegate(b.clone()).build().unwrap(),
    ));
    let back = capability::delegate(a.clone()).unwrap();
    assert!(b.lock().unwrap().grant(back));

    let mut guard = a.lock().unwrap();
    let report = guard.assign("ping").unwrap().run().unwrap();

    assert!(report.outcome.success);
    assert!(mock.prompts()[7].contains("busy"));
    assert_eq!(mock.remaining(), 0);
}

#[test]
fn streamed_conclusion_emits_chunks() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mock = Arc::new(MockLlmClient::new([
        "step_1: (Start) nothing".to_string(),
        next_move(json!({}), "-mission-failed-"),
        "I could not help you.".to_string(),
    ]));
    let mut agent = Agent::builder(Brain::new(mock))
        .termination(1e-9, 1.5)
        .stream_conclusion(true)
        .events(tx)
        .build()
        .unwrap();

    let outcome = agent.assign("nothing").unwrap().just_do_it().unwrap();
    assert_eq!(outcome.response, "I could not help you.");

    let mut chunks = String::new();
    let mut concluded = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            AgentEvent::ConclusionChunk { text } => chunks.push_str(&text),
            AgentEvent::Concluded { success, .. } => {
                assert!(!success);
                concluded = true;
            }
            _ => {}
        }
    }
    assert_eq!(chunks, "I could not help you.");
    assert!(concluded);
}

#[test]
fn delegate_oracle_failure_surfaces_as_oracle_incapable() {
    let talk = delegation_name("kid");
    let mock = Arc::new(
        MockLlmClient::new([
            "My name is kid.".to_string(),
            "step_1: (Start) ask kid".to_string(),
            format!("[{talk}, {talk}]"),
            next_move(json!({"instruction": "compute 2+2"}), &talk),
        ])
        // 子 Agent 的计划与决策都收到乱码
        .with_fallback("garbage"),
    );
    let brain = Brain::new(mock.clone());
    let kid = Agent::builder(brain.clone())
        .name("kid")
        .capability(calculator())
        .termination(1e-9, 1.5)
        .next_move_retries(1)
        .build()
        .unwrap();
    let mut parent = Agent::builder(brain)
        .name("boss")
        .delegate(Arc::new(Mutex::new(kid)))
        .build()
        .unwrap();

    let err = parent.assign("ask kid").unwrap().run().unwrap_err();

    match err {
        AgentError::OracleIncapable {
            oracle,
            stage,
            attempts,
            ..
        } => {
            assert_eq!(oracle, "mock");
            assert_eq!(stage, "next_move");
            assert_eq!(attempts, 2);
        }
        other => panic!("Expected OracleIncapable, got {other:?}"),
    }
    // 介绍、分解、计划、决策，子 Agent 计划 + 两次决策
    assert_eq!(mock.call_count(), 7);
    assert!(parent.memory().is_empty());
}

#[test]
fn parent_memory_is_forwarded_to_delegate_without_duplicates() {
    let talk = delegation_name("kid");
    let mock = Arc::new(MockLlmClient::new([
        "My name is kid.".to_string(),
        // 父：分解、计划，先自己算一步
        "step_1: (Start) compute 2+2\nstep_2: (After: computed) ask kid to check".to_string(),
        format!("[calculator, {talk}, {talk}]"),
        next_move(json!({"expr": "2+2"}), "calculator"),
        summary("calculator", json!({"expr": "2+2"}), json!(4.0), "boss-computed-four"),
        // 再委派
        next_move(json!({"instruction": "check that 2+2 is 4"}), &talk),
        // 子：计划、决策（直接完成）、结论
        "[calculator, calculator]".to_string(),
        next_move(json!({}), "-mission-complete-"),
        "The sum was already computed as 4.".to_string(),
        // 父：执行摘要、完成、结论
        summary(&talk, json!("asked for a favor"), json!({"success": true}), "kid confirmed."),
        next_move(json!({}), "-mission-complete-"),
        "You wanted 2+2 computed and checked. Done.".to_string(),
    ]));
    let brain = Brain::new(mock.clone());
    let kid = Agent::builder(brain.clone())
        .name("kid")
        .capability(calculator())
        .build()
        .unwrap();
    let mut parent = Agent::builder(brain)
        .name("boss")
        .capability(calculator())
        .delegate(Arc::new(Mutex::new(kid)))
        .build()
        .unwrap();

    let report = parent.assign("compute 2+2 and ask kid to check").unwrap().run().unwrap();

    assert!(report.outcome.success);
    // 子 Agent 的决策 prompt 带着父 Agent 的历史
    assert!(mock.prompts()[7].contains("boss-computed-four"));

    let entries = report.memory.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].summary, "boss-computed-four");
    assert_eq!(entries[1].record.capability, talk);
    let keys: std::collections::HashSet<&str> = report.memory.keys().collect();
    assert_eq!(keys.len(), 2);
    assert_eq!(mock.remaining(), 0);
}
