//! Prompt binder: template + state → the message list for one worker.
//!
//! Templates are pre-authored Markdown embedded at compile time. The
//! binder substitutes the current time and the roster description, then
//! appends the run's accumulated messages. Pure over its inputs.

use chrono::{DateTime, Utc};

use mf_domain::agents::profile;
use mf_domain::message::ChatMessage;
use mf_domain::Worker;

use super::state::WorkflowState;

fn template(worker: Worker) -> &'static str {
    match worker {
        Worker::Coordinator => include_str!("../../prompts/coordinator.md"),
        Worker::Planner => include_str!("../../prompts/planner.md"),
        Worker::Supervisor => include_str!("../../prompts/supervisor.md"),
        Worker::Researcher => include_str!("../../prompts/researcher.md"),
        Worker::Coder => include_str!("../../prompts/coder.md"),
        Worker::Browser => include_str!("../../prompts/browser.md"),
        Worker::Reporter => include_str!("../../prompts/reporter.md"),
        Worker::Translator => include_str!("../../prompts/translator.md"),
    }
}

/// Render the roster section: one line per dispatchable team member.
fn render_roster(roster: &[Worker]) -> String {
    roster
        .iter()
        .map(|w| {
            let p = profile(*w);
            format!("- {}: {}", p.name, p.llm_description)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Bind a worker's instruction payload: substituted system template
/// followed by the state's accumulated messages.
pub fn bind(worker: Worker, state: &WorkflowState, now: DateTime<Utc>) -> Vec<ChatMessage> {
    let system = template(worker)
        .replace("{{CURRENT_TIME}}", &now.to_rfc3339())
        .replace("{{TEAM_MEMBERS}}", &render_roster(&state.roster));

    let mut messages = Vec::with_capacity(state.messages.len() + 1);
    messages.push(ChatMessage::system(system));
    messages.extend(state.messages.iter().cloned());
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_domain::message::MessageContent;

    fn state() -> WorkflowState {
        WorkflowState::new(
            vec![Worker::Researcher, Worker::Reporter],
            false,
            false,
            vec![ChatMessage::user("what treats migraine?")],
        )
    }

    #[test]
    fn bind_substitutes_placeholders() {
        let now = Utc::now();
        let messages = bind(Worker::Planner, &state(), now);

        let system = match &messages[0].content {
            MessageContent::Text(t) => t.clone(),
            _ => panic!("system message is text"),
        };
        assert!(!system.contains("{{CURRENT_TIME}}"));
        assert!(!system.contains("{{TEAM_MEMBERS}}"));
        assert!(system.contains(&now.to_rfc3339()));
        assert!(system.contains("- researcher:"));
        assert!(system.contains("- reporter:"));
        assert!(!system.contains("- coder:"));
    }

    #[test]
    fn bind_appends_state_messages_in_order() {
        let mut s = state();
        s.messages.push(ChatMessage::assistant("found sources"));
        let messages = bind(Worker::Supervisor, &s, Utc::now());
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages[1].content.extract_all_text(),
            "what treats migraine?"
        );
        assert_eq!(messages[2].content.extract_all_text(), "found sources");
    }

    #[test]
    fn bind_is_deterministic_for_fixed_inputs() {
        let now = Utc::now();
        let s = state();
        let a = bind(Worker::Researcher, &s, now);
        let b = bind(Worker::Researcher, &s, now);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn every_worker_has_a_template() {
        for w in Worker::ALL {
            assert!(!template(w).is_empty());
        }
    }
}
