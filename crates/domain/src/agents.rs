//! The closed set of workers and the process-wide agent registry.
//!
//! Adding a worker here forces the compiler through every exhaustive
//! match: model-class policy, prompt binding, node dispatch, and the
//! event projector all key on [`Worker`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::llm::ModelClass;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Worker
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A named role in the team. The graph nodes are exactly these workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Worker {
    Coordinator,
    Planner,
    Supervisor,
    Researcher,
    Coder,
    Browser,
    Reporter,
    Translator,
}

impl Worker {
    pub const ALL: [Worker; 8] = [
        Worker::Coordinator,
        Worker::Planner,
        Worker::Supervisor,
        Worker::Researcher,
        Worker::Coder,
        Worker::Browser,
        Worker::Reporter,
        Worker::Translator,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Worker::Coordinator => "coordinator",
            Worker::Planner => "planner",
            Worker::Supervisor => "supervisor",
            Worker::Researcher => "researcher",
            Worker::Coder => "coder",
            Worker::Browser => "browser",
            Worker::Reporter => "reporter",
            Worker::Translator => "translator",
        }
    }

    /// Whether the client may omit this worker from a run's roster.
    /// Coordinator, planner, supervisor, and reporter cannot be disabled.
    pub fn is_optional(&self) -> bool {
        match self {
            Worker::Coordinator | Worker::Planner | Worker::Supervisor | Worker::Reporter => false,
            Worker::Researcher | Worker::Coder | Worker::Browser | Worker::Translator => true,
        }
    }

    /// Default model class for this worker when deep-thinking is off.
    pub fn default_model_class(&self) -> ModelClass {
        match self {
            Worker::Browser => ModelClass::Vision,
            Worker::Coordinator
            | Worker::Planner
            | Worker::Supervisor
            | Worker::Researcher
            | Worker::Coder
            | Worker::Reporter
            | Worker::Translator => ModelClass::Basic,
        }
    }
}

impl fmt::Display for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Worker {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coordinator" => Ok(Worker::Coordinator),
            "planner" => Ok(Worker::Planner),
            "supervisor" => Ok(Worker::Supervisor),
            "researcher" => Ok(Worker::Researcher),
            "coder" => Ok(Worker::Coder),
            "browser" => Ok(Worker::Browser),
            "reporter" => Ok(Worker::Reporter),
            "translator" => Ok(Worker::Translator),
            other => Err(Error::Roster(format!("unknown worker: {other}"))),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent registry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One registry row: how a worker is presented to humans and to the LLM.
#[derive(Debug, Clone, Serialize)]
pub struct AgentProfile {
    pub name: &'static str,
    /// Human-facing description (rendered in the team_members listing).
    pub description: &'static str,
    /// Description handed to the supervisor/planner prompts.
    pub llm_description: &'static str,
    pub optional: bool,
    #[serde(skip)]
    pub worker: Worker,
}

/// The static, process-wide agent table.
pub const AGENT_REGISTRY: [AgentProfile; 8] = [
    AgentProfile {
        name: "coordinator",
        description: "Talks to the user, decides whether a request needs the planning pipeline.",
        llm_description: "Handles greetings and small talk; hands real tasks to the planner.",
        optional: false,
        worker: Worker::Coordinator,
    },
    AgentProfile {
        name: "planner",
        description: "Breaks a request into an ordered plan of worker steps.",
        llm_description: "Produces the structured task plan the supervisor executes.",
        optional: false,
        worker: Worker::Planner,
    },
    AgentProfile {
        name: "supervisor",
        description: "Dispatches plan steps to team members and decides when the run is finished.",
        llm_description: "Routes control between team members until the task is done.",
        optional: false,
        worker: Worker::Supervisor,
    },
    AgentProfile {
        name: "researcher",
        description: "Searches the web and medical literature, summarises findings.",
        llm_description: "Uses web search, URL crawling, and abstract search to gather evidence. \
                          Cannot do math or program.",
        optional: true,
        worker: Worker::Researcher,
    },
    AgentProfile {
        name: "coder",
        description: "Runs Python and shell commands for computation and data wrangling.",
        llm_description: "Executes Python code and shell commands; use for math, data \
                          processing, and file manipulation.",
        optional: true,
        worker: Worker::Coder,
    },
    AgentProfile {
        name: "browser",
        description: "Drives a real browser for sites that need interaction.",
        llm_description: "Performs complex browsing tasks that plain crawling cannot: logins, \
                          searches within a site, multi-step navigation.",
        optional: true,
        worker: Worker::Browser,
    },
    AgentProfile {
        name: "reporter",
        description: "Writes the final report presented to the user.",
        llm_description: "Summarises the run's findings into the final answer. Always the \
                          last step.",
        optional: false,
        worker: Worker::Reporter,
    },
    AgentProfile {
        name: "translator",
        description: "Translates non-English requests before planning begins.",
        llm_description: "Translates the user's request into English, preserving medical \
                          terminology.",
        optional: true,
        worker: Worker::Translator,
    },
];

/// Look up the registry row for a worker.
pub fn profile(worker: Worker) -> &'static AgentProfile {
    AGENT_REGISTRY
        .iter()
        .find(|p| p.worker == worker)
        .expect("every worker has a registry row")
}

/// The roster used when the client does not send `team_members`.
pub fn default_roster() -> Vec<Worker> {
    vec![
        Worker::Researcher,
        Worker::Coder,
        Worker::Browser,
        Worker::Reporter,
    ]
}

/// Validate a client-supplied roster.
///
/// The roster names the workers the supervisor may dispatch to. Rules:
/// - must not be empty;
/// - every name must be a registered worker;
/// - the reporter (the only mandatory dispatchable worker) must be present.
///
/// Coordinator, planner, and supervisor are graph infrastructure — they are
/// always active and are ignored if listed.
pub fn validate_roster(names: &[String]) -> Result<Vec<Worker>, Error> {
    if names.is_empty() {
        return Err(Error::Roster("team_members must not be empty".into()));
    }

    let mut roster = Vec::new();
    for name in names {
        let worker: Worker = name.parse()?;
        match worker {
            Worker::Coordinator | Worker::Planner | Worker::Supervisor => continue,
            w if !roster.contains(&w) => roster.push(w),
            _ => {}
        }
    }

    if !roster.contains(&Worker::Reporter) {
        return Err(Error::Roster(
            "team_members must include the mandatory reporter".into(),
        ));
    }

    Ok(roster)
}
