use serde::{Deserialize, Serialize};

/// The simulated agents taking part in a crisis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    Sentinel,
    Risk,
    Simulation,
    Resource,
    Response,
    Governance,
}

impl AgentKind {
    pub const ALL: [AgentKind; 6] = [
        AgentKind::Sentinel,
        AgentKind::Risk,
        AgentKind::Simulation,
        AgentKind::Resource,
        AgentKind::Response,
        AgentKind::Governance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AgentKind::Sentinel => "Sentinel",
            AgentKind::Risk => "Risk",
            AgentKind::Simulation => "Simulation",
            AgentKind::Resource => "Resource",
            AgentKind::Response => "Response",
            AgentKind::Governance => "Governance",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl AsRef<str> for AgentKind {
    fn as_ref(&self) -> &str {
        self.name()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub active: bool,
    pub last_action: Option<String>,
}

/// Active flags and last action per agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentRoster {
    agents: [AgentState; 6],
}

impl AgentRoster {
    pub fn activate(&mut self, kind: AgentKind, action: &str) {
        let agent = &mut self.agents[kind.index()];
        agent.active = true;
        agent.last_action = Some(action.to_string());
    }

    pub fn deactivate_all(&mut self) {
        for agent in &mut self.agents {
            agent.active = false;
        }
    }

    pub fn is_active(&self, kind: AgentKind) -> bool {
        self.agents[kind.index()].active
    }

    pub fn last_action(&self, kind: AgentKind) -> Option<&str> {
        self.agents[kind.index()].last_action.as_deref()
    }

    pub fn active_count(&self) -> usize {
        self.agents.iter().filter(|a| a.active).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentKind, &AgentState)> {
        AgentKind::ALL.into_iter().zip(self.agents.iter())
    }
}
