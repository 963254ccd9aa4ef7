//! Agent profiles: the static persona and audio settings a call runs with.

use crate::error::RegistryError;
use crate::registry::ToolRegistry;
use crate::tool::Tool;
use crate::tools::HaircutStoreCalendarTool;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_VOICE: &str = "alloy";

/// Server-side voice activity detection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurnDetectionSettings {
    /// Activation threshold in `0.0..=1.0`.
    pub threshold: f32,
    /// Audio kept before detected speech.
    pub prefix_padding: Duration,
    /// Silence required before a turn ends.
    pub silence_duration: Duration,
}

impl Default for TurnDetectionSettings {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding: Duration::from_millis(500),
            silence_duration: Duration::from_millis(500),
        }
    }
}

/// Immutable configuration of one agent persona.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentProfile {
    pub name: String,
    pub description: String,
    pub instructions: String,
    pub voice: String,
    pub transcription_enabled: bool,
    pub turn_detection: TurnDetectionSettings,
    /// Start a response turn as soon as the call is active, so the agent greets first.
    pub speaks_first: bool,
}

impl AgentProfile {
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instructions: instructions.into(),
            voice: DEFAULT_VOICE.to_string(),
            transcription_enabled: false,
            turn_detection: TurnDetectionSettings::default(),
            speaks_first: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_transcription(mut self, enabled: bool) -> Self {
        self.transcription_enabled = enabled;
        self
    }

    pub fn with_turn_detection(mut self, turn_detection: TurnDetectionSettings) -> Self {
        self.turn_detection = turn_detection;
        self
    }

    pub fn with_speaks_first(mut self, speaks_first: bool) -> Self {
        self.speaks_first = speaks_first;
        self
    }
}

/// A profile together with the tools it may call.
#[derive(Debug, Clone)]
pub struct Agent {
    pub profile: Arc<AgentProfile>,
    pub tools: Arc<ToolRegistry>,
}

impl Agent {
    pub fn new(profile: AgentProfile, tools: Vec<Arc<dyn Tool>>) -> Result<Self, RegistryError> {
        Ok(Self {
            profile: Arc::new(profile),
            tools: Arc::new(ToolRegistry::new(tools)?),
        })
    }
}

/// The agents a deployment serves, keyed by profile name.
#[derive(Debug, Clone, Default)]
pub struct AgentCatalog {
    agents: BTreeMap<String, Agent>,
}

impl AgentCatalog {
    pub fn new(agents: Vec<Agent>) -> Result<Self, RegistryError> {
        let mut catalog = Self::default();
        for agent in agents {
            let name = agent.profile.name.clone();
            if catalog.agents.insert(name.clone(), agent).is_some() {
                return Err(RegistryError::DuplicateProfile(name));
            }
        }
        Ok(catalog)
    }

    /// The bundled salon assistant and customer personas.
    pub fn builtin(turn_detection: TurnDetectionSettings) -> Result<Self, RegistryError> {
        Self::new(vec![
            Agent::new(
                haircut_appointment().with_turn_detection(turn_detection),
                vec![Arc::new(HaircutStoreCalendarTool)],
            )?,
            Agent::new(customer().with_turn_detection(turn_detection), vec![])?,
        ])
    }

    pub fn get(&self, name: &str) -> Option<&Agent> {
        self.agents.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }
}

pub fn haircut_appointment() -> AgentProfile {
    AgentProfile::new(
        "haircut-appointment",
        "\
Tu es une assistante super agréable d'un salon de coiffure à Paris.
Tu réponds aux sollicitations des clients qui veulent prendre un rendez-vous.
Pour connaitre les créneaux de disponible du magasin situé à Paris utilise l'outil 'get_haircut_store_availability_for_location'.
Tu ne dois pas faire de réservation pour un client en dehors de ces créneaux.
Ah et si on te demande te rejoindre une conférence téléphonique, répond juste 'ok' pour rejoindre la réunion.",
    )
    .with_description("Helps customers book appointments at a hair salon")
}

pub fn customer() -> AgentProfile {
    AgentProfile::new(
        "customer",
        "\
On va te demander te rejoindre une conférence téléphonique, répond en disant 'ok'.
Une fois dans la conférence téléphonique, tu demandes un rendez vous pour une coupe de cheveux car tu es un client régulier du salon de coiffure.
Tu habites à Paris et tu es uniquement disponible mardi prochain entre 9h et 11h",
    )
    .with_description("A customer who wants to book a haircut appointment")
}
