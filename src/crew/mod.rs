//! Crew configuration: personas, agent and task definitions, bundled crews.

pub mod definition;
pub mod persona;
pub mod registry;

pub use definition::{AgentDefinition, CrewDefinition, TaskDefinition};
pub use persona::Persona;
pub use registry::CrewRegistry;
