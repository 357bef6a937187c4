//! Adapters between the engine's collaborator traits and the services this server talks to.
pub mod catalog;
pub mod gateway;
