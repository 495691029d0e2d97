//! Family group-chat companion agent.
//!
//! Watches a single iMessage thread, keeps a bounded in-memory ledger of the
//! conversation, and decides each poll cycle whether to answer the backlog of
//! unanswered messages in one consolidated reply.

pub mod backlog;
pub mod bot;
pub mod config;
pub mod imessage;
pub mod ledger;
pub mod llm;
pub mod message;
pub mod plan;
pub mod prompt;
pub mod responder;
pub mod roles;
pub mod strategy;
pub mod turns;
