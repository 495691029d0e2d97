use std::sync::Arc;

use anyhow::Result;
use chrono::Local;

use crate::llm::{
    CompletionProvider, PlanningProvider, MAX_RESPONSE_TOKENS, MAX_STARTUP_TOPIC_TOKENS,
    MAX_SUMMARY_TOKENS,
};
use crate::message::Message;
use crate::plan::{Plan, ResponseGate};
use crate::prompt;
use crate::roles::ContactDirectory;
use crate::turns::{merge_turns, summary_transcript, Turn, TurnRole};

/// Response generation pipeline: recent-context windowing, planning, the ack
/// gate, and the completion call. Pure over its inputs — the ledger is only
/// ever read, and the last-reply cache is passed in by the orchestrator.
pub struct Responder {
    completion: Arc<dyn CompletionProvider>,
    planner: Arc<dyn PlanningProvider>,
    gate: ResponseGate,
    contacts: ContactDirectory,
    bot_name: String,
    context_window: usize,
}

impl Responder {
    pub fn new(
        completion: Arc<dyn CompletionProvider>,
        planner: Arc<dyn PlanningProvider>,
        gate: ResponseGate,
        contacts: ContactDirectory,
        bot_name: impl Into<String>,
        context_window: usize,
    ) -> Self {
        Self {
            completion,
            planner,
            gate,
            contacts,
            bot_name: bot_name.into(),
            context_window,
        }
    }

    /// Generate a reply over the recent history, or `None` when the planner
    /// or gate decides to stay quiet. Completion transport failures surface
    /// as errors for the orchestrator to log and drop.
    pub async fn generate_response(
        &mut self,
        history: &[Message],
        last_reply: Option<&str>,
    ) -> Result<Option<String>> {
        if history.is_empty() {
            return Ok(None);
        }

        let recent = self.recent_window(history, last_reply);
        let turns = merge_turns(&recent, &self.contacts, &self.bot_name);

        let plan = self.plan_or_default(&turns).await;
        if !self.gate.should_send(&plan) {
            tracing::debug!(intent = plan.intent.as_str(), "gate held the reply back");
            return Ok(None);
        }

        let turns = with_trailing_instruction(turns, &prompt::response_context(&plan));
        let reply = self
            .completion
            .complete(prompt::SYSTEM_PROMPT, &turns, MAX_RESPONSE_TOKENS)
            .await?;

        let reply = reply.trim();
        if reply.is_empty() {
            tracing::debug!("completion returned empty text, no reply this cycle");
            return Ok(None);
        }
        Ok(Some(reply.to_string()))
    }

    /// Summary-aware variant for long conversations: the summary is embedded
    /// in the task and the model may answer the skip sentinel when nothing
    /// is left unanswered.
    pub async fn generate_with_summary(
        &mut self,
        history: &[Message],
        summary: &str,
        last_reply: Option<&str>,
    ) -> Result<Option<String>> {
        if history.is_empty() {
            return Ok(None);
        }

        let recent = self.recent_window(history, last_reply);
        let turns = merge_turns(&recent, &self.contacts, &self.bot_name);

        let plan = self.plan_or_default(&turns).await;
        if !self.gate.should_send(&plan) {
            tracing::debug!(intent = plan.intent.as_str(), "gate held the reply back");
            return Ok(None);
        }

        let turns = with_trailing_instruction(turns, &prompt::summary_task(summary, &plan));
        let reply = self
            .completion
            .complete(prompt::SYSTEM_PROMPT, &turns, MAX_RESPONSE_TOKENS)
            .await?;

        let reply = reply.trim();
        if reply.is_empty() {
            tracing::debug!("summary-aware completion returned empty text");
            return Ok(None);
        }
        if reply.eq_ignore_ascii_case(prompt::SKIP_SENTINEL) {
            tracing::debug!("summary-aware completion returned the skip sentinel");
            return Ok(None);
        }
        Ok(Some(reply.to_string()))
    }

    /// Compress the conversation for later summary-conditioned replies.
    /// Failures degrade to `None`; a missing summary is never fatal.
    pub async fn generate_summary(&self, messages: &[Message]) -> Option<String> {
        if messages.is_empty() {
            return None;
        }
        let transcript = summary_transcript(messages, &self.contacts, &self.bot_name);
        let turns = vec![Turn {
            role: TurnRole::User,
            content: prompt::summary_prompt(&transcript),
        }];
        match self
            .completion
            .complete(prompt::SYSTEM_PROMPT, &turns, MAX_SUMMARY_TOKENS)
            .await
        {
            Ok(summary) => {
                let summary = summary.trim();
                (!summary.is_empty()).then(|| summary.to_string())
            }
            Err(e) => {
                tracing::warn!("summary generation failed: {e:#}");
                None
            }
        }
    }

    /// Proactive opener for when the backlog is empty, conditioned on the
    /// last few messages and the summary so it avoids stale topics.
    pub async fn generate_startup_topic(
        &self,
        recent: &[Message],
        summary: Option<&str>,
    ) -> Option<String> {
        let transcript = summary_transcript(recent, &self.contacts, &self.bot_name);
        let turns = vec![Turn {
            role: TurnRole::User,
            content: prompt::startup_topic_prompt(&transcript, summary),
        }];
        match self
            .completion
            .complete(prompt::SYSTEM_PROMPT, &turns, MAX_STARTUP_TOPIC_TOKENS)
            .await
        {
            Ok(topic) => {
                let topic = topic.trim();
                (!topic.is_empty()).then(|| topic.to_string())
            }
            Err(e) => {
                tracing::warn!("startup topic generation failed: {e:#}");
                None
            }
        }
    }

    /// Last `context_window` messages, with the cached last reply appended as
    /// a placeholder assistant message when the window shows none — e.g.
    /// after a restart where the external snapshot is stale.
    fn recent_window(&self, history: &[Message], last_reply: Option<&str>) -> Vec<Message> {
        let start = history.len().saturating_sub(self.context_window);
        let mut recent: Vec<Message> = history[start..].to_vec();

        let has_assistant = recent.iter().any(|m| m.is_assistant(&self.bot_name));
        if !has_assistant {
            if let Some(reply) = last_reply {
                tracing::debug!("recent window lacks an assistant message, appending cached reply");
                recent.push(Message {
                    timestamp: Some(Local::now()),
                    ..Message::from_agent(self.bot_name.clone(), reply)
                });
            }
        }
        recent
    }

    async fn plan_or_default(&self, turns: &[Turn]) -> Plan {
        let context = format!("Time: {}", prompt::time_of_day());
        match self.planner.plan(turns, &context).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!("planning call failed, using safe default plan: {e:#}");
                Plan::safe_default()
            }
        }
    }
}

/// Append the task instruction to the final user turn, or add one when the
/// sequence ends on an assistant turn.
fn with_trailing_instruction(mut turns: Vec<Turn>, instruction: &str) -> Vec<Turn> {
    match turns.last_mut() {
        Some(turn) if turn.role == TurnRole::User => {
            turn.content.push_str("\n\n");
            turn.content.push_str(instruction);
        }
        _ => turns.push(Turn {
            role: TurnRole::User,
            content: instruction.to_string(),
        }),
    }
    turns
}
