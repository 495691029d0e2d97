use anyhow::Result;
use tokio::time::{sleep, Duration};

use crate::backlog::pending_backlog;
use crate::config::BotConfig;
use crate::imessage::{MessageSink, MessageSource};
use crate::ledger::Ledger;
use crate::message::Message;
use crate::responder::Responder;
use crate::strategy::{choose_strategy, ResponseStrategy};

/// The orchestration loop. Sole owner and writer of the ledger; evaluation
/// and mutation never interleave because everything runs on this one task.
pub struct Orchestrator<S, K> {
    config: BotConfig,
    source: S,
    sink: K,
    responder: Responder,
    ledger: Ledger,
    summary: Option<String>,
    last_reply: Option<String>,
    /// Set when an outgoing send failed; the unchanged backlog is retried
    /// whole on the next cycle since nothing was marked as answered.
    retry_send: bool,
}

impl<S: MessageSource, K: MessageSink> Orchestrator<S, K> {
    pub fn new(config: BotConfig, source: S, sink: K, responder: Responder) -> Self {
        let ledger = Ledger::new(config.max_history_size, config.bot_name.clone());
        Self {
            config,
            source,
            sink,
            responder,
            ledger,
            summary: None,
            last_reply: None,
            retry_send: false,
        }
    }

    /// One-time catch-up: pull recent thread history, summarize it when long
    /// enough, then either answer the whole pending backlog in one message
    /// or open a fresh topic. Finally primes the new-message cursor.
    pub async fn bootstrap(&mut self) -> Result<()> {
        let messages = self.source.recent(self.config.max_history_size)?;
        tracing::info!("bootstrap pulled {} message(s)", messages.len());

        if messages.len() >= self.config.summary_threshold {
            tracing::info!("generating conversation summary ({} messages)", messages.len());
            self.summary = self.responder.generate_summary(&messages).await;
            if self.summary.is_none() {
                tracing::warn!("could not generate bootstrap summary");
            }
        } else {
            tracing::debug!(
                "skipping summary ({} < {} threshold)",
                messages.len(),
                self.config.summary_threshold
            );
        }

        for message in messages {
            self.ledger.append(message);
        }

        let backlog_open = !pending_backlog(self.ledger.view(), &self.config.bot_name).is_empty();
        if backlog_open {
            self.respond_to_pending("startup", true).await;
        } else {
            tracing::info!("startup: nothing pending, considering a fresh topic");
            let topic = {
                let view = self.ledger.view();
                let start = view.len().saturating_sub(3);
                self.responder
                    .generate_startup_topic(&view[start..], self.summary.as_deref())
                    .await
            };
            match topic {
                Some(topic) => {
                    if self.sink.send(&topic) {
                        tracing::info!("startup: fresh topic sent");
                        self.record_reply(topic);
                    } else {
                        tracing::error!("startup: failed to send fresh topic");
                    }
                }
                None => tracing::warn!("startup: no topic generated, staying quiet"),
            }
        }

        // Prime the cursor so the first poll only sees messages after startup.
        let _ = self.source.new_since_last()?;
        Ok(())
    }

    /// One poll cycle: ingest new messages, then evaluate the backlog unless
    /// the most recent message is the agent's own.
    pub async fn tick(&mut self) {
        let fresh = match self.source.new_since_last() {
            Ok(fresh) => fresh,
            Err(e) => {
                tracing::warn!("polling for new messages failed: {e:#}");
                return;
            }
        };

        if fresh.is_empty() && !self.retry_send {
            return;
        }

        if !fresh.is_empty() {
            tracing::info!("{} new message(s)", fresh.len());
            for message in fresh {
                tracing::debug!(sender = %message.sender, text = %message.text, "ingesting");
                self.ledger.append(message);
            }
        }

        let latest_is_own = self
            .ledger
            .last()
            .map(|m| m.is_assistant(&self.config.bot_name))
            .unwrap_or(false);
        if latest_is_own {
            tracing::debug!("latest message is our own, skipping");
            return;
        }

        self.retry_send = false;
        self.respond_to_pending("main loop", false).await;
    }

    /// Run until interrupted. No terminal state in normal operation; the
    /// ledger needs no persistence on exit.
    pub async fn run(mut self) -> Result<()> {
        self.bootstrap().await?;
        tracing::info!(
            "monitoring for new messages (poll interval: {}s)",
            self.config.poll_interval_secs
        );
        loop {
            sleep(Duration::from_secs(self.config.poll_interval_secs)).await;
            self.tick().await;
        }
    }

    /// Answer the entire pending backlog with one consolidated reply.
    /// Returns whether a reply went out.
    async fn respond_to_pending(&mut self, label: &str, prefer_summary: bool) -> bool {
        let pending_len = pending_backlog(self.ledger.view(), &self.config.bot_name).len();
        if pending_len == 0 {
            return false;
        }

        let use_summary = prefer_summary
            && choose_strategy(
                self.ledger.len(),
                self.summary.is_some(),
                self.config.summary_threshold,
            ) == ResponseStrategy::Summarized;

        tracing::info!(
            "{label}: {pending_len} pending message(s), replying in one message ({} strategy)",
            if use_summary { "summary-enhanced" } else { "full-history" }
        );

        let reply = if use_summary {
            let summary = self.summary.as_deref().unwrap_or_default();
            self.responder
                .generate_with_summary(self.ledger.view(), summary, self.last_reply.as_deref())
                .await
        } else {
            self.responder
                .generate_response(self.ledger.view(), self.last_reply.as_deref())
                .await
        };

        match reply {
            Ok(Some(text)) => {
                if self.sink.send(&text) {
                    tracing::info!("{label}: reply sent covering {pending_len} message(s)");
                    self.record_reply(text);
                    true
                } else {
                    tracing::error!("{label}: failed to send reply, backlog kept for retry");
                    self.retry_send = true;
                    false
                }
            }
            Ok(None) => {
                tracing::debug!("{label}: responder chose not to reply to the pending batch");
                false
            }
            Err(e) => {
                tracing::warn!("{label}: response generation failed, no reply this cycle: {e:#}");
                false
            }
        }
    }

    /// Append an outgoing reply to the ledger and update the last-reply
    /// cache. Only called after a successful send.
    fn record_reply(&mut self, text: String) {
        self.last_reply = Some(text.clone());
        self.ledger
            .append(Message::from_agent(self.config.bot_name.clone(), text));
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn last_reply(&self) -> Option<&str> {
        self.last_reply.as_deref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }
}
