//! Prompt templates and instruction tables. Persona wording lives in the
//! system prompt and can be replaced wholesale via configuration later; the
//! structural pieces (planning schema, length table, skip sentinel) are what
//! the rest of the pipeline depends on.

use chrono::{Local, Timelike};

use crate::plan::{Intent, Plan, ResponseLength};

pub const SYSTEM_PROMPT: &str = "You are the family's grown child replying in the family group chat. \
     Keep replies short, warm, and natural, in the language the family is using. \
     Only respond when you have something worth saying.";

/// Distinguished reply meaning "nothing to add" from the summary-aware task.
pub const SKIP_SENTINEL: &str = "SKIP";

pub fn time_of_day() -> &'static str {
    match Local::now().hour() {
        6..=11 => "morning",
        12..=17 => "afternoon",
        _ => "evening",
    }
}

pub fn planning_system_prompt(context: &str) -> String {
    format!(
        "You are a dialogue planner for a family group-chat agent. Based on the \
conversation history, plan the response strategy for the latest message.\n\n\
Context:\n{context}\n\n\
Return JSON with these fields:\n\
- should_respond: true/false (whether to reply)\n\
- intent: \"ack\" | \"ask_followup\" | \"share_story\" | \"reflect\" | \"answer_question\"\n\
- tone: \"playful\" | \"caring\" | \"neutral\" | \"enthusiastic\"\n\
- response_length: \"minimal\" | \"short\" | \"medium\"\n\
- topic: short noun (e.g., \"family\", \"work\")\n\
- hint: one instruction (e.g., \"be encouraging\")\n\n\
Intent guide:\n\
- ack: simple acknowledgment (use sparingly)\n\
- ask_followup: ask a follow-up question\n\
- share_story: share a related experience\n\
- reflect: thoughtful response\n\
- answer_question: the message asks something (?, 吗, 呢, 怎么, 什么)\n\n\
Set should_respond=false for generic/empty messages, content already \
answered, or greetings already acknowledged.\n\n\
Return only JSON."
    )
}

pub fn length_instruction(intent: Intent, length: ResponseLength) -> &'static str {
    if intent == Intent::AnswerQuestion {
        match length {
            ResponseLength::Minimal => {
                "Answer briefly in 1-2 sentences. If you don't know, say so honestly."
            }
            ResponseLength::Short => {
                "Answer in 1-2 sentences. If uncertain, admit it naturally and invite more context."
            }
            ResponseLength::Medium => {
                "Answer thoughtfully in 2-3 sentences. If you lack info, be honest and ask for more."
            }
        }
    } else {
        match length {
            ResponseLength::Minimal => "Reply in 1 very short sentence only.",
            ResponseLength::Short => "Reply in 1-2 brief sentences.",
            ResponseLength::Medium => "Reply in 2-3 sentences; you can be more thoughtful.",
        }
    }
}

fn planning_context(plan: &Plan) -> String {
    format!(
        "PLANNING CONTEXT:\n\
- Intent: {}\n\
- Tone: {}\n\
- Response Length: {} ({})\n\
- Topic: {}\n\
- Hint: {}",
        plan.intent.as_str(),
        plan.tone.as_str(),
        plan.response_length.as_str(),
        length_instruction(plan.intent, plan.response_length),
        plan.topic,
        plan.hint,
    )
}

/// Trailing instruction appended to the last user turn for a standard reply.
pub fn response_context(plan: &Plan) -> String {
    format!(
        "{}\n\nNow respond. Be brief and natural.",
        planning_context(plan)
    )
}

/// Trailing instruction for the summary-aware catch-up path. The model may
/// answer the skip sentinel when the summary shows nothing left unanswered.
pub fn summary_task(summary: &str, plan: &Plan) -> String {
    format!(
        "Conversation Summary:\n{summary}\n\n{}\n\n\
Task: Based on the summary and conversation above, if there are unanswered \
questions or pending items, respond briefly (1 sentence). Otherwise return \
\"{SKIP_SENTINEL}\".\n\nYour response:",
        planning_context(plan)
    )
}

pub fn summary_prompt(transcript: &str) -> String {
    format!(
        "Summarize the recent family conversation below in a few sentences, \
in the language the family is using. Call out unanswered questions and \
pending items explicitly.\n\nConversation:\n{transcript}\n\nSummary:"
    )
}

pub fn startup_topic_prompt(recent_transcript: &str, summary: Option<&str>) -> String {
    let summary_context = match summary {
        Some(s) => format!(
            "\nRecent conversation summary:\n{s}\n\n\
Note: avoid repeating topics already discussed in the summary. \
Start a completely new, different topic.\n"
        ),
        None => String::new(),
    };
    format!(
        "The family chat has gone quiet and everything has been answered. \
Open a fresh topic with one short, natural message.\n{summary_context}\n\
Last few messages for context:\n{recent_transcript}\n\nYour opener:"
    )
}
