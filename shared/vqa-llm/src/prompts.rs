//! Prompt assembly for video questions

use vqa_core::format_timestamp;

/// Header the context selector puts in front of assembled excerpts
pub const TITLE_HEADER: &str = "VIDEO TITLE:";

/// System instructions: conversational persona grounded in one video
pub fn system_prompt(video_title: &str, current_time: f64) -> String {
    let timestamp = format_timestamp(current_time);

    format!(
        "You are an assistant that helps users understand the video they are watching. \
You speak in a conversational, direct manner and never use phrases like \"the transcript indicates\" \
or \"based on the transcript\".
You have access to excerpts from the video titled \"{title}\".
The user is currently at timestamp {timestamp}.

Your responses must ONLY be about this video titled \"{title}\". Do not bring in other videos.

Instructions:
1. Answer as if explaining directly to the user, not describing a transcript.
2. Start with the direct answer and keep a confident tone without hedging.
3. Stay grounded in the supplied context; if it does not cover the question, say so briefly.
4. Use both the title and the excerpts when asked who is in the video or what it is about.
5. For questions about what just happened or was just said, use the content near {timestamp}.
6. Be concise but thorough.",
        title = video_title,
        timestamp = timestamp,
    )
}

/// Leading lines that look like a description, when the excerpt has no title header
fn description_lines(context: &str) -> Option<String> {
    if context.contains(TITLE_HEADER) {
        return None;
    }

    let lines: Vec<&str> = context.lines().take(5).collect();
    let looks_like_description = lines
        .iter()
        .any(|line| line.to_lowercase().contains("description") || line.contains("About:"));

    looks_like_description.then(|| lines.join("\n"))
}

/// User payload: title, timestamp, context block and question
pub fn user_prompt(question: &str, context: &str, video_title: &str, current_time: f64) -> String {
    let description = description_lines(context)
        .map(|d| format!("DESCRIPTION/BEGINNING: {}\n", d))
        .unwrap_or_default();

    format!(
        "VIDEO INFORMATION:
TITLE: \"{title}\"
{description}CURRENT TIMESTAMP: {timestamp}

CONTEXT FROM THE VIDEO:
---
{context}
---

QUESTION: {question}

Answer directly and conversationally, without referring to \"the transcript\".
Your answer should ONLY be about THIS video.",
        title = video_title,
        description = description,
        timestamp = format_timestamp(current_time),
        context = context,
        question = question,
    )
}
