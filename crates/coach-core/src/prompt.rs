use crate::config::StreamConfig;

/// Build the generation prompt for one stream and topic.
pub fn build(stream: &StreamConfig, topic: &str) -> String {
    format!(
        r#"{role}
Your task is to create a "{title}" tip about the following topic: "{topic}".

Requirements:
1. One-sentence headline.
2. 2-3 actionable bullet points (highest impact first).
3. A code snippet (5-15 lines) demonstrating the concept.
4. One "Why this matters:" sentence.
5. Max ~1200 characters total.
6. Do not include generic fluff.
7. Do not propose destructive statements (DROP/DELETE/TRUNCATE).
8. Be accurate and technical.
9. Format for Slack (you can use *bold*, `code`, ```code blocks```).

Output the message directly. Do not wrap in JSON.
"#,
        role = stream.role_prompt.trim(),
        title = stream.title_prefix.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_carries_role_title_and_topic() {
        let mut stream = StreamConfig::new("team-a", "C1");
        stream.role_prompt = "You are a Rust mentor.".into();
        stream.title_prefix = "Daily Rust Coach".into();
        let p = build(&stream, "lifetimes");
        assert!(p.starts_with("You are a Rust mentor.\n"));
        assert!(p.contains("\"Daily Rust Coach\" tip"));
        assert!(p.contains("topic: \"lifetimes\""));
        assert!(p.contains("Max ~1200 characters"));
    }
}
