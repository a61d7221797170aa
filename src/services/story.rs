use anyhow::{Context, Result, bail};
use regex::Regex;
use std::sync::OnceLock;

use crate::models::Character;
use crate::services::llm::TextModel;
use crate::services::prompts::SAFETY_GUIDELINES;

/// Expand a one-line idea into a short comic-ready story.
pub async fn generate_story(
    model: &dyn TextModel,
    idea: &str,
    characters: &[Character],
) -> Result<String> {
    let idea = idea.trim();
    if idea.is_empty() {
        bail!("story idea is empty");
    }

    let prompt = story_prompt(idea, characters);
    let story = model
        .generate(&prompt)
        .await
        .context("Story generation failed")?;

    tracing::info!(idea_len = idea.len(), story_len = story.len(), "Story generated");
    Ok(story.trim().to_string())
}

fn story_prompt(idea: &str, characters: &[Character]) -> String {
    let mut prompt = String::from(
        "You are a writer for a light-hearted comic strip about school life in Gandhinagar.\n\
         Expand the idea below into a short story of 150 to 250 words that can be told in exactly six comic panels.\n\
         Give it a title on the first line in the form \"Title: ...\".\n\
         Use vivid, visual scenes, a clear beginning, middle and end, and a few lines of dialogue.\n",
    );
    prompt.push_str(SAFETY_GUIDELINES);
    prompt.push('\n');

    if !characters.is_empty() {
        prompt.push_str("\nKnown characters you may use:\n");
        for character in characters {
            prompt.push_str(&format!(
                "- {} ({}): {}\n",
                character.name, character.role, character.visual_description
            ));
        }
    }

    prompt.push_str(&format!("\nStory idea: {idea}\n"));
    prompt
}

fn title_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:#+\s*)?(?:\*\*)?\s*title\s*:\s*(.+?)\s*(?:\*\*)?\s*$")
            .expect("title regex is valid")
    })
}

/// Title for the archive: an explicit `Title:` line or markdown heading if the
/// story has one, otherwise its first few words.
pub fn derive_title(content: &str) -> String {
    const MAX_TITLE_CHARS: usize = 60;

    let first_line = content.lines().map(str::trim).find(|line| !line.is_empty());
    let Some(first_line) = first_line else {
        return "Untitled".to_string();
    };

    let title = if let Some(captures) = title_line_regex().captures(first_line) {
        captures[1].to_string()
    } else if first_line.starts_with('#') {
        first_line.trim_start_matches('#').trim().to_string()
    } else {
        first_line
            .split_whitespace()
            .take(6)
            .collect::<Vec<_>>()
            .join(" ")
    };

    let title = title.trim_matches(|c: char| c == '*' || c == '"' || c.is_whitespace());
    if title.is_empty() {
        return "Untitled".to_string();
    }
    match title.char_indices().nth(MAX_TITLE_CHARS) {
        Some((idx, _)) => format!("{}...", title[..idx].trim_end()),
        None => title.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::FakeTextModel;
    use chrono::Utc;

    #[test]
    fn title_from_title_line() {
        assert_eq!(
            derive_title("Title: The Late Bell\n\nKabir woke up..."),
            "The Late Bell"
        );
        assert_eq!(derive_title("**Title: Cricket Chaos**\nIt began"), "Cricket Chaos");
    }

    #[test]
    fn title_from_heading() {
        assert_eq!(derive_title("## Homework Heroes\nRohan..."), "Homework Heroes");
    }

    #[test]
    fn title_falls_back_to_first_words() {
        assert_eq!(
            derive_title("Kabir woke up late for school and panicked badly."),
            "Kabir woke up late for school"
        );
        assert_eq!(derive_title("   \n  "), "Untitled");
    }

    #[tokio::test]
    async fn prompt_carries_idea_and_roster() {
        let model = FakeTextModel::new("Title: Late\nKabir ran.");
        let characters = vec![Character {
            name: "Kabir".to_string(),
            role: "The Sleepyhead".to_string(),
            age: None,
            visual_description: "messy hair".to_string(),
            personality: None,
            tags: vec![],
            image_paths: vec![],
            created_at: Utc::now(),
        }];

        let story = generate_story(&model, "  Kabir woke up late ", &characters)
            .await
            .unwrap();
        assert_eq!(story, "Title: Late\nKabir ran.");

        let prompt = model.last_prompt().unwrap();
        assert!(prompt.contains("Story idea: Kabir woke up late"));
        assert!(prompt.contains("- Kabir (The Sleepyhead): messy hair"));
    }

    #[tokio::test]
    async fn empty_idea_never_reaches_the_model() {
        let model = FakeTextModel::new("unused");
        assert!(generate_story(&model, "  ", &[]).await.is_err());
        assert!(model.last_prompt().is_none());
    }
}
