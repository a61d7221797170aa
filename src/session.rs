use serde::Serialize;

use crate::models::{Answer, ChatMessage, ChatRole, Comic, PanelPrompt};

/// In-memory authoring state for the single user of the service.
///
/// Each step clears whatever the later steps produced, so the comic factory
/// only ever sees prompts that belong to the current story.
#[derive(Debug, Default, Clone, Serialize)]
pub struct Session {
    pub current_story: Option<String>,
    pub current_prompts: Option<Vec<PanelPrompt>>,
    pub generated_images: Option<Vec<String>>,
    pub current_comic: Option<String>,
    pub messages: Vec<ChatMessage>,
}

impl Session {
    pub fn start_story(&mut self, story: String) {
        self.current_story = Some(story);
        self.current_prompts = None;
        self.clear_comic();
    }

    pub fn approve(&mut self, story: String, prompts: Vec<PanelPrompt>) {
        self.current_story = Some(story);
        self.current_prompts = Some(prompts);
        self.clear_comic();
    }

    pub fn comic_rendered(&mut self, comic: &Comic) {
        self.generated_images = Some(comic.image_paths.clone());
        self.current_comic = Some(comic.id.clone());
    }

    pub fn record_exchange(&mut self, question: &str, answer: &Answer) {
        self.messages.push(ChatMessage {
            role: ChatRole::User,
            content: question.to_string(),
            images: Vec::new(),
        });
        self.messages.push(ChatMessage {
            role: ChatRole::Assistant,
            content: answer.answer.clone(),
            images: answer.images.clone(),
        });
    }

    fn clear_comic(&mut self) {
        self.generated_images = None;
        self.current_comic = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn comic() -> Comic {
        Comic {
            id: "c0ffee00".to_string(),
            created_at: Utc::now(),
            story: "s".to_string(),
            prompts: Vec::new(),
            image_paths: vec!["panel_1.png".to_string()],
        }
    }

    #[test]
    fn new_story_resets_later_steps() {
        let mut session = Session::default();
        session.approve("old".to_string(), Vec::new());
        session.comic_rendered(&comic());

        session.start_story("new".to_string());
        assert_eq!(session.current_story.as_deref(), Some("new"));
        assert!(session.current_prompts.is_none());
        assert!(session.generated_images.is_none());
        assert!(session.current_comic.is_none());
    }

    #[test]
    fn approval_clears_previous_comic() {
        let mut session = Session::default();
        session.approve("one".to_string(), Vec::new());
        session.comic_rendered(&comic());
        assert!(session.generated_images.is_some());

        session.approve("two".to_string(), Vec::new());
        assert!(session.generated_images.is_none());
        assert!(session.current_prompts.is_some());
    }

    #[test]
    fn chat_history_keeps_both_sides() {
        let mut session = Session::default();
        let answer = Answer {
            answer: "Kabir is sleepy.".to_string(),
            images: vec!["kabir.png".to_string()],
            sources: vec!["Kabir".to_string()],
        };
        session.record_exchange("Who is Kabir?", &answer);

        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, ChatRole::User);
        assert_eq!(session.messages[1].images, vec!["kabir.png"]);
    }
}
