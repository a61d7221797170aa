use anyhow::{Context, Result};
use serde_json::Value;

use crate::models::{Character, PanelPrompt};
use crate::services::llm::TextModel;

pub const PANEL_COUNT: usize = 6;

/// Appended to every image-generation prompt.
pub const SAFETY_SUFFIX: &str =
    "Safe for work, all-ages friendly, no violence, no gore, no text or watermarks.";

/// Included in every text-generation prompt.
pub const SAFETY_GUIDELINES: &str =
    "Keep everything safe-for-work and suitable for all ages: no violence, romance, gore or frightening content.";

const COMIC_STYLE: &str = "Colorful comic book illustration, clean line art, expressive faces";

/// Decompose an approved story into exactly [`PANEL_COUNT`] panel prompts.
pub async fn generate_comic_prompts(
    model: &dyn TextModel,
    story: &str,
    characters: &[Character],
) -> Result<Vec<PanelPrompt>> {
    let raw = model
        .generate(&decomposition_prompt(story))
        .await
        .context("Prompt generation failed")?;

    let panels = parse_panels(&raw, story)
        .into_iter()
        .map(|panel| enrich_with_characters(panel, characters))
        .collect();
    Ok(panels)
}

fn decomposition_prompt(story: &str) -> String {
    format!(
        "Break the following story into exactly {PANEL_COUNT} sequential comic panels.\n\
         Respond with ONLY a JSON array of {PANEL_COUNT} objects, no prose and no code fences. Each object has:\n\
         - \"panel\": the panel number (1-{PANEL_COUNT})\n\
         - \"scene\": one sentence describing what happens\n\
         - \"characters\": array of character names in the panel\n\
         - \"dialogue\": the single most important line of speech, or \"\"\n\
         - \"camera_angle\": e.g. wide shot, close-up, over the shoulder\n\
         - \"emotion\": the dominant mood of the panel\n\
         - \"image_prompt\": a detailed visual description for an image generator, naming setting, characters, poses and lighting\n\
         {SAFETY_GUIDELINES}\n\n\
         Story:\n{story}\n"
    )
}

/// Best-effort parse of the model's reply. Always returns [`PANEL_COUNT`]
/// panels numbered in order; anything missing is filled from the story text.
pub fn parse_panels(raw: &str, story: &str) -> Vec<PanelPrompt> {
    let records = extract_records(raw);
    if records.is_empty() {
        tracing::warn!("Panel decomposition was not usable JSON; using fallback panels");
    } else if records.len() != PANEL_COUNT {
        tracing::warn!(
            received = records.len(),
            "Panel decomposition returned the wrong number of panels"
        );
    }

    let fallback_scenes = split_story(story, PANEL_COUNT);
    (0..PANEL_COUNT)
        .map(|i| {
            let number = i as u32 + 1;
            match records.get(i) {
                Some(record) => panel_from_record(record, number),
                None => fallback_panel(number, &fallback_scenes[i]),
            }
        })
        .collect()
}

fn extract_records(raw: &str) -> Vec<Value> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        if let Some(records) = records_from_value(value) {
            return records;
        }
    }

    // Prose around the array: take the outermost brackets.
    if let (Some(start), Some(end)) = (cleaned.find('['), cleaned.rfind(']')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&cleaned[start..=end]) {
                if let Some(records) = records_from_value(value) {
                    return records;
                }
            }
        }
    }
    Vec::new()
}

fn records_from_value(value: Value) -> Option<Vec<Value>> {
    let records = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("panels") {
            Some(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };
    Some(records.into_iter().filter(Value::is_object).collect())
}

fn panel_from_record(record: &Value, number: u32) -> PanelPrompt {
    let scene = text_field(record, &["scene", "description"]);
    let characters = match record.get("characters") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    };
    let dialogue = text_field(record, &["dialogue", "speech"]);
    let camera_angle = text_field(record, &["camera_angle", "camera", "shot"]);
    let emotion = text_field(record, &["emotion", "mood"]);
    let mut image_prompt = text_field(record, &["image_prompt", "prompt"]);

    if image_prompt.is_empty() {
        image_prompt = compose_image_prompt(&scene, &characters, &camera_angle, &emotion);
    }

    PanelPrompt {
        panel: number,
        scene: if scene.is_empty() { format!("Panel {number}") } else { scene },
        characters,
        dialogue,
        camera_angle: if camera_angle.is_empty() {
            "medium shot".to_string()
        } else {
            camera_angle
        },
        emotion: if emotion.is_empty() { "neutral".to_string() } else { emotion },
        image_prompt,
    }
}

fn text_field(record: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| match record.get(*key) {
            Some(Value::String(s)) => Some(s.trim().to_string()),
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            _ => None,
        })
        .unwrap_or_default()
}

fn compose_image_prompt(scene: &str, characters: &[String], camera: &str, emotion: &str) -> String {
    let mut prompt = scene.to_string();
    if !characters.is_empty() {
        prompt.push_str(&format!(". Featuring {}", characters.join(", ")));
    }
    if !camera.is_empty() {
        prompt.push_str(&format!(". {camera}"));
    }
    if !emotion.is_empty() {
        prompt.push_str(&format!(". Mood: {emotion}"));
    }
    prompt
}

fn fallback_panel(number: u32, scene: &str) -> PanelPrompt {
    let scene = if scene.is_empty() {
        format!("Panel {number}")
    } else {
        scene.to_string()
    };
    PanelPrompt {
        panel: number,
        image_prompt: compose_image_prompt(&scene, &[], "medium shot", "neutral"),
        scene,
        characters: Vec::new(),
        dialogue: String::new(),
        camera_angle: "medium shot".to_string(),
        emotion: "neutral".to_string(),
    }
}

/// Cut the story's sentences into `parts` roughly even groups.
fn split_story(story: &str, parts: usize) -> Vec<String> {
    let body = story
        .lines()
        .map(str::trim)
        .filter(|line| !line.to_lowercase().starts_with("title:"))
        .collect::<Vec<_>>()
        .join(" ");
    let sentences: Vec<&str> = body
        .split_inclusive(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    (0..parts)
        .map(|i| {
            let start = i * sentences.len() / parts;
            let end = (i + 1) * sentences.len() / parts;
            sentences[start..end].join(" ")
        })
        .collect()
}

/// Pin character looks into the image prompt so panels stay consistent, and
/// finish with the shared style and safety suffix.
pub fn enrich_with_characters(mut panel: PanelPrompt, characters: &[Character]) -> PanelPrompt {
    let looks: Vec<String> = characters
        .iter()
        .filter(|c| {
            panel
                .characters
                .iter()
                .any(|name| name.trim().eq_ignore_ascii_case(c.name.trim()))
        })
        .map(|c| format!("{}: {}", c.name, c.visual_description))
        .collect();

    if !looks.is_empty() {
        panel.image_prompt = format!(
            "{}. Character appearance: {}",
            panel.image_prompt.trim_end_matches('.'),
            looks.join("; ")
        );
    }
    if !panel.image_prompt.contains(SAFETY_SUFFIX) {
        panel.image_prompt = format!(
            "{}. {COMIC_STYLE}. {SAFETY_SUFFIX}",
            panel.image_prompt.trim_end_matches('.')
        );
    }
    panel
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::FakeTextModel;
    use chrono::Utc;

    const STORY: &str = "Title: Late Again\nKabir woke up late. He ran to the bus. \
                         The bus left without him. Rohan waved from the window. \
                         Kabir borrowed a bicycle. He arrived just as the bell rang.";

    fn six_panel_json() -> String {
        let panels: Vec<Value> = (1..=6)
            .map(|n| {
                serde_json::json!({
                    "panel": n,
                    "scene": format!("Scene {n}"),
                    "characters": ["Kabir"],
                    "dialogue": format!("Line {n}"),
                    "camera_angle": "wide shot",
                    "emotion": "panic",
                    "image_prompt": format!("Kabir in scene {n}")
                })
            })
            .collect();
        serde_json::to_string(&panels).unwrap()
    }

    fn assert_six_in_order(panels: &[PanelPrompt]) {
        assert_eq!(panels.len(), PANEL_COUNT);
        for (i, panel) in panels.iter().enumerate() {
            assert_eq!(panel.panel, i as u32 + 1);
        }
    }

    #[test]
    fn well_formed_reply_is_used_as_is() {
        let panels = parse_panels(&six_panel_json(), STORY);
        assert_six_in_order(&panels);
        assert_eq!(panels[2].scene, "Scene 3");
        assert_eq!(panels[2].dialogue, "Line 3");
        assert_eq!(panels[2].characters, vec!["Kabir"]);
    }

    #[test]
    fn code_fences_and_prose_are_stripped() {
        let fenced = format!("```json\n{}\n```", six_panel_json());
        assert_six_in_order(&parse_panels(&fenced, STORY));

        let chatty = format!("Sure! Here are your panels:\n{}\nEnjoy!", six_panel_json());
        let panels = parse_panels(&chatty, STORY);
        assert_six_in_order(&panels);
        assert_eq!(panels[0].image_prompt, "Kabir in scene 1");
    }

    #[test]
    fn short_reply_is_padded_from_the_story() {
        let raw = r#"[{"scene": "Alarm rings", "characters": "Kabir, Mom"}]"#;
        let panels = parse_panels(raw, STORY);
        assert_six_in_order(&panels);
        assert_eq!(panels[0].characters, vec!["Kabir", "Mom"]);
        assert!(panels[0].image_prompt.starts_with("Alarm rings"));
        assert!(!panels[5].scene.is_empty());
        assert!(panels[5].scene.contains("bell rang"));
    }

    #[test]
    fn long_reply_is_truncated() {
        let panels: Vec<Value> = (1..=9)
            .map(|n| serde_json::json!({"panel": 10 - n, "scene": format!("S{n}")}))
            .collect();
        let parsed = parse_panels(&serde_json::to_string(&panels).unwrap(), STORY);
        assert_six_in_order(&parsed);
        assert_eq!(parsed[5].scene, "S6");
    }

    #[test]
    fn garbage_reply_still_yields_six_panels() {
        let panels = parse_panels("I cannot help with that.", STORY);
        assert_six_in_order(&panels);
        assert!(panels.iter().all(|p| !p.image_prompt.is_empty()));
    }

    #[test]
    fn object_with_panels_key_is_accepted() {
        let raw = format!(r#"{{"panels": {}}}"#, six_panel_json());
        let panels = parse_panels(&raw, "");
        assert_six_in_order(&panels);
        assert_eq!(panels[4].scene, "Scene 5");
    }

    #[test]
    fn empty_story_fallback_uses_placeholder_scenes() {
        let panels = parse_panels("", "");
        assert_six_in_order(&panels);
        assert_eq!(panels[3].scene, "Panel 4");
    }

    #[test]
    fn character_looks_and_safety_suffix_are_added() {
        let kabir = Character {
            name: "Kabir".to_string(),
            role: "Sleepyhead".to_string(),
            age: Some("15".to_string()),
            visual_description: "messy hair, untucked shirt".to_string(),
            personality: None,
            tags: vec![],
            image_paths: vec![],
            created_at: Utc::now(),
        };
        let panel = parse_panels(&six_panel_json(), STORY).remove(0);
        let panel = enrich_with_characters(panel, &[kabir]);
        assert!(panel.image_prompt.contains("Kabir: messy hair, untucked shirt"));
        assert!(panel.image_prompt.ends_with(SAFETY_SUFFIX));

        let again = enrich_with_characters(panel.clone(), &[]);
        assert_eq!(again.image_prompt, panel.image_prompt);
    }

    #[tokio::test]
    async fn decomposition_always_returns_six() {
        let model = FakeTextModel::new("[]");
        let panels = generate_comic_prompts(&model, STORY, &[]).await.unwrap();
        assert_six_in_order(&panels);
        assert!(model.last_prompt().unwrap().contains("Kabir woke up late."));
    }
}
