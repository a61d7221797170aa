use axum::extract::State;
use axum::response::Html;

use crate::error::AppResult;
use crate::state::AppState;

pub async fn index() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
    <html>
    <head>
        <title>Gandhinagar Comic AI</title>
        <meta charset="utf-8">
        <style>
            body { font-family: Arial, sans-serif; margin: 40px; }
            .info-box { background-color: #f0f8ff; padding: 20px; border-radius: 8px; margin: 20px 0; }
            .endpoint { background-color: #f5f5f5; padding: 10px; margin: 10px 0; border-radius: 4px; font-family: monospace; }
        </style>
    </head>
    <body>
        <h1>Gandhinagar Comic AI</h1>

        <div class="info-box">
            <h2>How it works</h2>
            <p>Enter a story idea, approve the generated story, and turn it into a six-panel comic strip.</p>
            <p>Everything you create is remembered, so you can ask questions about your characters and stories.</p>
            <p>All content is safe-for-work and all-ages friendly.</p>
        </div>

        <h2>Character Studio</h2>
        <div class="endpoint">GET /api/characters - List characters</div>
        <div class="endpoint">GET /api/characters/:name - Look up a character</div>
        <div class="endpoint">POST /api/characters - Create a character from a description</div>
        <div class="endpoint">POST /api/characters/upload - Create a character from reference images (multipart)</div>

        <h2>Story Lab</h2>
        <div class="endpoint">POST /api/stories/generate - Expand an idea into a story</div>
        <div class="endpoint">POST /api/stories/approve - Approve the story and create six panel prompts</div>
        <div class="endpoint">GET /api/session - Current story, prompts and comic</div>
        <div class="endpoint">PUT /api/session/story - Send a story to the Story Lab</div>

        <h2>Comic Factory</h2>
        <div class="endpoint">POST /api/comics - Render the approved panels</div>
        <div class="endpoint">GET /api/comics - List comics</div>
        <div class="endpoint">GET /api/comics/:id - Comic metadata</div>
        <div class="endpoint">GET /api/comics/:id/download - Download panels as a zip</div>

        <h2>Ask the Universe</h2>
        <div class="endpoint">POST /api/ask - Ask about your characters and stories</div>

        <h2>Story Archive</h2>
        <div class="endpoint">GET /archive - Browse archived stories</div>
        <div class="endpoint">GET /api/stories - List stories</div>
        <div class="endpoint">DELETE /api/stories/:id - Delete a story</div>

        <h2>Image Magic</h2>
        <div class="endpoint">POST /api/magic/text-to-image - Generate from text</div>
        <div class="endpoint">POST /api/magic/reimagine - Reimagine an image with your characters (multipart)</div>
        <div class="endpoint">POST /api/magic/image-to-story - Write a story from an image (multipart)</div>

        <p>Images are served under <code>/files/characters/</code>, <code>/files/comics/</code> and <code>/files/magic/</code>.</p>
    </body>
    </html>
    "#,
    )
}

pub async fn health_check() -> &'static str {
    "OK"
}

/// Server-rendered story archive.
pub async fn archive(State(state): State<AppState>) -> AppResult<Html<String>> {
    let stories = state.stories.list().await?;

    let mut body = String::new();
    if stories.is_empty() {
        body.push_str("<p>No stories archived yet. Use the Story Lab to create one!</p>");
    }
    for story in &stories {
        body.push_str(&format!(
            "<details><summary>{} ({}) <code>{}</code></summary><div class=\"story\">{}</div></details>\n",
            html_escape::encode_text(&story.title),
            story.created_at.format("%Y-%m-%d"),
            html_escape::encode_text(&story.id),
            html_escape::encode_text(&story.content).replace('\n', "<br>")
        ));
    }

    Ok(Html(format!(
        r#"<!DOCTYPE html>
    <html>
    <head>
        <title>Story Archive</title>
        <meta charset="utf-8">
        <style>
            body {{ font-family: Arial, sans-serif; margin: 40px; }}
            details {{ background-color: #f5f5f5; padding: 10px; margin: 10px 0; border-radius: 4px; }}
            .story {{ margin-top: 10px; }}
        </style>
    </head>
    <body>
        <h1>Story Archive</h1>
        {body}
    </body>
    </html>
    "#
    )))
}
