use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::{Decision, PostContent};

use super::ClassifyError;

pub const SCHEMA_NAME: &str = "tweet_classification";

pub fn build_request(
    model: &str,
    filter_condition: &str,
    post: &PostContent,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage {
                role: "system".into(),
                content: system_prompt(filter_condition),
            },
            ChatMessage {
                role: "user".into(),
                content: user_prompt(post),
            },
        ],
        response_format: ResponseFormat {
            r#type: "json_schema".into(),
            json_schema: JsonSchemaFormat {
                name: SCHEMA_NAME.into(),
                schema: verdict_schema(),
                strict: true,
            },
        },
    }
}

fn system_prompt(filter_condition: &str) -> String {
    format!(
        "You are a tweet classifier. Analyze the tweet and determine if it should be kept or removed based on these conditions: <conditions>{filter_condition}</conditions>"
    )
}

fn user_prompt(post: &PostContent) -> String {
    format!(
        "<tweet>\n  <username>{}</username>\n  <content>{}</content>\n</tweet>",
        post.author, post.text
    )
}

fn verdict_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "keep_tweet": {
                "type": "boolean",
                "description": "Whether the tweet should be kept (true) or removed (false)"
            }
        },
        "required": ["keep_tweet"],
        "additionalProperties": false
    })
}

pub fn parse_completion(body: &str) -> Result<Decision, ClassifyError> {
    let completion: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|err| ClassifyError::Malformed(err.to_string()))?;

    let content = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ClassifyError::Malformed("response did not contain any choices".into()))?
        .message
        .and_then(|msg| msg.content)
        .ok_or_else(|| ClassifyError::Malformed("response missing message content".into()))?;

    let verdict: Verdict = serde_json::from_str(&content)
        .map_err(|err| ClassifyError::Malformed(format!("verdict is not valid JSON: {err}")))?;
    Ok(Decision::from(verdict.keep_tweet))
}

#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub r#type: String,
    pub json_schema: JsonSchemaFormat,
}

#[derive(Debug, Serialize)]
pub struct JsonSchemaFormat {
    pub name: String,
    pub schema: Value,
    pub strict: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: Option<ChatCompletionMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Verdict {
    keep_tweet: bool,
}
