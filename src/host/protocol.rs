use serde::{Deserialize, Serialize};

use crate::dom::{PostSpec, VisibilityChange};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostMessage {
    Navigated {
        path: String,
    },
    ContainerMounted,
    PostsAdded {
        posts: Vec<PostSpec>,
    },
    PostsRemoved {
        ids: Vec<String>,
    },
    Scrolled {
        offset: f64,
    },
    Viewport {
        height: f64,
    },
    SettingsUpdated,
    SaveSettings {
        #[serde(rename = "apiKey")]
        api_key: String,
        #[serde(rename = "filterCondition")]
        filter_condition: String,
        #[serde(rename = "isEnabled", default = "enabled_by_default")]
        is_enabled: bool,
    },
    SetEnabled {
        enabled: bool,
    },
    Stats,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostOutput {
    Visibility {
        post: String,
        hidden: bool,
    },
    Stats {
        posts_filtered: usize,
        time_saved: Option<String>,
    },
    Error {
        message: String,
    },
}

impl From<VisibilityChange> for HostOutput {
    fn from(change: VisibilityChange) -> Self {
        HostOutput::Visibility {
            post: change.post,
            hidden: change.hidden,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_page_messages() {
        let msg: HostMessage = serde_json::from_str(
            r#"{"type":"POSTS_ADDED","posts":[{"id":"p1","author":"alice","text":"hi","top":12.5}]}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            HostMessage::PostsAdded {
                posts: vec![PostSpec {
                    id: "p1".into(),
                    author: Some("alice".into()),
                    text: Some("hi".into()),
                    top: 12.5,
                }]
            }
        );

        let msg: HostMessage = serde_json::from_str(r#"{"type":"SETTINGS_UPDATED"}"#).unwrap();
        assert_eq!(msg, HostMessage::SettingsUpdated);
    }

    #[test]
    fn save_settings_uses_store_key_names() {
        let msg: HostMessage = serde_json::from_str(
            r#"{"type":"SAVE_SETTINGS","apiKey":"sk-test","filterCondition":"no sports"}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            HostMessage::SaveSettings {
                api_key: "sk-test".into(),
                filter_condition: "no sports".into(),
                is_enabled: true,
            }
        );
    }

    #[test]
    fn outputs_are_tagged() {
        let out = HostOutput::from(VisibilityChange {
            post: "p1".into(),
            hidden: true,
        });
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({ "type": "VISIBILITY", "post": "p1", "hidden": true })
        );
    }
}
