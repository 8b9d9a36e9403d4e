use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "contextType", rename_all = "camelCase")]
/// Describes the process a trace was recorded in.
pub enum ContextInfo {
    #[serde(rename = "script")]
    Script(ScriptContextInfo),
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScriptContextInfo {
    pub uri: String,
    pub title: Option<String>,
    pub icon: Option<String>,
    pub task_id: Option<String>,
    pub args: Vec<String>,
    pub user_agent: UserAgent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserAgent {
    pub value: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub platform: String,
    pub platform_version: String,
    pub device: String,
}

impl Default for ContextInfo {
    fn default() -> Self {
        Self::Script(ScriptContextInfo::default())
    }
}

impl Default for UserAgent {
    fn default() -> Self {
        Self {
            value: String::new(),
            kind: "unknown".to_owned(),
            platform: "other".to_owned(),
            platform_version: String::new(),
            device: "desktop".to_owned(),
        }
    }
}

impl ContextInfo {
    /// A file name suggested by the context, e.g. `my-page` for a titled page.
    pub fn filename(&self) -> String {
        match self {
            Self::Script(info) => {
                let source = info
                    .title
                    .as_deref()
                    .filter(|t| !t.is_empty())
                    .unwrap_or(info.uri.as_str());
                let mut name = String::new();
                for c in source.trim_matches(|c| matches!(c, '"' | '`' | '\'')).chars() {
                    let c = match c {
                        '/' | ' ' | '\n' | '\r' | '.' | ':' => '-',
                        c => c.to_ascii_lowercase(),
                    };
                    if !(c == '-' && name.ends_with('-')) {
                        name.push(c);
                    }
                }
                let name = name.trim_matches('-');
                if name.is_empty() {
                    "script".to_owned()
                } else {
                    name.to_owned()
                }
            }
        }
    }
}
