use serde::{Deserialize, Serialize};

// ========================= Messages =========================

/// One turn of the conversation, serialized in chat-completions wire shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: Content,
    },
    Assistant {
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        tool_call_id: String,
        name: String,
        content: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

/// Name plus the raw JSON argument string exactly as the model emitted it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: function_kind(),
            function: FunctionCall { name: name.into(), arguments: arguments.into() },
        }
    }
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Message::User { content: Content::Text(text.into()) }
    }

    /// Caption followed by an inline image, e.g. a base64 `data:` URI.
    pub fn user_image(caption: impl Into<String>, image_url: impl Into<String>) -> Self {
        Message::User {
            content: Content::Parts(vec![
                ContentPart::Text { text: caption.into() },
                ContentPart::ImageUrl { image_url: ImageUrl { url: image_url.into() } },
            ]),
        }
    }

    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        Message::Tool {
            tool_call_id: call.id.clone(),
            name: call.function.name.clone(),
            content: content.into(),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(
            self,
            Message::User { content: Content::Parts(parts) }
                if parts.iter().any(|p| matches!(p, ContentPart::ImageUrl { .. }))
        )
    }
}

// ========================= Transcript =========================

/// Append-only conversation history. Order is replay order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task(task: impl Into<String>) -> Self {
        let mut t = Self::new();
        t.push(Message::user(task));
        t
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn image_message_uses_chat_content_parts() {
        let msg = Message::user_image("look", "data:image/png;base64,AAAA");
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            v,
            json!({
                "role": "user",
                "content": [
                    { "type": "text", "text": "look" },
                    { "type": "image_url", "image_url": { "url": "data:image/png;base64,AAAA" } }
                ]
            })
        );
        assert!(msg.is_image());
        assert!(!Message::user("plain").is_image());
    }

    #[test]
    fn assistant_keeps_tool_call_metadata() {
        let call = ToolCall::new("call_1", "load_page", r#"{"url":"https://example.com"}"#);
        let msg = Message::Assistant { content: None, tool_calls: vec![call.clone()] };
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["role"], "assistant");
        assert_eq!(v["content"], serde_json::Value::Null);
        assert_eq!(v["tool_calls"][0]["id"], "call_1");
        assert_eq!(v["tool_calls"][0]["type"], "function");
        assert_eq!(v["tool_calls"][0]["function"]["arguments"], r#"{"url":"https://example.com"}"#);

        let result = Message::tool_result(&call, "ok");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({ "role": "tool", "tool_call_id": "call_1", "name": "load_page", "content": "ok" })
        );
    }

    #[test]
    fn assistant_without_calls_omits_field() {
        let msg = Message::Assistant { content: Some("done".into()), tool_calls: vec![] };
        let v = serde_json::to_value(&msg).unwrap();
        assert!(v.get("tool_calls").is_none());
    }

    #[test]
    fn transcript_serializes_as_plain_array_in_order() {
        let mut t = Transcript::with_task("Go to example.com");
        t.push(Message::user("second"));
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v.as_array().unwrap().len(), 2);
        assert_eq!(v[0]["content"], "Go to example.com");
        assert_eq!(v[1]["content"], "second");
    }
}
