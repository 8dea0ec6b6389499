#![allow(dead_code)]

use async_trait::async_trait;
use browser_pilot::registry::CLICKABLE_SELECTOR;
use browser_pilot::{AgentError, AssistantReply, BrowserPage, ChatModel, Message, ToolCall};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const PNG_BYTES: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];

#[derive(Clone, Debug)]
pub struct FakeElement {
    pub text: String,
    pub visible: bool,
    pub href: Option<String>,
}

pub fn link(text: &str, href: &str) -> FakeElement {
    FakeElement { text: text.into(), visible: true, href: Some(href.into()) }
}

pub fn button(text: &str) -> FakeElement {
    FakeElement { text: text.into(), visible: true, href: None }
}

pub fn hidden(text: &str) -> FakeElement {
    FakeElement { text: text.into(), visible: false, href: None }
}

/// What the fake page saw, shared with the test after the page is consumed.
#[derive(Default, Debug)]
pub struct PageLog {
    pub url: String,
    pub gotos: Vec<String>,
    pub clicks: Vec<String>,
    pub load_waits: usize,
    pub screenshots: usize,
    pub text_reads: usize,
    pub visibility_checks: Vec<String>,
    pub closed: usize,
}

#[derive(Clone, Debug)]
pub struct FakeRef {
    url: String,
    index: usize,
}

/// In-memory site: url -> clickable-candidate elements in document order.
pub struct FakePage {
    site: HashMap<String, Vec<FakeElement>>,
    pub log: Arc<Mutex<PageLog>>,
}

impl FakePage {
    pub fn new(site: Vec<(&str, Vec<FakeElement>)>) -> Self {
        let site = site.into_iter().map(|(u, els)| (u.to_string(), els)).collect();
        let log = PageLog { url: "about:blank".into(), ..Default::default() };
        Self { site, log: Arc::new(Mutex::new(log)) }
    }

    pub fn log(&self) -> Arc<Mutex<PageLog>> {
        self.log.clone()
    }

    fn element(&self, r: &FakeRef) -> Result<&FakeElement, AgentError> {
        self.site
            .get(&r.url)
            .and_then(|els| els.get(r.index))
            .ok_or_else(|| AgentError::Browser("element detached".into()))
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    type Element = FakeRef;

    async fn goto(&self, url: &str) -> Result<(), AgentError> {
        let mut log = self.log.lock().unwrap();
        if url != "about:blank" && !self.site.contains_key(url) {
            return Err(AgentError::Browser(format!("net::ERR_NAME_NOT_RESOLVED at {}", url)));
        }
        log.gotos.push(url.to_string());
        log.url = url.to_string();
        Ok(())
    }

    async fn wait_for_load(&self) -> Result<(), AgentError> {
        self.log.lock().unwrap().load_waits += 1;
        Ok(())
    }

    async fn query_selector_all(&self, selector: &str) -> Result<Vec<FakeRef>, AgentError> {
        assert_eq!(selector, CLICKABLE_SELECTOR);
        let url = self.log.lock().unwrap().url.clone();
        let count = self.site.get(&url).map(Vec::len).unwrap_or(0);
        Ok((0..count).map(|index| FakeRef { url: url.clone(), index }).collect())
    }

    async fn inner_text(&self, element: &FakeRef) -> Result<String, AgentError> {
        self.log.lock().unwrap().text_reads += 1;
        Ok(self.element(element)?.text.clone())
    }

    async fn is_visible(&self, element: &FakeRef) -> Result<bool, AgentError> {
        let el = self.element(element)?;
        self.log.lock().unwrap().visibility_checks.push(el.text.clone());
        Ok(el.visible)
    }

    async fn click(&self, element: &FakeRef) -> Result<(), AgentError> {
        let el = self.element(element)?.clone();
        let mut log = self.log.lock().unwrap();
        log.clicks.push(el.text.split_whitespace().collect::<Vec<_>>().join(" "));
        if let Some(href) = el.href {
            log.url = href;
        }
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AgentError> {
        self.log.lock().unwrap().screenshots += 1;
        Ok(PNG_BYTES.to_vec())
    }

    async fn close(self) -> Result<(), AgentError> {
        self.log.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// Model that replays a fixed list of replies and records what it was sent.
pub struct ScriptedModel {
    queue: Mutex<VecDeque<AssistantReply>>,
    pub seen: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<AssistantReply>) -> Self {
        Self { queue: Mutex::new(VecDeque::from(replies)), seen: Arc::new(Mutex::new(Vec::new())) }
    }

    pub fn seen(&self) -> Arc<Mutex<Vec<Vec<Message>>>> {
        self.seen.clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(&self, messages: &[Message], tools: &Value) -> Result<AssistantReply, AgentError> {
        assert_eq!(tools.as_array().map(Vec::len), Some(2));
        self.seen.lock().unwrap().push(messages.to_vec());
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::Model("no scripted reply left".into()))
    }
}

pub fn load_page(id: &str, url: &str) -> ToolCall {
    ToolCall::new(id, "load_page", format!(r#"{{"url":"{}"}}"#, url))
}

pub fn click_element(id: &str, element_id: usize) -> ToolCall {
    ToolCall::new(id, "click_element", format!(r#"{{"element_id":{}}}"#, element_id))
}

pub fn example_site() -> FakePage {
    FakePage::new(vec![
        ("https://example.com", vec![link("More\n   information...", "https://www.iana.org/domains/example")]),
        (
            "https://www.iana.org/domains/example",
            vec![
                link("Domains", "https://www.iana.org/domains"),
                hidden("Skip to content"),
                button("   "),
                link("Protocols", "https://www.iana.org/protocols"),
                button("Numbers"),
            ],
        ),
    ])
}
