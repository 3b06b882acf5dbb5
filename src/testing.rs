//! Test doubles shared by the module tests.

use crate::api::NewsFetcher;
use std::collections::VecDeque;
use std::error::Error;
use std::sync::Mutex;

/// A [`NewsFetcher`] that replays canned answers in order and records prompts.
///
/// Once the script runs out every call fails.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Every prompt received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl NewsFetcher for ScriptedFetcher {
    async fn fetch_news(&self, prompt: &str) -> Result<String, Box<dyn Error>> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(e.into()),
            None => Err("no scripted response left".into()),
        }
    }
}

/// A [`NewsFetcher`] that answers every prompt with the same text.
#[derive(Debug)]
pub struct FixedFetcher(pub String);

impl NewsFetcher for FixedFetcher {
    async fn fetch_news(&self, _prompt: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.0.clone())
    }
}
