use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use cookie::Cookie;

use super::CookieJar;
use crate::tokens::cookie::has_lapsed;

/// Cookies held in process memory; they live as long as the jar does.
#[derive(Default)]
pub struct MemoryJar {
    cookies: Mutex<HashMap<String, Cookie<'static>>>,
}

impl MemoryJar {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CookieJar for MemoryJar {
    async fn set(&self, cookie: Cookie<'static>) -> Result<(), String> {
        let mut cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        cookies.insert(cookie.name().to_string(), cookie);
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<Cookie<'static>>, String> {
        let mut cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        match cookies.get(name) {
            Some(cookie) if has_lapsed(cookie, Utc::now()) => {
                cookies.remove(name);
                Ok(None)
            }
            Some(cookie) => Ok(Some(cookie.clone())),
            None => Ok(None),
        }
    }

    async fn remove(&self, name: &str) -> Result<(), String> {
        let mut cookies = self.cookies.lock().unwrap_or_else(PoisonError::into_inner);
        cookies.remove(name);
        Ok(())
    }
}
