use super::CookieJar;
use async_trait::async_trait;
use cookie::Cookie;

/// A jar for environments with no usable storage medium.
/// Writes are dropped and reads find nothing.
pub struct NoJar;

impl NoJar {
    pub fn new() -> Self {
        NoJar
    }
}

impl Default for NoJar {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CookieJar for NoJar {
    async fn set(&self, _cookie: Cookie<'static>) -> Result<(), String> {
        Ok(())
    }

    async fn get(&self, _name: &str) -> Result<Option<Cookie<'static>>, String> {
        Ok(None)
    }

    async fn remove(&self, _name: &str) -> Result<(), String> {
        Ok(())
    }

    fn is_available(&self) -> bool {
        false
    }
}
