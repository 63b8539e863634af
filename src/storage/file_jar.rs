use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use cookie::Cookie;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::CookieJar;
use crate::tokens::cookie::{has_lapsed, parse, render};

/// A durable jar: one encoded `Set-Cookie` line per cookie in a text file.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so readers never observe a half-written jar.
pub struct FileJar {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileJar {
    /// Prepares the jar at `path`, creating its parent directory if needed.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("cannot create '{}': {}", parent.display(), e))?;
        }

        let jar = FileJar {
            path,
            lock: Mutex::new(()),
        };
        // Surface unreadable files now rather than on first use.
        jar.load().await?;
        Ok(jar)
    }

    async fn load(&self) -> Result<BTreeMap<String, Cookie<'static>>, String> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(format!("cannot read '{}': {}", self.path.display(), e)),
        };

        let mut cookies = BTreeMap::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            match parse(line) {
                Some(cookie) => {
                    cookies.insert(cookie.name().to_string(), cookie);
                }
                None => warn!("Skipping malformed cookie line in '{}'", self.path.display()),
            }
        }
        Ok(cookies)
    }

    async fn save(&self, cookies: &BTreeMap<String, Cookie<'static>>) -> Result<(), String> {
        let mut contents = String::new();
        for cookie in cookies.values() {
            contents.push_str(&render(cookie));
            contents.push('\n');
        }

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| format!("cannot write '{}': {}", tmp.display(), e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| format!("cannot replace '{}': {}", self.path.display(), e))
    }
}

#[async_trait]
impl CookieJar for FileJar {
    async fn set(&self, cookie: Cookie<'static>) -> Result<(), String> {
        let _guard = self.lock.lock().await;
        let mut cookies = self.load().await?;
        cookies.insert(cookie.name().to_string(), cookie);
        self.save(&cookies).await
    }

    async fn get(&self, name: &str) -> Result<Option<Cookie<'static>>, String> {
        let _guard = self.lock.lock().await;
        let mut cookies = self.load().await?;
        match cookies.get(name) {
            Some(cookie) if has_lapsed(cookie, Utc::now()) => {
                debug!("Cookie '{}' has lapsed; purging", name);
                cookies.remove(name);
                self.save(&cookies).await?;
                Ok(None)
            }
            Some(cookie) => Ok(Some(cookie.clone())),
            None => Ok(None),
        }
    }

    async fn remove(&self, name: &str) -> Result<(), String> {
        let _guard = self.lock.lock().await;
        let mut cookies = self.load().await?;
        if cookies.remove(name).is_some() {
            self.save(&cookies).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cookie::time::{Duration, OffsetDateTime};

    #[tokio::test]
    async fn test_cookies_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cookies.txt");

        let jar = FileJar::open(&path).await.expect("jar should open");
        jar.set(Cookie::build(("app_token_ns", "a b;c")).path("/").build())
            .await
            .unwrap();
        jar.set(Cookie::new("app_refresh_ns", "r1")).await.unwrap();
        drop(jar);

        let reopened = FileJar::open(&path).await.expect("jar should reopen");
        let cookie = reopened.get("app_token_ns").await.unwrap().expect("persisted");
        assert_eq!(cookie.value(), "a b;c");
        assert_eq!(cookie.path(), Some("/"));

        reopened.remove("app_token_ns").await.unwrap();
        reopened.remove("app_token_ns").await.unwrap();
        assert!(reopened.get("app_token_ns").await.unwrap().is_none());
        assert!(reopened.get("app_refresh_ns").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lapsed_cookie_is_purged_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.txt");
        let jar = FileJar::open(&path).await.unwrap();
        let cookie = Cookie::build(("app_token_ns", "old"))
            .expires(OffsetDateTime::now_utc() - Duration::hours(1))
            .build();
        jar.set(cookie).await.unwrap();

        assert!(jar.get("app_token_ns").await.unwrap().is_none());
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("app_token_ns"));
    }
}
