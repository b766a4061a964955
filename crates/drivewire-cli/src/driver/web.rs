//! Commands understood by the browser driver.

use std::sync::Arc;

use drivewire_core::args;
use drivewire_core::error::Result;
use drivewire_core::geometry::Rect;
use drivewire_core::policy::{RetryOverrides, RetryPolicy};
use drivewire_core::probe;
use serde_json::Value;

use super::facade::Facade;
use super::server::{Bot, ScriptContext};
use super::session::Session;

/// A connected browser driver.
#[derive(Debug, Clone)]
pub struct WebBot {
    facade: Facade,
}

impl Bot for WebBot {
    const PLATFORM: &'static str = "web";

    fn attach(session: Arc<Session>, ctx: &ScriptContext) -> Self {
        Self::new(session, ctx.config.retry)
    }
}

impl WebBot {
    pub fn new(session: Arc<Session>, defaults: RetryPolicy) -> Self {
        Self {
            facade: Facade::new(session, defaults),
        }
    }

    pub fn with_defaults(mut self, defaults: RetryPolicy) -> Self {
        self.facade.set_defaults(defaults);
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        self.facade.session()
    }

    // Navigation

    pub async fn goto(&self, url: &str) -> Result<bool> {
        self.facade.flag(args!["goto", url]).await
    }

    pub async fn new_page(&self, url: &str) -> Result<bool> {
        self.facade.flag(args!["newPage", url]).await
    }

    pub async fn back(&self) -> Result<bool> {
        self.facade.flag(args!["back"]).await
    }

    pub async fn forward(&self) -> Result<bool> {
        self.facade.flag(args!["forward"]).await
    }

    pub async fn refresh(&self) -> Result<bool> {
        self.facade.flag(args!["refresh"]).await
    }

    /// Base64 PNG of the page, or of one element when `xpath` is given.
    pub async fn take_screenshot(&self, xpath: Option<&str>) -> Result<Option<String>> {
        let args = match xpath {
            Some(xpath) => args!["takeScreenshot", xpath],
            None => args!["takeScreenshot"],
        };
        self.facade.optional_text(args).await
    }

    // Pages

    pub async fn get_current_page_id(&self) -> Result<Option<String>> {
        self.facade.optional_text(args!["getCurPageId"]).await
    }

    pub async fn get_all_page_id(&self) -> Result<Vec<String>> {
        self.facade.list(args!["getAllPageId"]).await
    }

    pub async fn switch_to_page(&self, page_id: &str) -> Result<bool> {
        self.facade.flag(args!["switchPage", page_id]).await
    }

    pub async fn close_current_page(&self) -> Result<bool> {
        self.facade.flag(args!["closePage"]).await
    }

    pub async fn get_current_url(&self) -> Result<Option<String>> {
        let raw = self.facade.text(args!["getCurrentUrl"]).await?;
        Ok(probe::text_unless(&raw, probe::WEBDRIVER_ERROR).into_option())
    }

    pub async fn get_current_title(&self) -> Result<Option<String>> {
        let raw = self.facade.text(args!["getTitle"]).await?;
        Ok(probe::text_unless(&raw, probe::WEBDRIVER_ERROR).into_option())
    }

    // Elements

    pub async fn click_element(&self, xpath: &str) -> Result<bool> {
        self.facade.flag(args!["clickElement", xpath]).await
    }

    pub async fn get_element_text(&self, xpath: &str) -> Result<Option<String>> {
        self.facade
            .optional_text(args!["getElementText", xpath])
            .await
    }

    pub async fn get_element_rect(&self, xpath: &str) -> Result<Option<Rect>> {
        let raw = self.facade.text(args!["getElementRect", xpath]).await?;
        Ok(probe::rect_json("getElementRect", &raw)?.into_option())
    }

    /// Poll until the element has a bounding box.
    pub async fn wait_for_element(&self, xpath: &str, overrides: RetryOverrides) -> Result<Option<Rect>> {
        self.facade
            .poll("wait_for_element", overrides, args!["getElementRect", xpath], |raw| {
                probe::rect_json("getElementRect", raw)
            })
            .await
    }

    pub async fn send_keys(&self, xpath: &str, value: &str) -> Result<bool> {
        self.facade.flag(args!["sendKeys", xpath, value]).await
    }

    /// Run JavaScript in the page; `None` when it returned nothing.
    pub async fn execute_script(&self, script: &str) -> Result<Option<String>> {
        self.facade
            .optional_text(args!["executeScript", script])
            .await
    }

    pub async fn get_all_cookies(&self) -> Result<Option<Vec<Value>>> {
        let raw = self.facade.text(args!["getAllCookies"]).await?;
        probe::json("getAllCookies", &raw)
    }

    // Lifecycle

    /// Close the browser.
    pub async fn quit(&self) -> Result<bool> {
        self.facade.flag(args!["closeBrowser"]).await
    }

    pub async fn close_driver(&self) -> Result<bool> {
        self.facade.flag(args!["closeDriver"]).await
    }
}
