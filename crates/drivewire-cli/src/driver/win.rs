//! Commands understood by the Windows desktop driver.

use std::sync::Arc;
use std::time::Duration;

use drivewire_core::args;
use drivewire_core::error::Result;
use drivewire_core::geometry::{Point, Rect, Region};
use drivewire_core::policy::{RetryOverrides, RetryPolicy};
use drivewire_core::probe;

use super::facade::{ColorSearch, Facade, ImageSearch};
use super::server::{Bot, ScriptContext};
use super::session::Session;

/// Element handle meaning "no element, use the window".
const NO_ELEMENT: &str = "0";

/// Mouse button action for [`WinBot::click_mouse`] and [`WinBot::click_element`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum MouseAction {
    LeftClick = 1,
    RightClick = 2,
    LeftDown = 3,
    LeftUp = 4,
    RightDown = 5,
    RightUp = 6,
    LeftDoubleClick = 7,
    RightDoubleClick = 8,
}

impl MouseAction {
    fn code(self) -> i32 {
        self as i32
    }
}

/// How mouse and capture commands reach the window.
///
/// `background` drives the window without bringing it to the front. When set,
/// `element_hwnd` optionally targets a child control instead of the window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputMode {
    pub background: bool,
    pub element_hwnd: Option<String>,
}

impl InputMode {
    pub fn foreground() -> Self {
        Self::default()
    }

    pub fn background() -> Self {
        Self {
            background: true,
            element_hwnd: None,
        }
    }

    fn element(&self) -> &str {
        self.element_hwnd.as_deref().unwrap_or(NO_ELEMENT)
    }
}

/// A connected Windows desktop driver.
#[derive(Debug, Clone)]
pub struct WinBot {
    facade: Facade,
}

impl Bot for WinBot {
    const PLATFORM: &'static str = "windows";

    fn attach(session: Arc<Session>, ctx: &ScriptContext) -> Self {
        Self::new(session, ctx.config.retry)
    }
}

impl WinBot {
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

    // Windows

    /// Handle of the first window matching class and/or title.
    pub async fn find_window(
        &self,
        class_name: Option<&str>,
        window_name: Option<&str>,
    ) -> Result<Option<String>> {
        self.facade
            .optional_text(args!["findWindow", class_name, window_name])
            .await
    }

    pub async fn find_windows(
        &self,
        class_name: Option<&str>,
        window_name: Option<&str>,
    ) -> Result<Vec<String>> {
        self.facade
            .list(args!["findWindows", class_name, window_name])
            .await
    }

    /// Child window of `hwnd` matching class and/or title.
    pub async fn find_sub_window(
        &self,
        hwnd: &str,
        class_name: Option<&str>,
        window_name: Option<&str>,
    ) -> Result<Option<String>> {
        self.facade
            .optional_text(args!["findSubWindow", hwnd, class_name, window_name])
            .await
    }

    pub async fn find_parent_window(&self, hwnd: &str) -> Result<Option<String>> {
        self.facade
            .optional_text(args!["findParentWindow", hwnd])
            .await
    }

    pub async fn get_window_name(&self, hwnd: &str) -> Result<Option<String>> {
        self.facade.optional_text(args!["getWindowName", hwnd]).await
    }

    pub async fn show_window(&self, hwnd: &str, show: bool) -> Result<bool> {
        self.facade.flag(args!["showWindow", hwnd, show]).await
    }

    pub async fn set_window_top(&self, hwnd: &str, top: bool) -> Result<bool> {
        self.facade.flag(args!["setWindowTop", hwnd, top]).await
    }

    // Mouse and keyboard

    pub async fn move_mouse(&self, hwnd: &str, point: Point, mode: &InputMode) -> Result<bool> {
        self.facade
            .flag(args![
                "moveMouse",
                hwnd,
                point.x,
                point.y,
                mode.background,
                mode.element()
            ])
            .await
    }

    pub async fn click_mouse(
        &self,
        hwnd: &str,
        point: Point,
        action: MouseAction,
        mode: &InputMode,
    ) -> Result<bool> {
        self.facade
            .flag(args![
                "clickMouse",
                hwnd,
                point.x,
                point.y,
                action.code(),
                mode.background,
                mode.element()
            ])
            .await
    }

    /// Type into the focused window.
    pub async fn send_keys(&self, text: &str) -> Result<bool> {
        self.facade.flag(args!["sendKeys", text]).await
    }

    /// Type into a specific window, which need not have focus.
    pub async fn send_keys_by_hwnd(&self, hwnd: &str, text: &str) -> Result<bool> {
        self.facade
            .flag(args!["sendKeysByHwnd", hwnd, text])
            .await
    }

    /// Send a virtual key; `key_action` is 1 press-and-release, 2 down, 3 up.
    pub async fn send_vk(&self, vk: i32, key_action: i32) -> Result<bool> {
        self.facade.flag(args!["sendVk", vk, key_action]).await
    }

    pub async fn send_vk_by_hwnd(&self, hwnd: &str, vk: i32, key_action: i32) -> Result<bool> {
        self.facade
            .flag(args!["sendVkByHwnd", hwnd, vk, key_action])
            .await
    }

    // Colour and image search

    pub async fn get_color(&self, hwnd: &str, point: Point, background: bool) -> Result<Option<String>> {
        self.facade
            .optional_text(args!["getColor", hwnd, point.x, point.y, background])
            .await
    }

    pub async fn find_color(
        &self,
        hwnd: &str,
        color: &str,
        search: &ColorSearch,
        background: bool,
        overrides: RetryOverrides,
    ) -> Result<Option<Point>> {
        let mut args = args!["findColor", hwnd, color, search.sub_colors_arg()];
        args.extend(search.region.to_args());
        args.push(search.similarity.into());
        args.push(background.into());

        self.facade
            .poll("find_color", overrides, args, |raw| probe::point("findColor", raw))
            .await
    }

    /// Matches of an image file on the driver's machine; empty on timeout.
    pub async fn find_images(
        &self,
        hwnd: &str,
        image_path: &str,
        search: &ImageSearch,
        background: bool,
        overrides: RetryOverrides,
    ) -> Result<Vec<Point>> {
        let mut args = args!["findImage", hwnd, image_path];
        args.extend(search.region.to_args());
        args.push(search.similarity.into());
        args.extend(search.algorithm.to_args());
        args.push(search.multi.into());
        args.push(background.into());

        let found = self
            .facade
            .poll("find_images", overrides, args, |raw| probe::points("findImage", raw))
            .await?;
        Ok(found.unwrap_or_default())
    }

    /// Regions of the window that changed between two frames `frame_gap` apart.
    pub async fn find_dynamic_image(
        &self,
        hwnd: &str,
        frame_gap: Duration,
        region: Region,
        background: bool,
        overrides: RetryOverrides,
    ) -> Result<Vec<Point>> {
        let gap_ms = u64::try_from(frame_gap.as_millis()).unwrap_or(u64::MAX);
        let mut args = args!["findAnimation", hwnd, gap_ms];
        args.extend(region.to_args());
        args.push(background.into());

        let found = self
            .facade
            .poll("find_dynamic_image", overrides, args, |raw| {
                probe::points("findAnimation", raw)
            })
            .await?;
        Ok(found.unwrap_or_default())
    }

    // UI automation elements

    pub async fn get_element_name(
        &self,
        hwnd: &str,
        xpath: &str,
        overrides: RetryOverrides,
    ) -> Result<Option<String>> {
        self.facade
            .poll("get_element_name", overrides, args!["getElementName", hwnd, xpath], |raw| {
                Ok(probe::text(raw))
            })
            .await
    }

    pub async fn get_element_value(
        &self,
        hwnd: &str,
        xpath: &str,
        overrides: RetryOverrides,
    ) -> Result<Option<String>> {
        self.facade
            .poll("get_element_value", overrides, args!["getElementValue", hwnd, xpath], |raw| {
                Ok(probe::text(raw))
            })
            .await
    }

    pub async fn get_element_rect(
        &self,
        hwnd: &str,
        xpath: &str,
        overrides: RetryOverrides,
    ) -> Result<Option<Rect>> {
        self.facade
            .poll("get_element_rect", overrides, args!["getElementRect", hwnd, xpath], |raw| {
                probe::rect("getElementRect", raw)
            })
            .await
    }

    /// Window handle owning the element.
    pub async fn get_element_window(
        &self,
        hwnd: &str,
        xpath: &str,
        overrides: RetryOverrides,
    ) -> Result<Option<String>> {
        self.facade
            .poll("get_element_window", overrides, args!["getElementWindow", hwnd, xpath], |raw| {
                Ok(probe::text(raw))
            })
            .await
    }

    pub async fn click_element(
        &self,
        hwnd: &str,
        xpath: &str,
        action: MouseAction,
        overrides: RetryOverrides,
    ) -> Result<bool> {
        self.facade
            .poll_flag(
                "click_element",
                overrides,
                args!["clickElement", hwnd, xpath, action.code()],
                probe::not_false,
            )
            .await
    }

    pub async fn set_element_value(
        &self,
        hwnd: &str,
        xpath: &str,
        value: &str,
        overrides: RetryOverrides,
    ) -> Result<bool> {
        self.facade
            .poll_flag(
                "set_element_value",
                overrides,
                args!["setElementValue", hwnd, xpath, value],
                probe::not_false,
            )
            .await
    }

    pub async fn set_element_focus(
        &self,
        hwnd: &str,
        xpath: &str,
        overrides: RetryOverrides,
    ) -> Result<bool> {
        self.facade
            .poll_flag(
                "set_element_focus",
                overrides,
                args!["setElementFocus", hwnd, xpath],
                probe::not_false,
            )
            .await
    }

    /// Scroll to a percentage of the element's range; `-1` leaves an axis alone.
    pub async fn scroll_element(
        &self,
        hwnd: &str,
        xpath: &str,
        horizontal: i32,
        vertical: i32,
        overrides: RetryOverrides,
    ) -> Result<bool> {
        self.facade
            .poll_flag(
                "scroll_element",
                overrides,
                args!["setElementScroll", hwnd, xpath, horizontal, vertical],
                probe::not_false,
            )
            .await
    }

    // System

    pub async fn start_process(&self, cmd: &str, show_window: bool, wait: bool) -> Result<bool> {
        self.facade
            .flag(args!["startProcess", cmd, show_window, wait])
            .await
    }

    pub async fn download_file(&self, url: &str, file_path: &str, wait: bool) -> Result<bool> {
        self.facade
            .flag(args!["downloadFile", url, file_path, wait])
            .await
    }

    pub async fn get_clipboard_text(&self) -> Result<String> {
        self.facade.text(args!["getClipboardText"]).await
    }

    pub async fn set_clipboard_text(&self, text: &str) -> Result<bool> {
        self.facade.flag(args!["setClipboardText", text]).await
    }
}
